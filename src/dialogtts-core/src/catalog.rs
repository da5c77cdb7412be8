//! Reference voice catalog and voice selection.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DialogError;

/// The set of voice reference ids available to the synthesis service.
///
/// Every immediate subdirectory of the reference root is one voice. The
/// directory contents are not inspected; a reference without usable audio
/// shows up later as a synthesis failure.
#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    root: PathBuf,
    ids: Vec<String>,
}

impl ReferenceCatalog {
    /// Scan `root` for reference folders. Ids are sorted.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self, DialogError> {
        let root = root.as_ref();
        let mut ids = Vec::new();

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            } else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 reference folder");
            }
        }
        ids.sort();

        Ok(Self {
            root: root.to_path_buf(),
            ids,
        })
    }

    /// Like [`ReferenceCatalog::load`] but rejects an empty root.
    pub fn load_non_empty<P: AsRef<Path>>(root: P) -> Result<Self, DialogError> {
        let catalog = Self::load(root)?;
        if catalog.is_empty() {
            return Err(DialogError::EmptyCatalog(catalog.root));
        }
        Ok(catalog)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Strategy for picking a voice for a speaker.
///
/// Callers guarantee `ids` is non-empty.
pub trait VoiceSelector: Send {
    fn select(&mut self, ids: &[String]) -> String;
}

/// Uniform random choice over the catalog.
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    /// Reproducible selection across a whole run.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl VoiceSelector for RandomSelector {
    fn select(&mut self, ids: &[String]) -> String {
        ids.choose(&mut self.rng).cloned().unwrap_or_default()
    }
}
