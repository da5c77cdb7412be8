//! Output layout and completion tracking.
//!
//! A conversation is done once its manifest exists. Anything short of that
//! is regenerated from scratch on the next run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::conversation::Role;
use crate::error::DialogError;

/// Terminal record of a fully synthesized conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationManifest {
    pub conversation_id: String,
    pub user_turns: Vec<String>,
    pub assistant_turns: Vec<String>,
    pub user_reference_id: String,
    pub assistant_reference_id: String,
}

/// File locations for one conversation under the output root.
#[derive(Debug, Clone)]
pub struct ConversationDir {
    id: String,
    dir: PathBuf,
}

impl ConversationDir {
    pub fn new(output_root: &Path, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            dir: output_root.join(&id),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn create(&self) -> Result<(), DialogError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Clip for the 1-based `index`-th turn of `role`.
    pub fn turn_path(&self, role: Role, index: usize) -> PathBuf {
        self.dir.join(format!("{}_turn_{}.wav", role, index))
    }

    pub fn combined_path(&self) -> PathBuf {
        self.dir.join(format!("{}_combined.wav", self.id))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.id))
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.dir.join("error_log.txt")
    }
}

/// Tracks which conversations have finished.
pub trait ConversationStore: Send + Sync {
    fn is_done(&self, conversation_id: &str) -> bool;

    fn mark_done(&self, manifest: &ConversationManifest) -> Result<(), DialogError>;
}

/// Completion is a manifest file at `<root>/<id>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FsConversationStore {
    root: PathBuf,
}

impl FsConversationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn conversation_dir(&self, conversation_id: &str) -> ConversationDir {
        ConversationDir::new(&self.root, conversation_id)
    }
}

impl ConversationStore for FsConversationStore {
    fn is_done(&self, conversation_id: &str) -> bool {
        self.conversation_dir(conversation_id).manifest_path().is_file()
    }

    fn mark_done(&self, manifest: &ConversationManifest) -> Result<(), DialogError> {
        let dir = self.conversation_dir(&manifest.conversation_id);
        dir.create()?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        manifest.serialize(&mut ser)?;

        fs::write(dir.manifest_path(), buf)?;
        Ok(())
    }
}
