//! Per-role turn audio generation.

use std::path::PathBuf;

use crate::config::{SynthesisConfig, SynthesisMode};
use crate::conversation::Role;
use crate::store::ConversationDir;
use crate::tts::{self, SpeechSynthesizer};
use crate::wire::{MemoryCache, TtsBatchRequest, TtsRequest};

/// Called after each clip is written: (role, 1-based index, total turns).
pub type TurnCallback<'a> = &'a (dyn Fn(Role, usize, usize) + Send + Sync);

/// Turns one role's utterances into clip files.
pub struct TurnAudioGenerator<'a> {
    synthesizer: &'a dyn SpeechSynthesizer,
    settings: &'a SynthesisConfig,
}

impl<'a> TurnAudioGenerator<'a> {
    pub fn new(synthesizer: &'a dyn SpeechSynthesizer, settings: &'a SynthesisConfig) -> Self {
        Self {
            synthesizer,
            settings,
        }
    }

    /// Synthesize every turn of `role` into `dir`.
    ///
    /// Returns the clip paths in turn order, or `None` if any turn failed or
    /// there was nothing to synthesize. In single mode the first failure
    /// stops the role; later turns are never requested.
    pub async fn generate(
        &self,
        role: Role,
        turns: &[String],
        reference_id: &str,
        dir: &ConversationDir,
        on_turn: Option<TurnCallback<'_>>,
    ) -> Option<Vec<PathBuf>> {
        if turns.is_empty() {
            tracing::warn!(conversation = dir.id(), %role, "no turns to synthesize");
            return None;
        }

        let paths = match self.settings.mode {
            SynthesisMode::Single => {
                self.generate_single(role, turns, reference_id, dir, on_turn)
                    .await?
            }
            SynthesisMode::Batch => {
                let paths = self.generate_batch(role, turns, reference_id, dir).await;
                if let Some(callback) = on_turn {
                    for index in 1..=paths.len() {
                        callback(role, index, turns.len());
                    }
                }
                paths
            }
        };

        if paths.is_empty() { None } else { Some(paths) }
    }

    async fn generate_single(
        &self,
        role: Role,
        turns: &[String],
        reference_id: &str,
        dir: &ConversationDir,
        on_turn: Option<TurnCallback<'_>>,
    ) -> Option<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(turns.len());
        let error_log = dir.error_log_path();

        for (idx, text) in turns.iter().enumerate() {
            let request = TtsRequest {
                text: text.clone(),
                references: Vec::new(),
                reference_id: reference_id.to_string(),
                normalize: self.settings.normalize,
                format: self.settings.format.clone(),
                use_memory_cache: MemoryCache::for_turn(idx),
            };
            let output = dir.turn_path(role, idx + 1);

            if !tts::synthesize_to_file(self.synthesizer, &request, &output, &error_log).await {
                tracing::warn!(conversation = dir.id(), %role, turn = idx + 1, "turn failed, abandoning role");
                return None;
            }

            if let Some(callback) = on_turn {
                callback(role, idx + 1, turns.len());
            }
            paths.push(output);
        }

        Some(paths)
    }

    async fn generate_batch(
        &self,
        role: Role,
        turns: &[String],
        reference_id: &str,
        dir: &ConversationDir,
    ) -> Vec<PathBuf> {
        let request = TtsBatchRequest {
            texts: turns.to_vec(),
            references: Vec::new(),
            reference_id: reference_id.to_string(),
            normalize: self.settings.normalize,
            format: self.settings.format.clone(),
        };

        tts::synthesize_batch_to_dir(self.synthesizer, &request, dir, role).await
    }
}
