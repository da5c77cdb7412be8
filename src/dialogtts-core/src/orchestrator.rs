//! Conversation orchestration.
//!
//! Drives one conversation at a time through voice selection, per-role
//! synthesis, track assembly and manifest writing, and walks a JSONL corpus
//! in file order.

use std::path::{Path, PathBuf};

use crate::assembler;
use crate::catalog::{RandomSelector, ReferenceCatalog, VoiceSelector};
use crate::config::SynthesisConfig;
use crate::conversation::{Conversation, ConversationReader, Role};
use crate::error::DialogError;
use crate::generator::{TurnAudioGenerator, TurnCallback};
use crate::store::{ConversationDir, ConversationManifest, ConversationStore, FsConversationStore};
use crate::tts::SpeechSynthesizer;

/// Callback for pipeline events.
pub type PipelineCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// Events emitted while processing a corpus.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A manifest already exists; nothing was done.
    Skipped { id: String },
    /// Voices were chosen and synthesis is about to start.
    ConversationStart {
        id: String,
        user_reference_id: String,
        assistant_reference_id: String,
        user_turns: usize,
        assistant_turns: usize,
    },
    /// A clip was written.
    TurnSynthesized {
        id: String,
        role: Role,
        index: usize,
        total: usize,
    },
    /// A role could not be synthesized; the conversation was abandoned.
    RoleFailed {
        id: String,
        role: Role,
        error_log: PathBuf,
    },
    /// The combined track was written.
    Merged {
        id: String,
        path: PathBuf,
        duration_secs: f64,
    },
    /// The manifest was written; the conversation is done.
    Completed { id: String, manifest_path: PathBuf },
    /// An I/O or audio error stopped this conversation.
    ConversationFailed { id: String, error: String },
    /// An input line could not be parsed.
    InvalidRecord { line: usize, error: String },
}

/// How a single conversation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    Skipped,
    Completed(ConversationManifest),
    Aborted { role: Role },
}

/// Turns conversations into per-turn clips, a combined track and a manifest.
pub struct ConversationOrchestrator {
    synthesizer: Box<dyn SpeechSynthesizer>,
    catalog: ReferenceCatalog,
    settings: SynthesisConfig,
    output_dir: PathBuf,
    store: Box<dyn ConversationStore>,
    selector: Box<dyn VoiceSelector>,
    callback: Option<PipelineCallback>,
}

impl ConversationOrchestrator {
    /// Create an orchestrator writing under `output_dir`.
    ///
    /// Completion is tracked with manifest files under the same directory
    /// and voices are drawn from entropy until a selector is supplied.
    pub fn new(
        synthesizer: Box<dyn SpeechSynthesizer>,
        catalog: ReferenceCatalog,
        settings: SynthesisConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, DialogError> {
        if catalog.is_empty() {
            return Err(DialogError::EmptyCatalog(catalog.root().to_path_buf()));
        }
        let output_dir = output_dir.into();

        Ok(Self {
            synthesizer,
            catalog,
            settings,
            store: Box::new(FsConversationStore::new(&output_dir)),
            output_dir,
            selector: Box::new(RandomSelector::from_entropy()),
            callback: None,
        })
    }

    pub fn with_store(mut self, store: Box<dyn ConversationStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_selector(mut self, selector: Box<dyn VoiceSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: PipelineCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process every record of a JSONL file in order.
    ///
    /// Unparseable lines and per-conversation failures are reported through
    /// the callback and do not stop the run. Returns the number of
    /// conversations read.
    pub async fn run<P: AsRef<Path>>(&mut self, jsonl_path: P) -> Result<usize, DialogError> {
        let mut processed = 0;

        for record in ConversationReader::open(jsonl_path)? {
            let conversation = match record? {
                Ok(conversation) => conversation,
                Err(invalid) => {
                    self.emit(PipelineEvent::InvalidRecord {
                        line: invalid.line,
                        error: invalid.error.to_string(),
                    });
                    continue;
                }
            };
            processed += 1;

            if let Err(e) = self.process(&conversation).await {
                tracing::error!(conversation = %conversation.id, error = %e, "conversation failed");
                self.emit(PipelineEvent::ConversationFailed {
                    id: conversation.id.clone(),
                    error: e.to_string(),
                });
            }
        }

        Ok(processed)
    }

    /// Process one conversation.
    pub async fn process(
        &mut self,
        conversation: &Conversation,
    ) -> Result<ConversationOutcome, DialogError> {
        let id = conversation.id.as_str();
        validate_id(id)?;

        if self.store.is_done(id) {
            self.emit(PipelineEvent::Skipped { id: id.to_string() });
            return Ok(ConversationOutcome::Skipped);
        }

        let user_reference_id = self.selector.select(self.catalog.ids());
        let assistant_reference_id = self.selector.select(self.catalog.ids());

        let dir = ConversationDir::new(&self.output_dir, id);
        dir.create()?;

        let user_turns = conversation.turns(Role::User);
        let assistant_turns = conversation.turns(Role::Assistant);
        self.emit(PipelineEvent::ConversationStart {
            id: id.to_string(),
            user_reference_id: user_reference_id.clone(),
            assistant_reference_id: assistant_reference_id.clone(),
            user_turns: user_turns.len(),
            assistant_turns: assistant_turns.len(),
        });

        let callback = &self.callback;
        let on_turn: TurnCallback<'_> = &|role, index, total| {
            emit_to(
                callback,
                PipelineEvent::TurnSynthesized {
                    id: id.to_string(),
                    role,
                    index,
                    total,
                },
            );
        };
        let generator = TurnAudioGenerator::new(self.synthesizer.as_ref(), &self.settings);

        let Some(user_clips) = generator
            .generate(Role::User, &user_turns, &user_reference_id, &dir, Some(on_turn))
            .await
        else {
            return Ok(self.abort(&dir, Role::User));
        };
        let Some(assistant_clips) = generator
            .generate(
                Role::Assistant,
                &assistant_turns,
                &assistant_reference_id,
                &dir,
                Some(on_turn),
            )
            .await
        else {
            return Ok(self.abort(&dir, Role::Assistant));
        };

        let track = assembler::assemble(&user_clips, &assistant_clips, &dir.combined_path())?;
        self.emit(PipelineEvent::Merged {
            id: id.to_string(),
            path: track.path.clone(),
            duration_secs: track.duration_secs(),
        });

        let manifest = ConversationManifest {
            conversation_id: id.to_string(),
            user_turns,
            assistant_turns,
            user_reference_id,
            assistant_reference_id,
        };
        self.store.mark_done(&manifest)?;
        self.emit(PipelineEvent::Completed {
            id: id.to_string(),
            manifest_path: dir.manifest_path(),
        });

        Ok(ConversationOutcome::Completed(manifest))
    }

    fn abort(&self, dir: &ConversationDir, role: Role) -> ConversationOutcome {
        self.emit(PipelineEvent::RoleFailed {
            id: dir.id().to_string(),
            role,
            error_log: dir.error_log_path(),
        });
        ConversationOutcome::Aborted { role }
    }

    /// Emit an event if a callback is registered.
    fn emit(&self, event: PipelineEvent) {
        emit_to(&self.callback, event);
    }
}

fn emit_to(callback: &Option<PipelineCallback>, event: PipelineEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

/// Conversation ids become directory names and must stay inside the output
/// directory.
fn validate_id(id: &str) -> Result<(), DialogError> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.contains('\0');
    if invalid {
        return Err(DialogError::InvalidConversationId(id.to_string()));
    }
    Ok(())
}
