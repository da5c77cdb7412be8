//! Dialogue-to-speech core library.
//!
//! Reads multi-turn conversations, synthesizes every turn through a remote
//! TTS service and assembles each dialogue into one alternating-speaker
//! recording with a completion manifest.

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod store;
pub mod tts;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{CombinedTrack, Segment, merge_plan};
pub use catalog::{RandomSelector, ReferenceCatalog, VoiceSelector};
pub use config::{Config, SynthesisMode};
pub use conversation::{Conversation, ConversationReader, Exchange, Role};
pub use error::{DialogError, SynthesisError};
pub use generator::TurnAudioGenerator;
pub use orchestrator::{ConversationOrchestrator, ConversationOutcome, PipelineEvent};
pub use store::{ConversationManifest, ConversationStore, FsConversationStore};
pub use tts::{HttpSynthesizer, SpeechSynthesizer};
pub use wire::{MemoryCache, MsgpackCodec, WireCodec};
