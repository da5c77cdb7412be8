//! Error types for the dialogue synthesis pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DialogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("WAV error: {0}")]
    Audio(#[from] hound::Error),

    #[error("Clip {path} is {found}, expected {expected}")]
    AudioFormatMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Invalid conversation id: {0:?}")]
    InvalidConversationId(String),

    #[error("No voice references found under {0}")]
    EmptyCatalog(PathBuf),
}

/// A failed request to the synthesis service.
///
/// Non-success statuses, transport failures, timeouts and undecodable
/// responses all end up here. `status` is `None` when no response arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisError {
    pub status: Option<u16>,
    pub body: String,
}

impl SynthesisError {
    pub fn new(status: Option<u16>, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} - {}", status, self.body),
            None => write!(f, "no response - {}", self.body),
        }
    }
}

impl std::error::Error for SynthesisError {}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.status().map(|s| s.as_u16()), err.to_string())
    }
}
