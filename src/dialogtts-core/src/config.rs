//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::DialogError;

pub const DEFAULT_SINGLE_URL: &str = "http://127.0.0.1:8080/v1/tts";
pub const DEFAULT_BATCH_URL: &str = "http://127.0.0.1:8081/v1/tts/batch";
pub const DEFAULT_API_KEY: &str = "YOUR_API_KEY";
pub const DEFAULT_SEED: u64 = 42;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub synthesis: SynthesisConfig,
    pub run: RunConfig,
}

/// Where and how to reach the synthesis service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub single_url: String,
    pub batch_url: String,
    pub api_key: String,
    /// Per-request timeout. Requests wait indefinitely when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            single_url: DEFAULT_SINGLE_URL.to_string(),
            batch_url: DEFAULT_BATCH_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            timeout_secs: None,
        }
    }
}

/// How turns are sent to the service.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// One request per turn.
    #[default]
    Single,
    /// One request per role.
    Batch,
}

/// Payload flags sent with every request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub mode: SynthesisMode,
    pub normalize: bool,
    pub format: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            mode: SynthesisMode::Single,
            normalize: true,
            format: "wav".to_string(),
        }
    }
}

/// Per-run settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed for voice selection. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: Some(DEFAULT_SEED),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DialogError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DialogError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, DialogError> {
        toml::from_str(content)
            .map_err(|e| DialogError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}
