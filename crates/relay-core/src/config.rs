use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Top-level configuration for the relay.
///
/// Loaded from a TOML file. Each section corresponds to one concern; every
/// section falls back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub dialog: DialogConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration if the file exists.
    ///
    /// A missing file yields `Ok(None)`; a file that exists but cannot be
    /// read, parsed or validated is an error rather than a silent fallback.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(RelayError::Config(format!(
                "llm.temperature must be within 0.0..=1.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(RelayError::Config(
                "llm.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(RelayError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(RelayError::Config("llm.model must not be empty".to_string()));
        }
        if self.dialog.history_window == 0 {
            return Err(RelayError::Config(
                "dialog.history_window must be greater than 0".to_string(),
            ));
        }
        if self.dialog.max_message_chars == 0 {
            return Err(RelayError::Config(
                "dialog.max_message_chars must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory holding persona prompt files.
    pub prompts_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            prompts_dir: "prompts".to_string(),
        }
    }
}

/// Completion backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Bearer token. Usually supplied through the environment instead.
    pub api_key: Option<String>,
    /// Backend model identifier.
    pub model: String,
    /// Sampling temperature (0.0 to 1.0).
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model: "qwen/qwen3-30b-a3b:free".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

/// Dialog pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Number of most recent messages sent to the model as context.
    pub history_window: usize,
    /// Longest inbound message accepted, in characters.
    pub max_message_chars: usize,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            max_message_chars: 4096,
        }
    }
}
