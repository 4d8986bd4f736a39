//! CLI argument definitions for the relay binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use relay_core::RelayConfig;
use std::path::PathBuf;

/// Environment variables checked for the completion API key, in order.
const API_KEY_VARS: [&str; 2] = ["RELAY_API_KEY", "OPENROUTER_API_KEY"];

/// Relay: a persona-aware chat assistant in front of a language model.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Directory holding system.txt and <persona>_mode.txt prompt files.
    #[arg(short = 'p', long = "prompts-dir")]
    pub prompts_dir: Option<PathBuf>,

    /// Completion model identifier.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RELAY_CONFIG env var > ~/.relay/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RELAY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Log level used when tracing starts: --log-level, then the level from
    /// a successfully read config file, then `info`.
    pub fn startup_log_level(&self, file_config: Option<&RelayConfig>) -> String {
        self.log_level
            .clone()
            .or_else(|| file_config.map(|config| config.general.log_level.clone()))
            .unwrap_or_else(|| "info".to_string())
    }

    /// Overlay flags and environment onto a loaded configuration.
    pub fn apply_overrides(&self, config: &mut RelayConfig) {
        self.apply_overrides_with(config, |name| std::env::var(name).ok());
    }

    fn apply_overrides_with(
        &self,
        config: &mut RelayConfig,
        env: impl Fn(&str) -> Option<String>,
    ) {
        if let Some(ref dir) = self.prompts_dir {
            config.general.prompts_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref model) = self.model {
            config.llm.model = model.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|name| env(name))
            .find(|value| !value.trim().is_empty())
        {
            config.llm.api_key = Some(key);
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".relay").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".relay").join("config.toml");
    }
    PathBuf::from("config.toml")
}
