//! Persona prompt resources.
//!
//! Persona instruction text is read-only configuration, read once when the
//! library is built. The default persona's text is mandatory; any other
//! persona falls back to it when its own text is missing.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ChatError;
use crate::style::Style;

/// A store of persona instruction texts.
pub trait PromptSource: Send + Sync {
    /// The instruction text for `style`, or `None` when it does not exist.
    fn load(&self, style: Style) -> Option<String>;

    /// Human-readable location of the resource, for diagnostics.
    fn location(&self, style: Style) -> String;
}

// =============================================================================
// Directory-backed source
// =============================================================================

/// Prompt files in a directory: `system.txt` for the default persona and
/// `<tag>_mode.txt` for the rest.
#[derive(Debug, Clone)]
pub struct DirPromptSource {
    dir: PathBuf,
}

impl DirPromptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, style: Style) -> PathBuf {
        let file_name = if style.is_default() {
            "system.txt".to_string()
        } else {
            format!("{}_mode.txt", style.tag())
        };
        self.dir.join(file_name)
    }
}

impl PromptSource for DirPromptSource {
    fn load(&self, style: Style) -> Option<String> {
        let path = self.path_for(style);
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                tracing::debug!(
                    style = %style,
                    chars = content.chars().count(),
                    "Persona prompt loaded"
                );
                Some(content)
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Persona prompt file is empty");
                None
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read persona prompt");
                None
            }
        }
    }

    fn location(&self, style: Style) -> String {
        self.path_for(style).display().to_string()
    }
}

// =============================================================================
// In-memory source
// =============================================================================

/// Prompt texts held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticPromptSource {
    prompts: HashMap<Style, String>,
}

impl StaticPromptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, style: Style, text: impl Into<String>) -> Self {
        self.prompts.insert(style, text.into());
        self
    }
}

impl PromptSource for StaticPromptSource {
    fn load(&self, style: Style) -> Option<String> {
        self.prompts.get(&style).cloned()
    }

    fn location(&self, style: Style) -> String {
        format!("memory:{}", style.tag())
    }
}

// =============================================================================
// PersonaLibrary
// =============================================================================

/// Persona instruction texts with default-persona fallback.
pub struct PersonaLibrary {
    prompts: HashMap<Style, String>,
    default_location: String,
}

impl PersonaLibrary {
    /// Read every persona's text from `source`. Lookups never touch the
    /// source again.
    pub fn new(source: impl PromptSource) -> Self {
        let mut prompts = HashMap::new();
        for style in Style::ALL {
            match source.load(style) {
                Some(text) => {
                    prompts.insert(style, text);
                }
                None if style.is_default() => tracing::warn!(
                    location = %source.location(style),
                    "Default persona prompt missing"
                ),
                None => tracing::warn!(
                    style = %style,
                    location = %source.location(style),
                    "Persona prompt missing, default persona will be used"
                ),
            }
        }
        tracing::info!(loaded = prompts.len(), "Persona prompts loaded");

        Self {
            prompts,
            default_location: source.location(Style::Normal),
        }
    }

    /// Instruction text for `style`.
    ///
    /// A missing default prompt is a configuration error. A missing
    /// non-default prompt falls back to the default text.
    pub fn prompt_for(&self, style: Style) -> Result<String, ChatError> {
        if let Some(text) = self.prompts.get(&style) {
            return Ok(text.clone());
        }
        if !style.is_default() {
            tracing::debug!(style = %style, "Using default persona prompt");
        }
        self.default_prompt()
    }

    /// Fail early when the default persona prompt is unavailable.
    pub fn ensure_default(&self) -> Result<(), ChatError> {
        self.default_prompt().map(|_| ())
    }

    fn default_prompt(&self) -> Result<String, ChatError> {
        self.prompts
            .get(&Style::Normal)
            .cloned()
            .ok_or_else(|| ChatError::PersonaPromptMissing {
                style: Style::Normal.tag().to_string(),
                location: self.default_location.clone(),
            })
    }
}
