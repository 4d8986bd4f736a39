//! Error types for the dialog pipeline.

/// Errors from the dialog pipeline.
///
/// Only unrecoverable conditions are represented here. Completion failures,
/// unknown persona tags and malformed link markup degrade in place and are
/// logged instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("prompt for persona '{style}' not found at {location}")]
    PersonaPromptMissing { style: String, location: String },
    #[error("transport error: {0}")]
    Transport(String),
}
