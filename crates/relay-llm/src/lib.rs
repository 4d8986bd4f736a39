//! Relay LLM crate - the completion-service boundary.
//!
//! Provides a trait-based abstraction over chat-completion backends, the
//! generation parameters passed with every request, an OpenAI-compatible
//! HTTP implementation, and a scripted mock for tests and offline runs.

pub mod openai;

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use relay_core::config::LlmConfig;
use relay_core::CompletionMessage;

pub use openai::OpenAiCompatibleClient;

// =============================================================================
// Parameters
// =============================================================================

/// Generation parameters sent alongside the message list.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Backend model identifier.
    pub model: String,
    /// Sampling temperature (0.0 to 1.0).
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for GenerationParams {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Reasons a completion request can fail.
///
/// Callers treat every variant the same way; the distinction exists for logs.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion client is not configured: {0}")]
    NotConfigured(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("backend returned an empty completion")]
    EmptyCompletion,
}

// =============================================================================
// Trait
// =============================================================================

/// A chat-completion backend.
///
/// Accepts an ordered message list and returns the generated text. Any
/// failure, including an empty completion, is reported as an error.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        params: &GenerationParams,
    ) -> Result<String, CompletionError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Completion service that replays queued replies.
///
/// Each call pops the next scripted result; an exhausted script yields
/// `CompletionError::EmptyCompletion`. Every received message list is
/// recorded so tests can inspect what was sent.
#[derive(Debug, Default)]
pub struct MockCompletionService {
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<Vec<CompletionMessage>>>,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose first call succeeds with `text`.
    pub fn with_reply(text: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.push_reply(text);
        mock
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.script_lock().push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_failure(&self, err: CompletionError) {
        self.script_lock().push_back(Err(err));
    }

    /// Message lists received so far, oldest first.
    pub fn calls(&self) -> Vec<Vec<CompletionMessage>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn script_lock(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<String, CompletionError>>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        params: &GenerationParams,
    ) -> Result<String, CompletionError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());

        tracing::debug!(
            model = %params.model,
            messages = messages.len(),
            "Mock completion requested"
        );

        self.script_lock()
            .pop_front()
            .unwrap_or(Err(CompletionError::EmptyCompletion))
    }
}

// =============================================================================
// Tests
// =============================================================================
