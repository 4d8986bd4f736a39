//! Completion request assembly.
//!
//! Builds the ordered message list sent upstream: persona instructions first,
//! then the conversation's history window, then the new user text. Composing
//! only reads the stores; persisting turns is the orchestrator's job.

use std::sync::Arc;

use relay_core::{CompletionMessage, ConversationId};

use crate::error::ChatError;
use crate::history::HistoryStore;
use crate::persona::PersonaLibrary;
use crate::style::{Style, StyleSelector};

/// History window used when none is configured.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Assembles `[system] + [...history] + [user]` completion requests.
pub struct PromptComposer {
    personas: Arc<PersonaLibrary>,
    history: Arc<HistoryStore>,
    styles: Arc<StyleSelector>,
    window: usize,
}

impl PromptComposer {
    pub fn new(
        personas: Arc<PersonaLibrary>,
        history: Arc<HistoryStore>,
        styles: Arc<StyleSelector>,
    ) -> Self {
        Self {
            personas,
            history,
            styles,
            window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Override the number of history messages included per request.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Compose a request for `text`.
    ///
    /// Without a conversation the default persona is used and, if its text is
    /// unavailable, the system message is left out. With a conversation the
    /// persona is resolved (without being stored) and a missing default
    /// persona text is an error.
    pub fn compose_messages(
        &self,
        text: &str,
        conversation: Option<ConversationId>,
    ) -> Result<Vec<CompletionMessage>, ChatError> {
        match conversation {
            Some(conversation) => {
                let choice = self
                    .styles
                    .resolve_style(conversation, text, &self.history);
                self.compose_with_style(text, conversation, choice.style)
            }
            None => {
                let mut messages = Vec::with_capacity(2);
                match self.personas.prompt_for(Style::Normal) {
                    Ok(system) => messages.push(CompletionMessage::system(system)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Composing without persona instructions")
                    }
                }
                messages.push(CompletionMessage::user(text));
                Ok(messages)
            }
        }
    }

    /// Compose a request for `text` in a conversation using an already
    /// chosen persona.
    pub fn compose_with_style(
        &self,
        text: &str,
        conversation: ConversationId,
        style: Style,
    ) -> Result<Vec<CompletionMessage>, ChatError> {
        let system = self.personas.prompt_for(style)?;
        let history = self
            .history
            .window_for_completion(conversation, self.window);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(CompletionMessage::system(system));
        messages.extend(history);
        messages.push(CompletionMessage::user(text));

        tracing::debug!(
            conversation = %conversation,
            style = %style,
            messages = messages.len(),
            "Completion request composed"
        );
        Ok(messages)
    }
}

// =============================================================================
// Tests
// =============================================================================
