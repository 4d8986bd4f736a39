//! Per-conversation message history.
//!
//! Append-only logs keyed by conversation, with bounded-window retrieval for
//! building completion context. Everything lives in memory for the lifetime
//! of the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use relay_core::{CompletionMessage, ConversationId, Message, Role};

/// In-memory store of conversation histories.
///
/// A conversation's log is created on first append and only ever grows,
/// except for a wholesale [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct HistoryStore {
    dialogs: Mutex<HashMap<ConversationId, Vec<Message>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with the current time.
    pub fn append(&self, conversation: ConversationId, role: Role, content: impl Into<String>) {
        let message = Message::new(role, content);
        self.lock().entry(conversation).or_default().push(message);
        tracing::debug!(conversation = %conversation, role = %role, "Message appended");
    }

    /// The most recent `limit` messages in chronological order.
    pub fn window(&self, conversation: ConversationId, limit: usize) -> Vec<Message> {
        let dialogs = self.lock();
        match dialogs.get(&conversation) {
            Some(messages) => {
                let start = messages.len().saturating_sub(limit);
                messages[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Like [`window`](Self::window), reduced to user/assistant `{role, content}`
    /// pairs ready for a completion request.
    pub fn window_for_completion(
        &self,
        conversation: ConversationId,
        limit: usize,
    ) -> Vec<CompletionMessage> {
        self.window(conversation, limit)
            .iter()
            .filter(|m| m.role.is_dialog())
            .map(CompletionMessage::from)
            .collect()
    }

    /// Clear a conversation's log. A no-op for unknown conversations.
    pub fn reset(&self, conversation: ConversationId) {
        let mut dialogs = self.lock();
        if let Some(messages) = dialogs.get_mut(&conversation) {
            messages.clear();
            tracing::info!(conversation = %conversation, "Dialog history cleared");
        }
    }

    /// Whether the assistant has replied at least once since the last reset.
    pub fn has_assistant_turn(&self, conversation: ConversationId) -> bool {
        self.lock()
            .get(&conversation)
            .is_some_and(|messages| messages.iter().any(|m| m.role == Role::Assistant))
    }

    /// Number of stored messages for a conversation.
    pub fn len(&self, conversation: ConversationId) -> usize {
        self.lock().get(&conversation).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, conversation: ConversationId) -> bool {
        self.len(conversation) == 0
    }

    // A panic while holding the lock cannot leave a half-written Vec behind,
    // so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Vec<Message>>> {
        self.dialogs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// =============================================================================
// Tests
// =============================================================================
