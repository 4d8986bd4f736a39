//! Chat transport contract.
//!
//! The pipeline receives [`InboundMessage`]s and answers through a
//! [`ReplySink`]. Delivery, command registration and typing indicators are
//! the transport's business.

use std::sync::Mutex;

use async_trait::async_trait;
use relay_core::ConversationId;

use crate::error::ChatError;

/// One event delivered by the chat platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub conversation: ConversationId,
    pub sender_id: i64,
    /// Display name used to address the user in greetings.
    pub sender_name: String,
    pub text: String,
    /// Explicit "begin conversation" event rather than a text message.
    pub is_start: bool,
}

impl InboundMessage {
    pub fn text(
        conversation: ConversationId,
        sender_id: i64,
        sender_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation,
            sender_id,
            sender_name: sender_name.into(),
            text: text.into(),
            is_start: false,
        }
    }

    pub fn start(conversation: ConversationId, sender_id: i64, sender_name: impl Into<String>) -> Self {
        Self {
            conversation,
            sender_id,
            sender_name: sender_name.into(),
            text: String::new(),
            is_start: true,
        }
    }
}

/// Outbound side of the transport.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Deliver `text` to the conversation. `rich` asks the transport to
    /// render hyperlink markup.
    async fn send_reply(
        &self,
        conversation: ConversationId,
        text: &str,
        rich: bool,
    ) -> Result<(), ChatError>;

    /// Fire-and-forget "processing" indicator.
    fn show_processing(&self, _conversation: ConversationId) {}
}

/// A reply captured by [`RecordingSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentReply {
    pub conversation: ConversationId,
    pub text: String,
    pub rich: bool,
}

/// In-memory sink that records every reply. Can be told to fail deliveries.
#[derive(Debug, Default)]
pub struct RecordingSink {
    replies: Mutex<Vec<SentReply>>,
    processing: Mutex<Vec<ConversationId>>,
    fail_with: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails with the given reason.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn replies(&self) -> Vec<SentReply> {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn processing_signals(&self) -> Vec<ConversationId> {
        self.processing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_reply(
        &self,
        conversation: ConversationId,
        text: &str,
        rich: bool,
    ) -> Result<(), ChatError> {
        if let Some(reason) = &self.fail_with {
            return Err(ChatError::Transport(reason.clone()));
        }
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentReply {
                conversation,
                text: text.to_string(),
                rich,
            });
        Ok(())
    }

    fn show_processing(&self, conversation: ConversationId) {
        self.processing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(conversation);
    }
}
