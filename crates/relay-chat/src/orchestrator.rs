//! Dialog orchestrator: per-message coordination of persona selection,
//! intent routing, prompt composition, completion and reply delivery.
//!
//! The history and persona stores are shared, process-wide objects. Two
//! messages from the same conversation handled concurrently may interleave
//! their history appends; no per-conversation serialization is attempted.

use std::sync::Arc;

use relay_core::{CompletionMessage, ConversationId, DialogConfig, Role};
use relay_llm::{CompletionService, GenerationParams};

use crate::error::ChatError;
use crate::history::HistoryStore;
use crate::intent::{IntentDetector, ServiceCategory};
use crate::persona::PersonaLibrary;
use crate::prompt::PromptComposer;
use crate::response::ResponseFormatter;
use crate::style::{available_styles, Style, StyleSelector};
use crate::transport::{InboundMessage, ReplySink};

/// Default maximum inbound message length in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4096;

/// Reply sent when the completion service fails.
pub const APOLOGY_HTML: &str = "Извините, произошла ошибка. Пожалуйста, уточните ваш вопрос или \
    <a href=\"https://t.me/manager_technoservice\">свяжитесь с менеджером</a>.";

/// Markup-free apology stored in history.
pub const APOLOGY_PLAIN: &str =
    "Извините, произошла ошибка. Пожалуйста, уточните ваш вопрос или свяжитесь с менеджером.";

/// Instruction sent upstream in place of user text on a start event.
pub fn greeting_prompt(user_name: &str) -> String {
    format!(
        "Пользователь {} только что запустил бота. Поприветствуй его, представься как ассистент \
         компании ООО \"ТехноСервис\", кратко расскажи о компании и спроси, чем можешь помочь. \
         Ответ должен быть дружелюбным и профессиональным.",
        user_name
    )
}

/// Greeting sent when the completion service fails on a start event.
pub fn fallback_greeting_html(user_name: &str) -> String {
    fallback_greeting(user_name, "<a href=\"https://technoservice.ru\">нашем сайте</a>")
}

/// Markup-free greeting stored in history.
pub fn fallback_greeting_plain(user_name: &str) -> String {
    fallback_greeting(user_name, "нашем сайте")
}

fn fallback_greeting(user_name: &str, site: &str) -> String {
    format!(
        "Здравствуйте, {}! Я ассистент компании ООО \"ТехноСервис\". Мы специализируемся на \
         IT-консалтинге и разработке программного обеспечения. Более подробную информацию о \
         наших услугах вы можете узнать на {}. Чем я могу вам помочь?",
        user_name, site
    )
}

/// What happened while handling one inbound event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogOutcome {
    /// Persona the reply was written in.
    pub style: Style,
    /// Service category the message was routed to, if any.
    pub intent: Option<ServiceCategory>,
    /// `false` when the completion failed and a fixed fallback text was sent.
    pub completed: bool,
    /// `false` when the transport rejected the reply.
    pub delivered: bool,
}

/// Coordinates the dialog pipeline for every conversation.
pub struct DialogOrchestrator {
    history: Arc<HistoryStore>,
    styles: Arc<StyleSelector>,
    composer: PromptComposer,
    intents: IntentDetector,
    formatter: ResponseFormatter,
    completion: Arc<dyn CompletionService>,
    sink: Arc<dyn ReplySink>,
    params: GenerationParams,
    max_message_chars: usize,
}

impl DialogOrchestrator {
    pub fn new(
        history: Arc<HistoryStore>,
        styles: Arc<StyleSelector>,
        personas: Arc<PersonaLibrary>,
        completion: Arc<dyn CompletionService>,
        sink: Arc<dyn ReplySink>,
    ) -> Self {
        let composer = PromptComposer::new(personas, Arc::clone(&history), Arc::clone(&styles));
        Self {
            history,
            styles,
            composer,
            intents: IntentDetector::new(),
            formatter: ResponseFormatter::new(),
            completion,
            sink,
            params: GenerationParams::default(),
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }

    /// Apply history window and message length limits.
    pub fn with_dialog_config(mut self, config: &DialogConfig) -> Self {
        self.composer = self.composer.with_window(config.history_window);
        self.max_message_chars = config.max_message_chars;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn styles(&self) -> &Arc<StyleSelector> {
        &self.styles
    }

    /// Dispatch an inbound event to the start or message path.
    pub async fn handle(&self, inbound: &InboundMessage) -> Result<DialogOutcome, ChatError> {
        if inbound.is_start {
            self.handle_start(inbound.conversation, &inbound.sender_name)
                .await
        } else {
            self.handle_message(inbound.conversation, &inbound.text)
                .await
        }
    }

    /// Answer one user message.
    ///
    /// Validation errors and a missing default persona prompt are returned;
    /// completion and delivery failures degrade to fallback replies.
    pub async fn handle_message(
        &self,
        conversation: ConversationId,
        text: &str,
    ) -> Result<DialogOutcome, ChatError> {
        self.validate(text)?;
        self.sink.show_processing(conversation);

        let intent = self.intents.detect(text);
        let style = self.styles.select_style(conversation, text, &self.history);

        // The synthetic service instruction goes upstream; history keeps
        // what the user actually wrote.
        let text_for_history = text;
        let text_for_completion = match intent {
            Some(category) => category.instruction_prompt(),
            None => text.to_string(),
        };

        let messages = self
            .composer
            .compose_with_style(&text_for_completion, conversation, style)?;
        self.history
            .append(conversation, Role::User, text_for_history);

        tracing::info!(
            conversation = %conversation,
            style = %style,
            intent = ?intent,
            "Handling message"
        );

        let outcome = match self.complete(conversation, &messages).await {
            Some(raw) => {
                let formatted = self.formatter.add_clickable_links(&raw);
                let reply = format!("{}\n\n{}", style.label(), formatted);
                let delivered = self.deliver(conversation, &reply).await;
                self.history.append(conversation, Role::Assistant, raw);
                DialogOutcome {
                    style,
                    intent,
                    completed: true,
                    delivered,
                }
            }
            None => {
                let delivered = self.deliver(conversation, APOLOGY_HTML).await;
                self.history
                    .append(conversation, Role::Assistant, APOLOGY_PLAIN);
                DialogOutcome {
                    style,
                    intent,
                    completed: false,
                    delivered,
                }
            }
        };
        Ok(outcome)
    }

    /// Start a conversation over and greet the user by name.
    ///
    /// History and persona state are cleared; the greeting is written in the
    /// default persona without storing it.
    pub async fn handle_start(
        &self,
        conversation: ConversationId,
        user_name: &str,
    ) -> Result<DialogOutcome, ChatError> {
        self.history.reset(conversation);
        self.styles.reset_style(conversation);
        self.sink.show_processing(conversation);

        let style = Style::Normal;
        let prompt = greeting_prompt(user_name);
        let messages = self
            .composer
            .compose_with_style(&prompt, conversation, style)?;

        let outcome = match self.complete(conversation, &messages).await {
            Some(raw) => {
                let formatted = self.formatter.add_clickable_links(&raw);
                let delivered = self.deliver(conversation, &formatted).await;
                self.history.append(conversation, Role::Assistant, raw);
                DialogOutcome {
                    style,
                    intent: None,
                    completed: true,
                    delivered,
                }
            }
            None => {
                let delivered = self
                    .deliver(conversation, &fallback_greeting_html(user_name))
                    .await;
                self.history.append(
                    conversation,
                    Role::Assistant,
                    fallback_greeting_plain(user_name),
                );
                DialogOutcome {
                    style,
                    intent: None,
                    completed: false,
                    delivered,
                }
            }
        };
        tracing::info!(conversation = %conversation, completed = outcome.completed, "Conversation started");
        Ok(outcome)
    }

    /// Persona selection command. Unknown tags are logged and ignored.
    pub fn select_persona(&self, conversation: ConversationId, tag: &str) -> Option<Style> {
        self.styles.set_style(conversation, tag)
    }

    /// (tag, description) of every persona, default first.
    pub fn available_styles(&self) -> Vec<(&'static str, &'static str)> {
        available_styles()
    }

    // -- Private helpers --

    fn validate(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.max_message_chars {
            return Err(ChatError::MessageTooLong(self.max_message_chars));
        }
        Ok(())
    }

    /// Call the completion service once. Every failure collapses to `None`.
    async fn complete(
        &self,
        conversation: ConversationId,
        messages: &[CompletionMessage],
    ) -> Option<String> {
        match self.completion.complete(messages, &self.params).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                tracing::warn!(conversation = %conversation, "Completion service returned empty text");
                None
            }
            Err(e) => {
                tracing::warn!(conversation = %conversation, error = %e, "Completion failed");
                None
            }
        }
    }

    async fn deliver(&self, conversation: ConversationId, text: &str) -> bool {
        match self.sink.send_reply(conversation, text, true).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(conversation = %conversation, error = %e, "Failed to deliver reply");
                false
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
