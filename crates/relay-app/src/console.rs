//! Console transport: stdin lines in, replies on stdout.
//!
//! `/start` begins the conversation over, `/style <tag>` picks a persona,
//! `/styles` lists personas and `/quit` exits. Any other line is a message.

use std::borrow::Cow;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use relay_chat::{ChatError, ReplySink};
use relay_core::ConversationId;

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*"([^"]*)"[^>]*>(.*?)</a\s*>"#)
        .expect("Invalid anchor regex")
});

/// One parsed line of console input.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Start,
    SelectStyle(&'a str),
    ListStyles,
    Quit,
    Message(&'a str),
    Empty,
}

pub fn parse_line(line: &str) -> ConsoleCommand<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleCommand::Empty;
    }
    match trimmed.split_once(char::is_whitespace) {
        Some(("/style", tag)) => ConsoleCommand::SelectStyle(tag.trim()),
        _ => match trimmed {
            "/start" => ConsoleCommand::Start,
            "/styles" => ConsoleCommand::ListStyles,
            "/quit" | "/exit" => ConsoleCommand::Quit,
            "/style" => ConsoleCommand::SelectStyle(""),
            _ => ConsoleCommand::Message(trimmed),
        },
    }
}

/// Render hyperlink markup as `label (url)` for a plain terminal.
pub fn render_for_terminal(text: &str) -> Cow<'_, str> {
    ANCHOR.replace_all(text, "$2 ($1)")
}

/// Prints replies to stdout and status lines to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn send_reply(
        &self,
        conversation: ConversationId,
        text: &str,
        rich: bool,
    ) -> Result<(), ChatError> {
        let rendered = if rich {
            render_for_terminal(text)
        } else {
            Cow::Borrowed(text)
        };
        tracing::debug!(conversation = %conversation, chars = text.chars().count(), "Reply printed");
        println!("\n{}\n", rendered);
        Ok(())
    }

    fn show_processing(&self, _conversation: ConversationId) {
        eprintln!("… печатает");
    }
}
