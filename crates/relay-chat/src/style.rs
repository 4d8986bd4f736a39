//! Persona selection.
//!
//! Keeps the active persona per conversation and infers a persona from
//! keywords in the user's text. Conversations without an explicit or inferred
//! persona get the default for their first exchange and a randomly chosen
//! persona afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{RngCore, SeedableRng};
use relay_core::ConversationId;

use crate::history::HistoryStore;

// =============================================================================
// Style
// =============================================================================

/// A response persona. The set is closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Style {
    /// Default company-assistant voice.
    #[default]
    Normal,
    Cat,
    Villain,
    Dramatic,
}

impl Style {
    /// Every persona, default first.
    pub const ALL: [Style; 4] = [Style::Normal, Style::Cat, Style::Villain, Style::Dramatic];

    /// Personas eligible for the random assignment after the first exchange.
    pub const RANDOM_POOL: [Style; 3] = [Style::Cat, Style::Villain, Style::Dramatic];

    pub fn tag(self) -> &'static str {
        match self {
            Style::Normal => "normal",
            Style::Cat => "cat",
            Style::Villain => "villain",
            Style::Dramatic => "dramatic",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Style::Normal => "Обычный режим",
            Style::Cat => "Переводчик с технического на кошачий",
            Style::Villain => "Переводчик на язык суперзлодеев",
            Style::Dramatic => "Драматический технический писатель",
        }
    }

    /// Heading shown above a reply written in this persona.
    pub fn label(self) -> String {
        let icon = match self {
            Style::Normal => "💼",
            Style::Cat => "🐱",
            Style::Villain => "🦹",
            Style::Dramatic => "🎭",
        };
        format!("{} {}", icon, self.description())
    }

    pub fn is_default(self) -> bool {
        self == Style::Normal
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Style::ALL
            .into_iter()
            .find(|style| style.tag() == wanted)
            .ok_or_else(|| format!("unknown style: {}", s.trim()))
    }
}

/// (tag, description) pairs for every persona, default first.
pub fn available_styles() -> Vec<(&'static str, &'static str)> {
    Style::ALL
        .iter()
        .map(|style| (style.tag(), style.description()))
        .collect()
}

// =============================================================================
// Keyword inference
// =============================================================================

/// Keyword lists per non-default persona. Table order decides ties.
static STYLE_KEYWORDS: &[(Style, &[&str])] = &[
    (
        Style::Cat,
        &[
            "кошачий", "кот", "котик", "мяу", "кошка", "котята", "мурлыкать",
            "лапки", "хвостик", "мурчать", "объясни как кот", "как котик",
            "кошачьим языком", "по-кошачьи",
        ],
    ),
    (
        Style::Villain,
        &[
            "злодей", "суперзлодей", "злодейски", "мировое господство", "захват мира",
            "муахаха", "зловещий", "темная сторона", "как злодей", "злодейским голосом",
            "злобно", "коварный план", "как суперзлодей",
        ],
    ),
    (
        Style::Dramatic,
        &[
            "драматично", "эпично", "сага", "эпос", "драма", "театрально",
            "пафосно", "как в кино", "как в фильме", "как в книге", "эпическая история",
            "драматическим голосом", "как рассказчик", "как в легенде",
        ],
    ),
];

/// Infer a persona from keywords in `text` (case-insensitive substring match).
///
/// Returns the first persona in table order with a matching keyword, or the
/// default persona when nothing matches.
pub fn infer_style_from_text(text: &str) -> Style {
    let lowered = text.to_lowercase();
    for (style, keywords) in STYLE_KEYWORDS {
        if let Some(keyword) = keywords.iter().find(|kw| lowered.contains(**kw)) {
            tracing::debug!(style = %style, keyword = %keyword, "Style inferred from text");
            return *style;
        }
    }
    Style::Normal
}

// =============================================================================
// StyleSelector
// =============================================================================

/// How a persona was chosen for one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleSource {
    /// Keywords in the message asked for it.
    Inferred,
    /// No assistant reply yet in this conversation.
    FirstExchange,
    /// Previously stored for the conversation.
    Stored,
    /// Picked at random from [`Style::RANDOM_POOL`].
    Random,
}

/// A persona decision together with its provenance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyleChoice {
    pub style: Style,
    pub source: StyleSource,
}

impl StyleChoice {
    /// Whether committing this choice changes the stored persona.
    pub fn should_store(&self) -> bool {
        matches!(self.source, StyleSource::Inferred | StyleSource::Random)
    }
}

/// Random persona source. `next` holds a drawn but not yet committed persona
/// so that previews and the following commit agree.
struct PersonaDraw {
    rng: Box<dyn RngCore + Send>,
    next: Option<Style>,
}

fn draw_persona(rng: &mut (dyn RngCore + Send)) -> Style {
    Style::RANDOM_POOL
        .choose(rng)
        .copied()
        .unwrap_or(Style::Normal)
}

/// Per-conversation persona state plus the randomness used for unprompted
/// persona assignment.
pub struct StyleSelector {
    styles: Mutex<HashMap<ConversationId, Style>>,
    draw: Mutex<PersonaDraw>,
}

impl StyleSelector {
    /// Selector seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Selector with a reproducible random sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Selector drawing from a caller-supplied generator.
    pub fn with_rng(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            styles: Mutex::new(HashMap::new()),
            draw: Mutex::new(PersonaDraw {
                rng: Box::new(rng),
                next: None,
            }),
        }
    }

    /// Decide the persona for `text` without touching stored state.
    ///
    /// Order: inferred persona, then the default for a conversation the
    /// assistant has not answered yet, then the stored persona, then a random
    /// non-default persona.
    ///
    /// The random branch reserves one draw: repeated calls return the same
    /// persona, and the next [`select_style`](Self::select_style) that falls
    /// through to random assignment commits exactly that persona.
    pub fn resolve_style(
        &self,
        conversation: ConversationId,
        text: &str,
        history: &HistoryStore,
    ) -> StyleChoice {
        let inferred = infer_style_from_text(text);
        if !inferred.is_default() {
            return StyleChoice {
                style: inferred,
                source: StyleSource::Inferred,
            };
        }

        if !history.has_assistant_turn(conversation) {
            return StyleChoice {
                style: Style::Normal,
                source: StyleSource::FirstExchange,
            };
        }

        if let Some(stored) = self.stored_style(conversation) {
            return StyleChoice {
                style: stored,
                source: StyleSource::Stored,
            };
        }

        StyleChoice {
            style: self.peek_random_style(),
            source: StyleSource::Random,
        }
    }

    /// Decide the persona for `text` and remember it when it was inferred or
    /// randomly assigned.
    pub fn select_style(
        &self,
        conversation: ConversationId,
        text: &str,
        history: &HistoryStore,
    ) -> Style {
        let mut choice = self.resolve_style(conversation, text, history);
        if choice.source == StyleSource::Random {
            choice.style = self.take_random_style();
        }
        if choice.should_store() {
            self.styles_lock().insert(conversation, choice.style);
            match choice.source {
                StyleSource::Random => tracing::info!(
                    conversation = %conversation,
                    style = %choice.style,
                    "Style assigned at random"
                ),
                _ => tracing::info!(
                    conversation = %conversation,
                    style = %choice.style,
                    "Style switched by request"
                ),
            }
        }
        choice.style
    }

    /// Explicitly set a conversation's persona from a tag such as `"cat"`.
    ///
    /// Unknown tags are logged and ignored. Returns the applied persona.
    pub fn set_style(&self, conversation: ConversationId, tag: &str) -> Option<Style> {
        match tag.parse::<Style>() {
            Ok(style) => {
                self.styles_lock().insert(conversation, style);
                tracing::info!(conversation = %conversation, style = %style, "Style set");
                Some(style)
            }
            Err(e) => {
                tracing::warn!(conversation = %conversation, error = %e, "Ignoring style selection");
                None
            }
        }
    }

    /// Forget the conversation's persona.
    pub fn reset_style(&self, conversation: ConversationId) {
        if self.styles_lock().remove(&conversation).is_some() {
            tracing::info!(conversation = %conversation, "Style reset");
        }
    }

    /// The stored persona, if any. `None` means undetermined, not default.
    pub fn stored_style(&self, conversation: ConversationId) -> Option<Style> {
        self.styles_lock().get(&conversation).copied()
    }

    fn peek_random_style(&self) -> Style {
        let mut guard = self.draw_lock();
        let draw = &mut *guard;
        *draw.next.get_or_insert_with(|| draw_persona(&mut *draw.rng))
    }

    fn take_random_style(&self) -> Style {
        let mut guard = self.draw_lock();
        let draw = &mut *guard;
        draw.next
            .take()
            .unwrap_or_else(|| draw_persona(&mut *draw.rng))
    }

    fn draw_lock(&self) -> MutexGuard<'_, PersonaDraw> {
        self.draw
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn styles_lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Style>> {
        self.styles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StyleSelector {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
