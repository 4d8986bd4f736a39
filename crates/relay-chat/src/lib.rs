//! Dialog-context and response-styling pipeline.
//!
//! Per inbound message: pick a persona, detect a service intent, compose
//! the completion request from conversation history, call the completion
//! service, linkify the reply and persist both sides of the exchange.

pub mod error;
pub mod history;
pub mod intent;
pub mod orchestrator;
pub mod persona;
pub mod prompt;
pub mod response;
pub mod style;
pub mod transport;

pub use error::ChatError;
pub use history::HistoryStore;
pub use intent::{IntentDetector, ServiceCategory};
pub use orchestrator::{DialogOrchestrator, DialogOutcome, APOLOGY_HTML, APOLOGY_PLAIN};
pub use persona::{DirPromptSource, PersonaLibrary, PromptSource, StaticPromptSource};
pub use prompt::{PromptComposer, DEFAULT_HISTORY_WINDOW};
pub use response::{add_clickable_links, ResponseFormatter, LINK_KEYWORDS};
pub use style::{available_styles, infer_style_from_text, Style, StyleChoice, StyleSelector, StyleSource};
pub use transport::{InboundMessage, RecordingSink, ReplySink, SentReply};
