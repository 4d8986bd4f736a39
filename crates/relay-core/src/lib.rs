pub mod config;
pub mod error;
pub mod types;

pub use config::{DialogConfig, GeneralConfig, LlmConfig, RelayConfig};
pub use error::{RelayError, Result};
pub use types::*;
