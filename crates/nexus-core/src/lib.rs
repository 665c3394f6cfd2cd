pub mod config;
pub mod error;
pub mod redact;
pub mod types;

pub use config::NexusConfig;
pub use error::{NexusError, Result};
pub use redact::Redactor;
pub use types::ChatId;
