pub mod command;
pub mod error;
pub mod format;
pub mod identity;
pub mod orchestrator;

pub use command::{parse_tool_command, DirectCommand};
pub use error::{OrchestratorError, Result};
pub use format::format_whatsapp_text;
pub use identity::is_same_identity;
pub use orchestrator::Orchestrator;
