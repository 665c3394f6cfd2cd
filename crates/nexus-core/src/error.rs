use thiserror::Error;

#[derive(Debug, Error)]
pub enum NexusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NexusError {
    /// Short error code string used in audit rows and logs.
    pub fn code(&self) -> &'static str {
        match self {
            NexusError::Config(_) => "CONFIG_ERROR",
            NexusError::Database(_) => "DATABASE_ERROR",
            NexusError::Channel { .. } => "CHANNEL_ERROR",
            NexusError::Protocol(_) => "PROTOCOL_ERROR",
            NexusError::Serialization(_) => "SERIALIZATION_ERROR",
            NexusError::Io(_) => "IO_ERROR",
            NexusError::Timeout { .. } => "TIMEOUT",
            NexusError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, NexusError>;
