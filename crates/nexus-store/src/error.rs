use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("pending action not found: {action_id}")]
    PendingActionNotFound { action_id: String },

    #[error("job not found: {id}")]
    JobNotFound { id: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
