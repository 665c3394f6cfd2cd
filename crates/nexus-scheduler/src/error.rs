use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("could not parse schedule trigger: {0}")]
    InvalidWhen(String),

    #[error("store error: {0}")]
    Store(#[from] nexus_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
