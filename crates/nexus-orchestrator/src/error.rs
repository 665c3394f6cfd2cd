use thiserror::Error;

/// Errors the orchestrator itself can raise. Never let these escape
/// `Orchestrator::handle_inbound` — the top-level dispatcher catches every
/// `Err` here, records `inbound.error`, sends the generic failure reply,
/// and swallows it so the channel loop stays alive (SPEC_FULL.md §4.7/§7).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] nexus_store::StoreError),

    #[error(transparent)]
    Context(#[from] nexus_agent::ContextError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::Store(_) => "STORE_ERROR",
            OrchestratorError::Context(_) => "CONTEXT_ERROR",
            OrchestratorError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
