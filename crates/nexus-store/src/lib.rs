pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::{new_pending_action, Store};
pub use types::{AuditEvent, Job, JobKind, LedgerDirection, MessageRole, PersistedMessage};
