use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingActionStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

/// A persisted proposal awaiting a free-text YES/NO confirmation.
///
/// Invariants (SPEC_FULL.md §3): at most one `pending` per chat is
/// considered current (most recent by `created_at`); transitions
/// `pending -> approved|denied|expired` are terminal; `expired` is applied
/// lazily when a confirmation arrives after `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub action_id: String,
    pub chat_id: String,
    pub tool_name: String,
    pub risk_level: RiskLevel,
    /// Opaque JSON object carrying `{tool, args}`, replayed verbatim on approval.
    pub proposed_args: Value,
    pub status: PendingActionStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
