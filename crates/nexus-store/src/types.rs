use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// `{id, channel, chatID, senderID, role, text, traceID, createdAt}`.
/// Upserted by id (`INSERT OR REPLACE`). See SPEC_FULL.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub id: String,
    pub channel: String,
    pub chat_id: String,
    pub sender_id: String,
    pub role: MessageRole,
    pub text: String,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerDirection {
    Inbound,
    Outbound,
}

impl LedgerDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerDirection::Inbound => "inbound",
            LedgerDirection::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Cron,
    Date,
}

/// `{jobID, chatID, spec {when, text, kind}, nextRunAt?, createdAt}`.
/// See SPEC_FULL.md §3 / §4.8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub chat_id: String,
    /// Free-text trigger string, e.g. `"every monday at 8:00"`.
    pub when_spec: String,
    pub text: String,
    pub kind: JobKind,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub trace_id: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
