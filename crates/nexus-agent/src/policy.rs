//! Human-in-the-loop confirmation policy: pending actions with lazy TTL
//! expiry. Ported verbatim (token sets, 10-minute TTL, "latest pending
//! wins" tie-break) from `examples/original_source/nexus/core/policy.py`.

use chrono::Utc;
use nexus_protocol::pending_action::{PendingAction, PendingActionStatus, RiskLevel};
use nexus_store::Store;

const YES: &[&str] = &["y", "yes", "approve", "confirm", "proceed"];
const NO: &[&str] = &["n", "no", "deny", "cancel", "stop"];

pub struct PolicyEngine {
    store: Store,
}

impl PolicyEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn create_pending_action(
        &self,
        chat_id: &str,
        tool_name: &str,
        risk_level: RiskLevel,
        proposed_args: serde_json::Value,
    ) -> nexus_store::Result<PendingAction> {
        let action = nexus_store::new_pending_action(chat_id, tool_name, risk_level, proposed_args);
        self.store.insert_pending_action(&action)?;
        Ok(action)
    }

    /// `Some(Approved)`/`Some(Denied)` for a recognized confirmation token,
    /// `None` for anything else (not a yes/no reply at all).
    pub fn parse_confirmation(text: &str) -> Option<PendingActionStatus> {
        let lowered = text.trim().to_lowercase();
        if YES.contains(&lowered.as_str()) {
            return Some(PendingActionStatus::Approved);
        }
        if NO.contains(&lowered.as_str()) {
            return Some(PendingActionStatus::Denied);
        }
        None
    }

    /// Resolve the latest pending action for `chat_id` against a yes/no
    /// reply. Returns `None` when `text` isn't a confirmation token, there's
    /// no pending action, or the pending action already expired (in which
    /// case it's marked `expired` as a side effect).
    pub fn resolve_pending_action_from_text(
        &self,
        chat_id: &str,
        text: &str,
    ) -> nexus_store::Result<Option<PendingAction>> {
        let decision = match Self::parse_confirmation(text) {
            Some(d) => d,
            None => return Ok(None),
        };
        let pending = match self.store.get_latest_pending_action(chat_id)? {
            Some(p) => p,
            None => return Ok(None),
        };

        if pending.expires_at < Utc::now() {
            self.store
                .update_pending_status(&pending.action_id, PendingActionStatus::Expired)?;
            return Ok(None);
        }

        self.store.update_pending_status(&pending.action_id, decision)?;
        Ok(Some(PendingAction {
            status: decision,
            ..pending
        }))
    }
}
