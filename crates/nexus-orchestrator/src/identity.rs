//! Self-chat identity matching: compare the normalized user-part of a
//! sender id against a chat id across the `@lid`/`@s.whatsapp.net`
//! domains the bridge may present for the same underlying number.
//!
//! `examples/original_source/nexus/core/loop.py` never does this
//! comparison itself — it trusts `is_self_chat`/`is_from_me` booleans the
//! bridge already resolved. This module exists because this repo has no
//! bridge-side component upstream of `Orchestrator::handle_inbound` to
//! have done that resolution, and SPEC_FULL.md §4.7 calls for the
//! normalization explicitly so scenario 2 of spec.md §8 can be exercised
//! end-to-end within this crate.

pub use nexus_core::types::jid_user_part as user_part;

/// True when `sender_id` and `chat_id` name the same underlying identity
/// once their domain suffixes are stripped.
pub fn is_same_identity(sender_id: &str, chat_id: &str) -> bool {
    user_part(sender_id) == user_part(chat_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_across_lid_and_whatsapp_net_domains() {
        assert!(is_same_identity("15551234567@lid", "15551234567@s.whatsapp.net"));
    }

    #[test]
    fn rejects_different_numbers() {
        assert!(!is_same_identity("15551234567@lid", "15559876543@lid"));
    }
}
