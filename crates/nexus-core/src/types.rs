use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a conversation. In WhatsApp this is a JID-like string
/// (`"15551234567@lid"`); in console it is the fixed literal `cli-user`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The literal chat id every console inbound is stamped with.
    pub const CONSOLE: &'static str = "cli-user";
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Return the user-part of a JID-like identifier, i.e. everything before
/// the first `@`. Used to compare identities across the `@lid` and
/// `@s.whatsapp.net` domains without caring which one either side used.
pub fn jid_user_part(id: &str) -> &str {
    match id.split_once('@') {
        Some((user, _domain)) => user,
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jid_user_part_strips_domain() {
        assert_eq!(jid_user_part("15551234567@lid"), "15551234567");
        assert_eq!(jid_user_part("15551234567@s.whatsapp.net"), "15551234567");
        assert_eq!(jid_user_part("cli-user"), "cli-user");
    }

    #[test]
    fn jid_user_part_cross_domain_match() {
        let a = jid_user_part("15551234567@lid");
        let b = jid_user_part("15551234567@s.whatsapp.net");
        assert_eq!(a, b);
    }
}
