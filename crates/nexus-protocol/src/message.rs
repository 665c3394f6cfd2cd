use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record produced by a channel adapter (bridge or console).
///
/// Invariant: at least one of `text` or `media` is non-empty for WhatsApp;
/// console messages always carry text. See SPEC_FULL.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider-assigned id, or a freshly generated UUID for console.
    pub id: String,
    pub channel: String,
    pub chat_id: String,
    pub sender_id: String,
    pub is_self_chat: bool,
    pub is_from_me: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// A WhatsApp protocol receipt carries neither text nor media.
    pub fn is_empty_payload(&self) -> bool {
        self.text.as_deref().map(str::trim).unwrap_or("").is_empty() && self.media.is_empty()
    }

    /// Console helper: build an inbound from a single line of stdin input.
    pub fn console(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel: "console".to_string(),
            chat_id: "cli-user".to_string(),
            sender_id: "cli-user".to_string(),
            is_self_chat: true,
            is_from_me: false,
            text: Some(text.into()),
            media: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// `{id, channel, chatID, text?, attachments?, replyTo?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: String,
    pub channel: String,
    pub chat_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    pub fn text_reply(channel: &str, chat_id: &str, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            text: Some(text.into()),
            attachments: Vec::new(),
            reply_to: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub path: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}
