use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every bridge wire frame is `{event: string, payload: object|array|null}`.
/// See SPEC_FULL.md §4.9 / §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            event: event.into(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }
}

/// Recognized bridge-to-orchestrator event names plus the two
/// orchestrator-to-bridge events. `Ready` and `CoreAck` are part of the
/// original wire surface but are never dispatched to — reserved/unused,
/// per SPEC_FULL.md §9 Open Questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    InboundMessage,
    DeliveryReceipt,
    Qr,
    Connected,
    Disconnected,
    Error,
    ConnectionUpdate,
    Ready,
    CoreOutboundMessage,
    CoreAck,
    Unknown,
}

impl BridgeEvent {
    pub fn from_str(event: &str) -> Self {
        match event {
            "bridge.inbound_message" => Self::InboundMessage,
            "bridge.delivery_receipt" => Self::DeliveryReceipt,
            "bridge.qr" => Self::Qr,
            "bridge.connected" => Self::Connected,
            "bridge.disconnected" => Self::Disconnected,
            "bridge.error" => Self::Error,
            "bridge.connection_update" => Self::ConnectionUpdate,
            "bridge.ready" => Self::Ready,
            "core.outbound_message" => Self::CoreOutboundMessage,
            "core.ack" => Self::CoreAck,
            _ => Self::Unknown,
        }
    }
}

/// `bridge.delivery_receipt` payload shape: a provider message id (and
/// optionally a batch of ids) confirming our own outbound was delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub chat_id: String,
    #[serde(default)]
    pub provider_message_id: Option<String>,
    #[serde(default)]
    pub provider_message_ids: Vec<String>,
}

impl DeliveryReceipt {
    /// All ids this receipt confirms, deduplicated, in encounter order.
    pub fn all_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        if let Some(id) = &self.provider_message_id {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
        for id in &self.provider_message_ids {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
        ids
    }
}
