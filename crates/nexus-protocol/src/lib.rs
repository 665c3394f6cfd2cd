pub mod message;
pub mod pending_action;
pub mod ws;

pub use message::{
    Attachment, InboundMessage, MediaItem, MediaKind, OutboundMessage,
};
pub use pending_action::{PendingAction, PendingActionStatus, RiskLevel};
pub use ws::{BridgeEvent, DeliveryReceipt, Envelope};
