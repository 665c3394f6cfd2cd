//! Reconnecting WebSocket client to the WhatsApp bridge. Ported from
//! `examples/original_source/nexus/channels/ws_client.py`'s `BridgeClient`
//! (envelope dispatch table, fixed reconnect delay, header-based auth).
//!
//! Deliberately uses a **fixed 2-second** reconnect delay rather than an
//! exponential-with-jitter backoff, matching the original's
//! `await asyncio.sleep(2)` exactly.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nexus_protocol::{BridgeEvent, DeliveryReceipt, Envelope, InboundMessage, OutboundMessage};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid connect request: {0}")]
    InvalidRequest(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Events surfaced to the orchestrator from the bridge connection.
#[derive(Debug)]
pub enum BridgeEventOut {
    Inbound { message: InboundMessage, trace_id: String },
    Delivery(DeliveryReceipt),
}

pub struct BridgeClient {
    ws_url: String,
    shared_secret: Option<String>,
}

impl BridgeClient {
    pub fn new(ws_url: impl Into<String>, shared_secret: Option<String>) -> Self {
        Self { ws_url: ws_url.into(), shared_secret }
    }

    /// Runs until `shutdown` broadcasts `true`, reconnecting on any error
    /// after a fixed 2-second delay.
    pub async fn run(
        &self,
        inbound_tx: mpsc::Sender<BridgeEventOut>,
        mut outbound_rx: mpsc::Receiver<OutboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(target = %self.ws_url, "bridge client starting");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.connect_once(&inbound_tx, &mut outbound_rx, &mut shutdown).await {
                Ok(()) => {}
                Err(e) => warn!(error = %e, "bridge connection error"),
            }
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("bridge client stopped");
    }

    async fn connect_once(
        &self,
        inbound_tx: &mpsc::Sender<BridgeEventOut>,
        outbound_rx: &mut mpsc::Receiver<OutboundMessage>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), BridgeError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert("x-nexus-client", HeaderValue::from_static("core"));
        if let Some(secret) = &self.shared_secret {
            let value = HeaderValue::from_str(secret).map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert("x-nexus-secret", value);
        }

        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        info!("bridge connected");
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => self.handle_message(&text, inbound_tx).await,
                        Some(Ok(WsMessage::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(message) => {
                            let env = Envelope::new("core.outbound_message", serde_json::to_value(&message)?);
                            write.send(WsMessage::Text(serde_json::to_string(&env)?)).await?;
                        }
                        None => return Ok(()),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.close().await;
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_message(&self, text: &str, inbound_tx: &mpsc::Sender<BridgeEventOut>) {
        let data: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "bridge received invalid JSON");
                return;
            }
        };
        let Some(event_str) = data.get("event").and_then(Value::as_str) else {
            warn!("bridge received envelope without valid event");
            return;
        };
        let trace_id = data
            .get("trace_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = data.get("payload").cloned().unwrap_or(Value::Null);

        match BridgeEvent::from_str(event_str) {
            BridgeEvent::InboundMessage => {
                for item in as_items(payload) {
                    match serde_json::from_value::<InboundMessage>(item) {
                        Ok(message) => {
                            debug!(id = %message.id, chat_id = %message.chat_id, "inbound bridge message");
                            if inbound_tx
                                .send(BridgeEventOut::Inbound { message, trace_id: trace_id.clone() })
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        Err(e) => warn!(error = %e, "bridge inbound payload validation failed"),
                    }
                }
            }
            BridgeEvent::DeliveryReceipt => {
                for item in as_items(payload) {
                    let chat_id = item.get("chat_id").and_then(Value::as_str).unwrap_or_default();
                    if chat_id.is_empty() {
                        continue;
                    }
                    let provider_message_id = item
                        .get("provider_message_id")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let provider_message_ids = item
                        .get("provider_message_ids")
                        .and_then(Value::as_array)
                        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                    let receipt = DeliveryReceipt {
                        chat_id: chat_id.to_string(),
                        provider_message_id,
                        provider_message_ids,
                    };
                    if inbound_tx.send(BridgeEventOut::Delivery(receipt)).await.is_err() {
                        return;
                    }
                }
            }
            BridgeEvent::Qr => info!("bridge received bridge.qr"),
            BridgeEvent::Connected => info!("bridge received bridge.connected"),
            BridgeEvent::Disconnected => {
                let reason = payload.get("reason").and_then(Value::as_str).unwrap_or("unknown");
                info!(reason, "bridge received bridge.disconnected");
            }
            BridgeEvent::Error => warn!(error = %payload, "bridge reported bridge.error"),
            BridgeEvent::ConnectionUpdate => {
                for item in as_items(payload) {
                    info!(
                        connection = ?item.get("connection"),
                        has_qr = ?item.get("has_qr"),
                        status_code = ?item.get("status_code"),
                        "bridge connection update"
                    );
                }
            }
            BridgeEvent::Ready | BridgeEvent::CoreOutboundMessage | BridgeEvent::CoreAck => {}
            BridgeEvent::Unknown => warn!(event = event_str, "bridge received unknown event"),
        }
    }
}

fn as_items(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        other => vec![other],
    }
}
