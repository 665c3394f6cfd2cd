//! Local stdin/stdout channel. Ported from
//! `examples/original_source/nexus/channels/cli.py`'s `CLIChannel`: a
//! background read loop, `exit`/`quit` sentinel, fixed `chat_id` of
//! `"cli-user"`, and a `nexus: <text>` reply format.

use nexus_protocol::InboundMessage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::warn;
use uuid::Uuid;

pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }

    /// Reads lines from stdin until `exit`/`quit` (case-insensitive, after
    /// trim) or EOF, forwarding each as an [`InboundMessage`] + trace id.
    pub async fn run(&self, inbound_tx: mpsc::Sender<(InboundMessage, String)>, mut shutdown: watch::Receiver<bool>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(text)) => {
                            if matches!(text.trim().to_lowercase().as_str(), "exit" | "quit") {
                                break;
                            }
                            let message = InboundMessage::console(text);
                            let trace_id = Uuid::new_v4().to_string();
                            if inbound_tx.send((message, trace_id)).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "console read error");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Print an outbound reply in the `nexus: <text>` format.
    pub fn send(&self, text: &str) {
        println!("nexus: {text}");
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}
