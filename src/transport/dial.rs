//! Connection dialing.
//!
//! [`Dialer`] abstracts how the persistent connection is established so
//! the bridge's reconnection machinery can be driven by an in-memory
//! transport in tests. [`WsDialer`] is the production implementation over
//! tokio-tungstenite.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Conduit
// ============================================================================

/// A live message conduit to the remote end.
///
/// `tx` carries serialized outbound messages; `rx` yields inbound text
/// frames and returns `None` once the connection has closed.
#[derive(Debug)]
pub struct Conduit {
    /// Outbound messages.
    pub tx: mpsc::UnboundedSender<String>,
    /// Inbound messages; `None` signals connection close.
    pub rx: mpsc::UnboundedReceiver<String>,
}

impl Conduit {
    /// Creates a conduit pair for in-memory transports.
    ///
    /// Returns the conduit plus the far side: a receiver of outbound
    /// messages and a sender for inbound ones.
    #[must_use]
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: out_tx,
                rx: in_rx,
            },
            out_rx,
            in_tx,
        )
    }
}

// ============================================================================
// Dialer
// ============================================================================

/// Establishes the persistent connection to the remote end.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dials the endpoint and returns a live conduit.
    ///
    /// # Errors
    ///
    /// Returns a connection error when the endpoint is unreachable.
    async fn dial(&self, url: &str) -> Result<Conduit>;
}

// ============================================================================
// WsDialer
// ============================================================================

/// WebSocket dialer over tokio-tungstenite.
///
/// Spawns two pump tasks per connection: one draining the outbound
/// channel into the socket, one feeding inbound text frames into the
/// conduit. Both terminate when the socket closes; dropping the inbound
/// sender signals the close to the conduit owner.
#[derive(Debug, Default)]
pub struct WsDialer;

impl WsDialer {
    /// Creates a WebSocket dialer.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, url: &str) -> Result<Conduit> {
        let endpoint = Url::parse(url)
            .map_err(|e| Error::connection(format!("invalid endpoint {url}: {e}")))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::connection(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }

        let (ws_stream, _) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| Error::connection(format!("dial {url}: {e}")))?;

        debug!(url, "WebSocket connected");

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        // Outbound pump: conduit -> socket.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                    warn!(error = %e, "Outbound send failed");
                    break;
                }
            }
            let _ = ws_write.close().await;
        });

        // Inbound pump: socket -> conduit. Dropping in_tx closes the
        // conduit's rx, which the bridge treats as a close event.
        tokio::spawn(async move {
            while let Some(message) = ws_read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("WebSocket closed by remote");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }
        });

        Ok(Conduit {
            tx: out_tx,
            rx: in_rx,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
