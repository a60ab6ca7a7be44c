//! Direct debugging-protocol client.
//!
//! Bypasses the extension transport and speaks the browser's debugging
//! protocol directly: page targets are discovered over the HTTP `/json`
//! endpoint, then commands travel over the target's own WebSocket as
//! `{id, method, params}` with replies keyed by `id`.
//!
//! The client keeps its own correlation table, separate from the
//! bridge's. Protocol events (messages with a `method` and no `id`) are
//! not consumed by any current caller and are dropped at trace level.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::transport::dial::{Conduit, Dialer, WsDialer};

// ============================================================================
// Constants
// ============================================================================

/// Default port of the browser's debugging endpoint.
pub const DEFAULT_CDP_PORT: u16 = 9222;

/// Fixed per-command deadline.
const COMMAND_TIMEOUT: Duration = Duration::from_millis(30_000);

// ============================================================================
// CdpConfig
// ============================================================================

/// Direct-protocol connection settings.
#[derive(Debug, Clone)]
pub struct CdpConfig {
    /// Host of the debugging endpoint.
    pub host: String,
    /// Port of the debugging endpoint.
    pub port: u16,
    /// Per-command deadline.
    pub request_timeout: Duration,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_CDP_PORT,
            request_timeout: COMMAND_TIMEOUT,
        }
    }
}

impl CdpConfig {
    /// Returns the discovery endpoint URL.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!("http://{}:{}/json", self.host, self.port)
    }
}

// ============================================================================
// DiscoveredTarget
// ============================================================================

/// One entry of the `/json` discovery listing.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredTarget {
    /// Opaque target id assigned by the browser.
    pub id: String,

    /// Page title, when known.
    #[serde(default)]
    pub title: String,

    /// Current URL.
    #[serde(default)]
    pub url: String,

    /// Target kind; commands only make sense against `"page"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Per-target command socket. Absent when another client already
    /// holds the connection.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: Option<String>,
}

impl DiscoveredTarget {
    /// Returns `true` for connectable page targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.kind == "page" && self.ws_url.is_some()
    }
}

// ============================================================================
// CdpChannel
// ============================================================================

/// A command channel speaking `{id, method, params}`.
///
/// The executor is written against this trait so its page logic can be
/// exercised without a live browser.
#[async_trait]
pub trait CdpChannel: Send + Sync {
    /// Sends one command and awaits its reply payload.
    async fn send(&self, method: &str, params: Value) -> Result<Value>;
}

// ============================================================================
// CdpClient
// ============================================================================

/// Reply routed back to a waiting command.
type CommandReply = std::result::Result<Value, String>;

/// Live direct-protocol connection to one page target.
pub struct CdpClient {
    inner: Arc<CdpClientInner>,
}

impl Clone for CdpClient {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CdpClientInner {
    tx: tokio::sync::mpsc::UnboundedSender<String>,
    pending: Mutex<FxHashMap<u64, oneshot::Sender<CommandReply>>>,
    ids: AtomicU64,
    request_timeout: Duration,
}

impl CdpClient {
    /// Discovers the browser's targets over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] when the endpoint is unreachable or the
    /// listing does not parse.
    pub async fn discover(config: &CdpConfig) -> Result<Vec<DiscoveredTarget>> {
        let targets: Vec<DiscoveredTarget> = reqwest::get(config.discovery_url())
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = targets.len(), "Discovered debugging targets");
        Ok(targets)
    }

    /// Connects to the first connectable page target.
    ///
    /// # Errors
    ///
    /// Fails when discovery errors or no page target is available.
    pub async fn connect(config: &CdpConfig) -> Result<Self> {
        let targets = Self::discover(config).await?;
        let page = targets
            .into_iter()
            .find(DiscoveredTarget::is_page)
            .ok_or_else(|| Error::connection("no connectable page target"))?;

        debug!(url = %page.url, title = %page.title, "Connecting to page target");
        // is_page guarantees the socket URL.
        let ws_url = page
            .ws_url
            .ok_or_else(|| Error::connection("page target without socket url"))?;

        let conduit = WsDialer::new().dial(&ws_url).await?;
        Ok(Self::over(conduit, config.request_timeout))
    }

    /// Builds a client over an already-established conduit.
    #[must_use]
    pub fn over(mut conduit: Conduit, request_timeout: Duration) -> Self {
        let inner = Arc::new(CdpClientInner {
            tx: conduit.tx.clone(),
            pending: Mutex::new(FxHashMap::default()),
            ids: AtomicU64::new(1),
            request_timeout,
        });

        let router = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(text) = conduit.rx.recv().await {
                router.route(&text);
            }
            // Socket gone: waiting commands will never be answered.
            let drained: Vec<_> = router.pending.lock().drain().collect();
            if !drained.is_empty() {
                warn!(count = drained.len(), "Connection closed with commands in flight");
            }
            for (_, tx) in drained {
                let _ = tx.send(Err("connection closed".to_string()));
            }
        });

        Self { inner }
    }
}

impl CdpClientInner {
    /// Routes one inbound message to its waiting command, if any.
    fn route(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparseable protocol message");
                return;
            }
        };

        let Some(id) = value.get("id").and_then(Value::as_u64) else {
            trace!(
                method = value.get("method").and_then(|v| v.as_str()).unwrap_or("?"),
                "Protocol event dropped"
            );
            return;
        };

        let Some(tx) = self.pending.lock().remove(&id) else {
            trace!(id, "Reply for unknown or expired command");
            return;
        };

        let reply = match value.get("error") {
            Some(error) => {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown protocol error");
                Err(message.to_string())
            }
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = tx.send(reply);
    }
}

#[async_trait]
impl CdpChannel for CdpClient {
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.inner.ids.fetch_add(1, Ordering::Relaxed);
        let text = json!({ "id": id, "method": method, "params": params }).to_string();

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        if self.inner.tx.send(text).is_err() {
            self.inner.pending.lock().remove(&id);
            return Err(Error::ConnectionClosed);
        }
        trace!(id, method, "Command sent");

        match timeout(self.inner.request_timeout, rx).await {
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(Error::request_timeout(
                    RequestId::from_u64(id),
                    self.inner.request_timeout.as_millis() as u64,
                ))
            }
            Ok(reply) => match reply? {
                Ok(result) => Ok(result),
                Err(message) => Err(Error::protocol(format!("{method}: {message}"))),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
