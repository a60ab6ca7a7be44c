//! The control-plane bridge.
//!
//! Owns the persistent connection, the command-correlation table and the
//! reconnection state machine, routes commands to targets through the
//! [`TargetRegistry`] and results back to the controller, and fans out
//! unsolicited stream frames.
//!
//! # Correctness
//!
//! The pending table is the only shared mutable state here. Every
//! correlation id ever assigned terminates in exactly one of two ways:
//! a matching response removes the entry and delivers the outcome, or
//! the per-request timer removes the entry and synthesizes a timeout.
//! `HashMap::remove` under the lock decides the race; the loser finds
//! the entry gone and does nothing.
//!
//! # Reconnection
//!
//! ```text
//! Disconnected --start()--> Connecting --open--> Connected
//!      ^                        ^                    |
//!      |                        |              close/error
//!      +---- 3000 ms timer -----+                    |
//!      +---------------------<-----------------------+
//! ```
//!
//! The retry delay is fixed at 3000 ms with no backoff growth and no
//! jitter, matching the remote end's own reconnect cadence. `stop()` is
//! the only transition that cancels the pending retry timer; in-flight
//! requests are left to expire through their individual timeouts.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result, wire};
use crate::identifiers::{RequestId, RequestIdAllocator, TargetId};
use crate::protocol::{Action, ControlMessage, Outcome, Request, StreamFrame, WireMessage};
use crate::registry::{TargetHandle, TargetRegistry};

use super::dial::Dialer;

// ============================================================================
// Constants
// ============================================================================

/// Default port the remote end listens on.
pub const DEFAULT_BRIDGE_PORT: u16 = 9333;

/// Fixed reconnection delay (no backoff, no jitter).
const RECONNECT_DELAY: Duration = Duration::from_millis(3_000);

/// Fixed per-request deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Stream frame fan-out capacity.
const FRAME_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// BridgeConfig
// ============================================================================

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the remote end.
    pub url: String,
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Per-request deadline.
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: format!("ws://127.0.0.1:{DEFAULT_BRIDGE_PORT}"),
            reconnect_delay: RECONNECT_DELAY,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    /// Creates the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the endpoint to localhost at the given port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.url = format!("ws://127.0.0.1:{port}");
        self
    }

    /// Sets the reconnection delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the per-request deadline.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; a retry may be scheduled.
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Live connection.
    Connected,
}

// ============================================================================
// PendingReply
// ============================================================================

/// Receiver half of a dispatched request.
///
/// Resolves exactly once: with the matching response's outcome or with a
/// synthesized timeout.
#[derive(Debug)]
pub struct PendingReply {
    id: RequestId,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingReply {
    /// Returns the correlation id of the request.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Awaits the terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the bridge was torn down
    /// before the entry resolved.
    pub async fn outcome(self) -> Result<Outcome> {
        Ok(self.rx.await?)
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// The control-plane bridge.
///
/// Cloning is cheap and shares the same connection, registry and
/// pending table.
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Clone for Bridge {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct BridgeInner {
    config: BridgeConfig,
    registry: TargetRegistry,
    ids: RequestIdAllocator,
    pending: Mutex<FxHashMap<RequestId, oneshot::Sender<Outcome>>>,
    frames: broadcast::Sender<StreamFrame>,
    state: Mutex<ConnectionState>,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Creates a bridge with the given configuration.
    ///
    /// The bridge starts disconnected; call [`Bridge::start`] to open
    /// the connection.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(BridgeInner {
                config,
                registry: TargetRegistry::new(),
                ids: RequestIdAllocator::new(),
                pending: Mutex::new(FxHashMap::default()),
                frames,
                state: Mutex::new(ConnectionState::Disconnected),
                shutdown,
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Opens the connection and begins the indefinite reconnection loop.
    ///
    /// A second call while the supervisor is running is a no-op.
    pub fn start(&self, dialer: Arc<dyn Dialer>) {
        let mut supervisor = self.inner.supervisor.lock();
        if let Some(handle) = supervisor.as_ref()
            && !handle.is_finished()
        {
            warn!("Bridge already started");
            return;
        }

        let _ = self.inner.shutdown.send(false);
        let inner = Arc::clone(&self.inner);
        *supervisor = Some(tokio::spawn(run_supervisor(inner, dialer)));
    }

    /// Tears the connection down and cancels the pending retry timer.
    ///
    /// In-flight requests are not proactively rejected; they expire
    /// through their individual timeouts.
    pub fn stop(&self) {
        let _ = self.inner.shutdown.send(true);
        self.inner.supervisor.lock().take();
        info!("Bridge stopped");
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns the target registry.
    #[must_use]
    pub fn registry(&self) -> &TargetRegistry {
        &self.inner.registry
    }

    /// Returns the number of in-flight requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Subscribes to unsolicited stream frames from all targets.
    #[must_use]
    pub fn subscribe_frames(&self) -> broadcast::Receiver<StreamFrame> {
        self.inner.frames.subscribe()
    }

    /// Returns the frame sink shared with locally running stream
    /// producers.
    #[must_use]
    pub fn frame_sink(&self) -> broadcast::Sender<StreamFrame> {
        self.inner.frames.clone()
    }
}

// ============================================================================
// Bridge - Dispatch
// ============================================================================

impl Bridge {
    /// Dispatches a command and returns the pending reply.
    ///
    /// Target resolution: the explicit id when given, otherwise the
    /// first registered target. With no target available this fails
    /// synchronously with [`Error::NoActiveTarget`], before any
    /// correlation id is consumed.
    ///
    /// Commands to the same target are not serialized; await each reply
    /// when ordering matters.
    pub fn dispatch(&self, target: Option<TargetId>, action: Action) -> Result<PendingReply> {
        let handle = match target {
            Some(id) => self.inner.registry.get(id),
            None => self.inner.registry.first(),
        }
        .ok_or(Error::NoActiveTarget)?;

        let id = self.inner.ids.allocate();
        let action_name = action.name();
        let request = Request::new(id, action, handle.id);
        let text = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        if !handle.forward(text) {
            self.inner.pending.lock().remove(&id);
            return Err(Error::ConnectionClosed);
        }

        trace!(request_id = %id, target_id = %handle.id, action = action_name, "Dispatched");

        // Deadline task: loses cleanly to a response that removes the
        // entry first.
        let inner = Arc::clone(&self.inner);
        let deadline = self.inner.config.request_timeout;
        tokio::spawn(async move {
            sleep(deadline).await;
            if let Some(tx) = inner.pending.lock().remove(&id) {
                debug!(request_id = %id, "Request timed out");
                let _ = tx.send(Outcome::Failure(wire::TIMEOUT.to_string()));
            }
        });

        Ok(PendingReply { id, rx })
    }

    /// Dispatches a command and awaits its result.
    ///
    /// # Errors
    ///
    /// Wire error codes are mapped back to structured errors; a
    /// synthesized timeout becomes [`Error::RequestTimeout`].
    pub async fn send(&self, target: Option<TargetId>, action: Action) -> Result<Value> {
        let reply = self.dispatch(target, action)?;
        let id = reply.id();

        match reply.outcome().await? {
            Outcome::Failure(code) if code == wire::TIMEOUT => Err(Error::request_timeout(
                id,
                self.inner.config.request_timeout.as_millis() as u64,
            )),
            outcome => outcome.into_result(id),
        }
    }

    /// Resolves the matching pending request, if present.
    ///
    /// Unmatched ids are silently dropped: the entry either already
    /// resolved (late response after timeout) or never existed.
    pub fn resolve(&self, id: RequestId, outcome: Outcome) {
        self.inner.resolve(id, outcome);
    }
}

// ============================================================================
// BridgeInner
// ============================================================================

impl BridgeInner {
    fn set_state(&self, state: ConnectionState) {
        let mut guard = self.state.lock();
        if *guard != state {
            debug!(?state, "Connection state changed");
            *guard = state;
        }
    }

    fn resolve(&self, id: RequestId, outcome: Outcome) {
        let tx = self.pending.lock().remove(&id);
        match tx {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => {
                trace!(request_id = %id, "Dropping outcome for unknown or resolved id");
            }
        }
    }

    /// Handles one inbound text frame from the connection.
    fn handle_inbound(&self, text: &str, outbound: &mpsc::UnboundedSender<String>) {
        match WireMessage::decode(text) {
            Ok(WireMessage::Response(response)) => {
                let id = response.id;
                self.resolve(id, response.into_outcome());
            }

            Ok(WireMessage::Frame(frame)) => {
                trace!(target_id = %frame.target(), "Stream frame");
                let _ = self.frames.send(frame);
            }

            Ok(WireMessage::Control(control)) => match control {
                ControlMessage::TargetAttached { tab_id } => {
                    self.registry
                        .attach(TargetHandle::new(tab_id, outbound.clone()));
                }
                ControlMessage::TargetDetached { tab_id } => {
                    self.registry.detach(tab_id);
                }
            },

            Err(e) => {
                warn!(error = %e, "Undecodable inbound message");
            }
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Connection supervisor: dial, pump, reconnect after a fixed delay.
async fn run_supervisor(inner: Arc<BridgeInner>, dialer: Arc<dyn Dialer>) {
    let mut shutdown = inner.shutdown.subscribe();

    'reconnect: loop {
        if *shutdown.borrow() {
            break;
        }

        inner.set_state(ConnectionState::Connecting);
        info!(url = %inner.config.url, "Connecting");

        let dialed = tokio::select! {
            _ = shutdown.changed() => break 'reconnect,
            dialed = dialer.dial(&inner.config.url) => dialed,
        };

        match dialed {
            Ok(mut conduit) => {
                inner.set_state(ConnectionState::Connected);
                info!("Connected");

                let outbound = conduit.tx.clone();
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break 'reconnect,
                        message = conduit.rx.recv() => match message {
                            Some(text) => inner.handle_inbound(&text, &outbound),
                            None => break,
                        }
                    }
                }

                // Close event: targets are gone until they re-announce.
                // Pending requests are left to their own timeouts.
                inner.registry.clear();
                inner.set_state(ConnectionState::Disconnected);
                warn!("Connection lost");
            }

            Err(e) => {
                inner.set_state(ConnectionState::Disconnected);
                warn!(error = %e, "Connect failed");
            }
        }

        // Fixed-delay retry; stop() is the only cancellation.
        tokio::select! {
            _ = shutdown.changed() => break 'reconnect,
            () = sleep(inner.config.reconnect_delay) => {}
        }
    }

    inner.registry.clear();
    inner.set_state(ConnectionState::Disconnected);
    debug!("Supervisor terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::{Duration, Instant, advance};

    use crate::transport::dial::Conduit;

    fn attach_target(bridge: &Bridge, id: u32) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        bridge
            .registry()
            .attach(TargetHandle::new(TargetId::new(id), tx));
        rx
    }

    #[tokio::test]
    async fn test_dispatch_without_target() {
        let bridge = Bridge::new(BridgeConfig::default());

        let err = bridge.dispatch(None, Action::GetDom {}).unwrap_err();
        assert!(matches!(err, Error::NoActiveTarget));
        // No correlation id was consumed.
        let _rx = attach_target(&bridge, 1);
        let reply = bridge.dispatch(None, Action::GetDom {}).expect("dispatch");
        assert_eq!(reply.id(), RequestId::from_u64(1));
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_explicit_target() {
        let bridge = Bridge::new(BridgeConfig::default());
        let mut rx1 = attach_target(&bridge, 1);
        let mut rx2 = attach_target(&bridge, 2);

        let _reply = bridge
            .dispatch(Some(TargetId::new(2)), Action::GetDom {})
            .expect("dispatch");

        let wire = rx2.try_recv().expect("routed to target 2");
        assert!(rx1.try_recv().is_err());

        let value: Value = serde_json::from_str(&wire).expect("json");
        assert_eq!(value["action"], "getDOM");
        assert_eq!(value["tabId"], 2);
    }

    #[tokio::test]
    async fn test_dispatch_falls_back_to_first_target() {
        let bridge = Bridge::new(BridgeConfig::default());
        let _rx9 = attach_target(&bridge, 9);
        let mut rx2 = attach_target(&bridge, 2);

        let _reply = bridge.dispatch(None, Action::GetDom {}).expect("dispatch");
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_resolve_delivers_exactly_once() {
        let bridge = Bridge::new(BridgeConfig::default());
        let _rx = attach_target(&bridge, 1);

        let reply = bridge.dispatch(None, Action::GetDom {}).expect("dispatch");
        let id = reply.id();

        bridge.resolve(id, Outcome::Success(json!("<html></html>")));
        // A second resolution finds the entry gone and is dropped.
        bridge.resolve(id, Outcome::Success(json!("duplicate")));

        let outcome = reply.outcome().await.expect("outcome");
        assert_eq!(outcome, Outcome::Success(json!("<html></html>")));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_synthesized_after_deadline() {
        let bridge = Bridge::new(BridgeConfig::default());
        let _rx = attach_target(&bridge, 1);

        let reply = bridge.dispatch(None, Action::GetDom {}).expect("dispatch");
        let id = reply.id();
        assert_eq!(bridge.pending_count(), 1);

        let outcome = reply.outcome().await.expect("outcome");
        assert_eq!(outcome, Outcome::Failure("timeout".to_string()));
        assert_eq!(bridge.pending_count(), 0);

        // A late response is dropped, not re-delivered.
        bridge.resolve(id, Outcome::Success(json!("late")));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_maps_timeout_error() {
        let bridge = Bridge::new(BridgeConfig::default());
        let _rx = attach_target(&bridge, 1);

        let err = bridge.send(None, Action::GetDom {}).await.unwrap_err();
        match err {
            Error::RequestTimeout { timeout_ms, .. } => assert_eq!(timeout_ms, 30_000),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_send_maps_wire_error() {
        let bridge = Bridge::new(BridgeConfig::default());
        let _rx = attach_target(&bridge, 1);

        let bridge_clone = bridge.clone();
        let task = tokio::spawn(async move {
            bridge_clone
                .send(
                    None,
                    Action::Click {
                        selector: Some("#missing".to_string()),
                        x: None,
                        y: None,
                    },
                )
                .await
        });

        // Let the dispatch land, then answer it.
        tokio::task::yield_now().await;
        bridge.resolve(
            RequestId::from_u64(1),
            Outcome::Failure("element not found".to_string()),
        );

        let err = task.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    // ------------------------------------------------------------------
    // Reconnection
    // ------------------------------------------------------------------

    /// Dialer whose connections close immediately; records dial times.
    struct ClosingDialer {
        times: Arc<StdMutex<Vec<Instant>>>,
    }

    #[async_trait]
    impl Dialer for ClosingDialer {
        async fn dial(&self, _url: &str) -> Result<Conduit> {
            self.times.lock().unwrap().push(Instant::now());
            let (conduit, _far_rx, far_tx) = Conduit::pair();
            drop(far_tx); // immediate close event
            Ok(conduit)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_fixed_delay_no_growth() {
        let times = Arc::new(StdMutex::new(Vec::new()));
        let dialer = Arc::new(ClosingDialer {
            times: Arc::clone(&times),
        });

        let bridge = Bridge::new(BridgeConfig::default());
        bridge.start(dialer);

        // Enough virtual time for four connection attempts.
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        bridge.stop();

        let recorded = times.lock().unwrap().clone();
        assert!(recorded.len() >= 3, "expected retries, got {recorded:?}");
        for pair in recorded.windows(2) {
            let delta = pair[1] - pair[0];
            assert_eq!(delta, Duration::from_millis(3_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_retry_timer() {
        let times = Arc::new(StdMutex::new(Vec::new()));
        let dialer = Arc::new(ClosingDialer {
            times: Arc::clone(&times),
        });

        let bridge = Bridge::new(BridgeConfig::default());
        bridge.start(dialer);

        tokio::time::sleep(Duration::from_millis(100)).await;
        bridge.stop();
        let count_at_stop = times.lock().unwrap().len();

        advance(Duration::from_millis(60_000)).await;
        assert_eq!(times.lock().unwrap().len(), count_at_stop);
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
    }

    /// Dialer whose far side attaches one target and echoes every
    /// request back as a success response.
    struct ServingDialer;

    #[async_trait]
    impl Dialer for ServingDialer {
        async fn dial(&self, _url: &str) -> Result<Conduit> {
            let (conduit, mut far_rx, far_tx) = Conduit::pair();
            tokio::spawn(async move {
                let attach = json!({ "type": "targetAttached", "tabId": 1 }).to_string();
                if far_tx.send(attach).is_err() {
                    return;
                }
                while let Some(text) = far_rx.recv().await {
                    let request: Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    let reply = json!({ "id": request["id"], "result": "<html></html>" });
                    if far_tx.send(reply.to_string()).is_err() {
                        break;
                    }
                }
            });
            Ok(conduit)
        }
    }

    #[tokio::test]
    async fn test_end_to_end_round_trip() {
        let bridge = Bridge::new(BridgeConfig::default());
        bridge.start(Arc::new(ServingDialer));

        // Let the supervisor connect and process the attach.
        for _ in 0..100 {
            if !bridge.registry().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bridge.state(), ConnectionState::Connected);
        assert_eq!(bridge.registry().ids(), vec![TargetId::new(1)]);

        let result = bridge.send(None, Action::GetDom {}).await.expect("send");
        assert_eq!(result, json!("<html></html>"));
        assert_eq!(bridge.pending_count(), 0);

        bridge.stop();
    }

    #[tokio::test]
    async fn test_frames_fan_out_to_subscribers() {
        let bridge = Bridge::new(BridgeConfig::default());
        let mut frames = bridge.subscribe_frames();

        let frame = StreamFrame::Screenshot {
            tab_id: TargetId::new(1),
            data: "data:image/jpeg;base64,YWJj".to_string(),
            timestamp: 0,
        };
        let _ = bridge.frame_sink().send(frame.clone());

        assert_eq!(frames.recv().await.expect("frame"), frame);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_loss_leaves_pending_to_timeout() {
        let bridge = Bridge::new(BridgeConfig::default());
        let rx = attach_target(&bridge, 1);

        let reply = bridge.dispatch(None, Action::GetDom {}).expect("dispatch");
        assert_eq!(bridge.pending_count(), 1);

        // Simulated connection loss: targets go away, pending stays.
        drop(rx);
        bridge.registry().clear();
        assert_eq!(bridge.pending_count(), 1);

        let outcome = reply.outcome().await.expect("outcome");
        assert_eq!(outcome, Outcome::Failure("timeout".to_string()));
    }
}
