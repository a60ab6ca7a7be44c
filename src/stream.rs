//! Streaming channel management.
//!
//! Two per-target streams exist: a DOM mutation stream (batched observer
//! summaries) and a periodic screenshot stream. [`StreamManager`] owns at
//! most one producer per (kind, target) pair; start and stop are
//! idempotent, and frames from every producer fan out through a single
//! broadcast sink shared with the bridge's remote frames.
//!
//! The capture side is abstracted behind [`CapturePrimitives`] so the
//! manager can be driven by the direct-protocol executor in production
//! and by a mock under a simulated clock in tests.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::TargetId;
use crate::protocol::{MutationSummary, StreamFrame, unix_millis};

// ============================================================================
// Constants
// ============================================================================

/// Default screenshot capture interval.
pub const DEFAULT_SCREENSHOT_INTERVAL: Duration = Duration::from_millis(3_000);

/// Default screenshot JPEG quality.
pub const DEFAULT_SCREENSHOT_QUALITY: f32 = 0.2;

/// Mutation batch drain cadence.
const DOM_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// StreamKind
// ============================================================================

/// The two per-target stream channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Batched DOM mutation summaries.
    Dom,
    /// Periodic screenshot frames.
    Screenshot,
}

// ============================================================================
// CapturePrimitives
// ============================================================================

/// Capture operations a stream producer needs from the page.
#[async_trait]
pub trait CapturePrimitives: Send + Sync {
    /// Captures one screenshot as a base64 data URI.
    async fn capture_screenshot(&self, target: TargetId, quality: f32) -> Result<String>;

    /// Installs the mutation observer in the target's page.
    async fn install_observer(&self, target: TargetId) -> Result<()>;

    /// Drains the batch of mutations observed since the last drain.
    async fn drain_mutations(&self, target: TargetId) -> Result<Vec<MutationSummary>>;

    /// Removes the mutation observer.
    async fn remove_observer(&self, target: TargetId) -> Result<()>;
}

// ============================================================================
// StreamManager
// ============================================================================

/// Owns the stream producers, at most one per (kind, target).
pub struct StreamManager {
    primitives: Arc<dyn CapturePrimitives>,
    frames: broadcast::Sender<StreamFrame>,
    sessions: Mutex<FxHashMap<(StreamKind, TargetId), JoinHandle<()>>>,
}

impl StreamManager {
    /// Creates a manager emitting into the given frame sink.
    #[must_use]
    pub fn new(
        primitives: Arc<dyn CapturePrimitives>,
        frames: broadcast::Sender<StreamFrame>,
    ) -> Self {
        Self {
            primitives,
            frames,
            sessions: Mutex::new(FxHashMap::default()),
        }
    }

    /// Starts the screenshot stream for a target.
    ///
    /// The first frame is captured immediately, subsequent ones every
    /// `interval`. Idempotent: a second start while the producer runs is
    /// a no-op and returns `false`.
    pub fn start_screenshots(&self, target: TargetId, interval_ms: u64, quality: f32) -> bool {
        let mut sessions = self.sessions.lock();
        let key = (StreamKind::Screenshot, target);
        if let Some(handle) = sessions.get(&key)
            && !handle.is_finished()
        {
            debug!(target_id = %target, "Screenshot stream already running");
            return false;
        }

        let primitives = Arc::clone(&self.primitives);
        let frames = self.frames.clone();
        let period = Duration::from_millis(interval_ms.max(1));

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately. Each capture runs
                // fire-and-forget so a slow one never pushes back the
                // next tick; frames may arrive out of order under load.
                ticker.tick().await;
                let primitives = Arc::clone(&primitives);
                let frames = frames.clone();
                tokio::spawn(async move {
                    match primitives.capture_screenshot(target, quality).await {
                        Ok(data) => {
                            let _ = frames.send(StreamFrame::Screenshot {
                                tab_id: target,
                                data,
                                timestamp: unix_millis(),
                            });
                        }
                        Err(e) => {
                            warn!(target_id = %target, error = %e, "Screenshot capture failed");
                        }
                    }
                });
            }
        });

        sessions.insert(key, handle);
        debug!(target_id = %target, interval_ms, quality, "Screenshot stream started");
        true
    }

    /// Starts the DOM mutation stream for a target.
    ///
    /// Installs the page observer, then drains and emits batches on a
    /// fixed cadence; empty batches are not emitted. Idempotent.
    pub fn start_dom(&self, target: TargetId) -> bool {
        let mut sessions = self.sessions.lock();
        let key = (StreamKind::Dom, target);
        if let Some(handle) = sessions.get(&key)
            && !handle.is_finished()
        {
            debug!(target_id = %target, "DOM stream already running");
            return false;
        }

        let primitives = Arc::clone(&self.primitives);
        let frames = self.frames.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = primitives.install_observer(target).await {
                warn!(target_id = %target, error = %e, "Observer install failed");
                return;
            }
            loop {
                sleep(DOM_POLL_INTERVAL).await;
                match primitives.drain_mutations(target).await {
                    Ok(changes) if changes.is_empty() => {}
                    Ok(changes) => {
                        let _ = frames.send(StreamFrame::DomStream {
                            tab_id: target,
                            changes,
                            timestamp: unix_millis(),
                        });
                    }
                    Err(e) => {
                        warn!(target_id = %target, error = %e, "Mutation drain failed");
                    }
                }
            }
        });

        sessions.insert(key, handle);
        debug!(target_id = %target, "DOM stream started");
        true
    }

    /// Stops one stream. Idempotent: stopping an absent stream is a
    /// no-op and returns `false`.
    pub fn stop(&self, kind: StreamKind, target: TargetId) -> bool {
        let removed = self.sessions.lock().remove(&(kind, target));
        let Some(handle) = removed else {
            return false;
        };
        handle.abort();
        debug!(target_id = %target, ?kind, "Stream stopped");

        if kind == StreamKind::Dom {
            let primitives = Arc::clone(&self.primitives);
            tokio::spawn(async move {
                if let Err(e) = primitives.remove_observer(target).await {
                    warn!(target_id = %target, error = %e, "Observer removal failed");
                }
            });
        }
        true
    }

    /// Stops every running stream.
    pub fn stop_all(&self) {
        let keys: Vec<_> = self.sessions.lock().keys().copied().collect();
        for (kind, target) in keys {
            self.stop(kind, target);
        }
    }

    /// Returns `true` while a producer runs for this (kind, target).
    #[must_use]
    pub fn is_running(&self, kind: StreamKind, target: TargetId) -> bool {
        self.sessions
            .lock()
            .get(&(kind, target))
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        for (_, handle) in self.sessions.lock().drain() {
            handle.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
