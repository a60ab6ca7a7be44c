//! Target registry.
//!
//! Tracks which browser tabs are currently reachable and the transport
//! handle used to reach each one. Uniqueness is by [`TargetId`]; insertion
//! order is irrelevant, and "first available" is defined as the lowest id
//! for determinism.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::identifiers::TargetId;

// ============================================================================
// TargetHandle
// ============================================================================

/// Outbound transport handle for one target.
///
/// Cloning is cheap; all clones feed the same connection. The handle
/// stops accepting messages once the target detaches or the connection
/// drops.
#[derive(Debug, Clone)]
pub struct TargetHandle {
    /// The target this handle reaches.
    pub id: TargetId,
    /// Serialized wire messages destined for the target.
    sender: mpsc::UnboundedSender<String>,
}

impl TargetHandle {
    /// Creates a handle from a target id and an outbound sender.
    #[inline]
    #[must_use]
    pub fn new(id: TargetId, sender: mpsc::UnboundedSender<String>) -> Self {
        Self { id, sender }
    }

    /// Forwards a serialized message to the target.
    ///
    /// Returns `false` when the underlying connection is gone.
    pub fn forward(&self, message: String) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Returns `true` while the underlying connection accepts messages.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.sender.is_closed()
    }
}

// ============================================================================
// TargetRegistry
// ============================================================================

/// Registry of currently reachable targets.
///
/// Shared between the socket task (which attaches/detaches on control
/// messages) and the bridge (which resolves dispatch targets).
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<FxHashMap<TargetId, TargetHandle>>,
}

impl TargetRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a target, replacing any prior handle for the same id.
    pub fn attach(&self, handle: TargetHandle) {
        let id = handle.id;
        let replaced = self.targets.write().insert(id, handle).is_some();
        debug!(target_id = %id, replaced, "Target attached");
    }

    /// Detaches a target; a no-op when the id is unknown.
    pub fn detach(&self, id: TargetId) {
        let removed = self.targets.write().remove(&id).is_some();
        if removed {
            debug!(target_id = %id, "Target detached");
        }
    }

    /// Removes every target, e.g. when the connection drops.
    pub fn clear(&self) {
        let mut targets = self.targets.write();
        if !targets.is_empty() {
            debug!(count = targets.len(), "Registry cleared");
            targets.clear();
        }
    }

    /// Returns the handle for a specific target.
    #[must_use]
    pub fn get(&self, id: TargetId) -> Option<TargetHandle> {
        self.targets.read().get(&id).cloned()
    }

    /// Returns the first available target (lowest id).
    #[must_use]
    pub fn first(&self) -> Option<TargetHandle> {
        let targets = self.targets.read();
        targets
            .keys()
            .min()
            .copied()
            .and_then(|id| targets.get(&id).cloned())
    }

    /// Returns the number of attached targets.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    /// Returns `true` when no target is attached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    /// Returns all attached target ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<TargetId> {
        let mut ids: Vec<_> = self.targets.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

// ============================================================================
// Tests
// ============================================================================
