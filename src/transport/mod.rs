//! Persistent transport to the remote end.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | Connection supervisor, correlation table, dispatch |
//! | `dial` | Dialer abstraction and the WebSocket implementation |

// ============================================================================
// Submodules
// ============================================================================

/// The control-plane bridge.
pub mod bridge;

/// Connection dialing.
pub mod dial;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{Bridge, BridgeConfig, ConnectionState, DEFAULT_BRIDGE_PORT, PendingReply};
pub use dial::{Conduit, Dialer, WsDialer};
