//! tabwire - Remote browser control bridge.
//!
//! This library drives browser tabs over a persistent control channel.
//! A single WebSocket connection carries correlated request/response
//! commands to any number of tabs plus unsolicited stream frames (DOM
//! mutation batches, periodic screenshots) coming back.
//!
//! # Architecture
//!
//! Two transports are supported:
//!
//! - **Bridge mode**: the controller connects to an in-browser remote
//!   end over one WebSocket; tabs attach and detach through control
//!   messages and commands are routed by tab id.
//! - **Direct mode**: the controller attaches straight to the browser's
//!   debugging endpoint and executes the same action set itself.
//!
//! Key design principles:
//!
//! - Every dispatched command resolves exactly once: matching response,
//!   wire error or synthesized timeout
//! - Reconnection runs on a fixed cadence and only `stop()` ends it
//! - At most one stream producer exists per (kind, target) pair
//! - The action set is closed; unknown names are rejected at the
//!   decoding boundary
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabwire::{Action, Bridge, BridgeConfig, Result, WsDialer};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bridge = Bridge::new(BridgeConfig::default());
//!     bridge.start(Arc::new(WsDialer::new()));
//!
//!     // Commands go to the first attached tab unless told otherwise.
//!     let dom = bridge.send(None, Action::GetDom {}).await?;
//!     println!("{} bytes of markup", dom.as_str().map_or(0, str::len));
//!
//!     bridge.stop();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cdp`] | Direct debugging-protocol mode |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`overlay`] | Best-effort popup dismissal |
//! | [`protocol`] | Actions and wire message types |
//! | [`registry`] | Attached-target bookkeeping |
//! | [`simulate`] | Pointer and keystroke synthesis |
//! | [`stream`] | Stream producer lifecycle |
//! | [`transport`] | Connection supervisor and dispatch |

// ============================================================================
// Modules
// ============================================================================

/// Direct debugging-protocol mode.
///
/// Discovery over HTTP, commands over the target's own socket.
pub mod cdp;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for bridge entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Best-effort overlay and popup dismissal.
pub mod overlay;

/// Actions and wire message types.
pub mod protocol;

/// Attached-target bookkeeping.
pub mod registry;

/// Human-plausible pointer and keystroke synthesis.
pub mod simulate;

/// Stream producer lifecycle.
pub mod stream;

/// Persistent transport: connection supervisor, correlation, dispatch.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, TargetId};

// Protocol types
pub use protocol::{Action, ControlMessage, MutationSummary, Outcome, StreamFrame};

// Registry types
pub use registry::{TargetHandle, TargetRegistry};

// Transport types
pub use transport::{Bridge, BridgeConfig, ConnectionState, Dialer, PendingReply, WsDialer};

// Direct-mode types
pub use cdp::{ActionExecutor, CdpClient, CdpConfig};

// Stream types
pub use stream::{CapturePrimitives, StreamKind, StreamManager};
