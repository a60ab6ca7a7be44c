//! Direct debugging-protocol mode.
//!
//! An alternative to the extension transport: the controller attaches
//! straight to the browser's debugging endpoint and drives one page
//! target itself.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Discovery, command socket, correlation |
//! | `executor` | The action set over the protocol's domains |

// ============================================================================
// Submodules
// ============================================================================

/// Protocol client and target discovery.
pub mod client;

/// Action execution over the protocol.
pub mod executor;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{CdpChannel, CdpClient, CdpConfig, DEFAULT_CDP_PORT, DiscoveredTarget};
pub use executor::{ActionExecutor, PageCapture};
