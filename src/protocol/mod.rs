//! Wire protocol message types.
//!
//! This module defines the message format for communication between the
//! controller (Rust) and the remote end (in-page script or debugging
//! endpoint).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Request`] | controller → target | Command request |
//! | [`Response`] | target → controller | Command response |
//! | [`StreamFrame`] | target → controller | Unsolicited stream event |
//! | [`ControlMessage`] | target → controller | Target attach/detach |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `action` | The closed action set with validated parameters |
//! | `message` | Request/Response/StreamFrame wire types |

// ============================================================================
// Submodules
// ============================================================================

/// The closed set of controller actions.
pub mod action;

/// Wire message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::Action;
pub use message::{
    ControlMessage, MutationSummary, Outcome, Request, Response, StreamFrame, WireMessage,
    unix_millis,
};
