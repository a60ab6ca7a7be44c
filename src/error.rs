//! Error types for the tabwire bridge.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Dispatch | [`Error::NoActiveTarget`], [`Error::UnknownAction`] |
//! | Execution | [`Error::ElementNotFound`], [`Error::EvalException`], [`Error::FrameNotAccessible`] |
//! | Timing | [`Error::RequestTimeout`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |
//!
//! Action-level failures travel back over the wire as short error codes
//! (see [`Error::wire_code`] / [`Error::from_wire`]); the executor never
//! lets them escape as panics.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// No target registered when dispatching a command.
    ///
    /// Returned synchronously, before a correlation id is assigned.
    #[error("No active target")]
    NoActiveTarget,

    /// Action name outside the recognized set.
    #[error("Unknown action: {action}")]
    UnknownAction {
        /// The unrecognized action name.
        action: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Selector resolved to nothing after all fallback tiers.
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// CSS selector that matched no element.
        selector: String,
    },

    /// Caller-supplied script threw.
    #[error("Eval exception: {message}")]
    EvalException {
        /// Error message from the thrown value.
        message: String,
    },

    /// Iframe is cross-origin or missing.
    #[error("Frame not accessible: index={index}")]
    FrameNotAccessible {
        /// Zero-based frame index that was requested.
        index: usize,
    },

    // ========================================================================
    // Timing Errors
    // ========================================================================
    /// No response within the per-request deadline.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection could not be established or broke mid-operation.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while an operation was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol violation or unexpected message shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error during endpoint discovery.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an unknown action error.
    #[inline]
    pub fn unknown_action(action: impl Into<String>) -> Self {
        Self::UnknownAction {
            action: action.into(),
        }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates an eval exception error.
    #[inline]
    pub fn eval_exception(message: impl Into<String>) -> Self {
        Self::EvalException {
            message: message.into(),
        }
    }

    /// Creates a frame not accessible error.
    #[inline]
    pub fn frame_not_accessible(index: usize) -> Self {
        Self::FrameNotAccessible { index }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Wire Codes
// ============================================================================

/// Short error codes carried in the `error` field of a wire response.
pub mod wire {
    /// Dispatch found no registered target.
    pub const NO_ACTIVE_TARGET: &str = "no active target";
    /// Action name outside the recognized set.
    pub const UNKNOWN_ACTION: &str = "unknown action";
    /// Selector resolved to nothing.
    pub const ELEMENT_NOT_FOUND: &str = "element not found";
    /// Caller-supplied script threw.
    pub const EVAL_EXCEPTION: &str = "eval exception";
    /// Iframe cross-origin or missing.
    pub const FRAME_NOT_ACCESSIBLE: &str = "frame not accessible";
    /// No response within the per-request deadline.
    pub const TIMEOUT: &str = "timeout";
}

impl Error {
    /// Returns the wire-level error code for this error.
    ///
    /// Action-level errors map to their stable short codes; everything
    /// else falls back to the display string.
    #[must_use]
    pub fn wire_code(&self) -> String {
        match self {
            Self::NoActiveTarget => wire::NO_ACTIVE_TARGET.to_string(),
            Self::UnknownAction { .. } => wire::UNKNOWN_ACTION.to_string(),
            Self::ElementNotFound { .. } => wire::ELEMENT_NOT_FOUND.to_string(),
            Self::EvalException { .. } => wire::EVAL_EXCEPTION.to_string(),
            Self::FrameNotAccessible { .. } => wire::FRAME_NOT_ACCESSIBLE.to_string(),
            Self::RequestTimeout { .. } => wire::TIMEOUT.to_string(),
            other => other.to_string(),
        }
    }

    /// Reconstructs a structured error from a wire code.
    ///
    /// Unrecognized codes become [`Error::Protocol`] carrying the raw text.
    #[must_use]
    pub fn from_wire(code: &str, request_id: RequestId) -> Self {
        match code {
            wire::NO_ACTIVE_TARGET => Self::NoActiveTarget,
            wire::UNKNOWN_ACTION => Self::unknown_action("<remote>"),
            wire::ELEMENT_NOT_FOUND => Self::element_not_found("<remote>"),
            wire::EVAL_EXCEPTION => Self::eval_exception("<remote>"),
            wire::FRAME_NOT_ACCESSIBLE => Self::FrameNotAccessible { index: 0 },
            wire::TIMEOUT => Self::request_timeout(request_id, 0),
            other => Self::protocol(other.to_string()),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came from action execution rather
    /// than the transport.
    #[inline]
    #[must_use]
    pub fn is_action_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownAction { .. }
                | Self::ElementNotFound { .. }
                | Self::EvalException { .. }
                | Self::FrameNotAccessible { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::element_not_found("#login");
        assert_eq!(err.to_string(), "Element not found: #login");
    }

    #[test]
    fn test_no_active_target_display() {
        assert_eq!(Error::NoActiveTarget.to_string(), "No active target");
    }

    #[test]
    fn test_wire_codes_round_trip() {
        let id = RequestId::from_u64(5);
        let cases = [
            Error::NoActiveTarget,
            Error::unknown_action("frobnicate"),
            Error::element_not_found("a"),
            Error::eval_exception("boom"),
            Error::frame_not_accessible(2),
            Error::request_timeout(id, 30_000),
        ];

        for err in cases {
            let code = err.wire_code();
            let back = Error::from_wire(&code, id);
            assert_eq!(back.wire_code(), code);
        }
    }

    #[test]
    fn test_timeout_wire_code() {
        let err = Error::request_timeout(RequestId::from_u64(1), 30_000);
        assert_eq!(err.wire_code(), "timeout");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_is_action_error() {
        assert!(Error::unknown_action("x").is_action_error());
        assert!(Error::eval_exception("x").is_action_error());
        assert!(!Error::NoActiveTarget.is_action_error());
        assert!(!Error::ConnectionClosed.is_action_error());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("refused").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::NoActiveTarget.is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_unknown_wire_code_is_protocol() {
        let err = Error::from_wire("something odd", RequestId::from_u64(1));
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
