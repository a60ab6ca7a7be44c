//! Wire message types.
//!
//! Three message shapes travel over the persistent connection:
//!
//! | Shape | Direction | Discriminator |
//! |-------|-----------|---------------|
//! | [`Request`] | controller → target | has `id` and `action` |
//! | [`Response`] | target → controller | has `id`, exactly one of `result`/`error` |
//! | [`StreamFrame`] / [`ControlMessage`] | target → controller | has `type`, no `id` |
//!
//! [`WireMessage::decode`] classifies an inbound text frame.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, TargetId};

use super::Action;

// ============================================================================
// Time Helper
// ============================================================================

/// Milliseconds since the Unix epoch, for frame timestamps.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// Request
// ============================================================================

/// A command request from controller to target.
///
/// # Format
///
/// ```json
/// { "id": 1, "action": "getDOM", "params": {}, "tabId": 3 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique for the connection lifetime.
    pub id: RequestId,

    /// The validated action with its parameters.
    #[serde(flatten)]
    pub action: Action,

    /// Target tab; routing metadata for multi-tab remote ends.
    #[serde(rename = "tabId", skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TargetId>,
}

impl Request {
    /// Creates a request bound to a specific target.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, action: Action, tab_id: TargetId) -> Self {
        Self {
            id,
            action,
            tab_id: Some(tab_id),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from target to controller.
///
/// Exactly one of `result` / `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Wire error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Creates a success response.
    #[inline]
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response from a wire code.
    #[inline]
    #[must_use]
    pub fn failure(id: RequestId, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Converts the response into an [`Outcome`].
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        match self.error {
            Some(code) => Outcome::Failure(code),
            None => Outcome::Success(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Terminal outcome of a dispatched request.
///
/// Every correlation id resolves to exactly one of these, exactly once:
/// a success payload, a wire error code, or a synthesized timeout.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Success payload (may be `Value::Null`).
    Success(Value),
    /// Wire error code, e.g. `"element not found"` or `"timeout"`.
    Failure(String),
}

impl Outcome {
    /// Converts into a crate result, mapping wire codes back to
    /// structured errors.
    pub fn into_result(self, id: RequestId) -> Result<Value> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(code) => Err(Error::from_wire(&code, id)),
        }
    }

    /// Returns `true` if this outcome is a success.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

// ============================================================================
// StreamFrame
// ============================================================================

/// An unsolicited event frame pushed by a streaming channel.
///
/// Frames carry no correlation id; no response is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamFrame {
    /// A batch summary of DOM mutations.
    #[serde(rename = "dom_stream")]
    DomStream {
        /// Owning target.
        #[serde(rename = "tabId")]
        tab_id: TargetId,
        /// Summarized mutation batch (not full fidelity).
        changes: Vec<MutationSummary>,
        /// Milliseconds since epoch.
        timestamp: u64,
    },

    /// A periodic screenshot preview frame.
    #[serde(rename = "screenshot_stream")]
    ScreenshotStream {
        /// Owning target.
        #[serde(rename = "tabId")]
        tab_id: TargetId,
        /// Capture payload (data URI or metadata).
        data: Value,
        /// Milliseconds since epoch.
        timestamp: u64,
    },

    /// A full screenshot image frame.
    #[serde(rename = "screenshot")]
    Screenshot {
        /// Owning target.
        #[serde(rename = "tabId")]
        tab_id: TargetId,
        /// Base64 data URI of the image.
        data: String,
        /// Milliseconds since epoch.
        timestamp: u64,
    },
}

impl StreamFrame {
    /// Returns the owning target id.
    #[inline]
    #[must_use]
    pub fn target(&self) -> TargetId {
        match self {
            Self::DomStream { tab_id, .. }
            | Self::ScreenshotStream { tab_id, .. }
            | Self::Screenshot { tab_id, .. } => *tab_id,
        }
    }

    /// Decodes a screenshot frame's data URI into raw image bytes.
    ///
    /// Returns `None` for non-screenshot frames or malformed payloads.
    #[must_use]
    pub fn screenshot_bytes(&self) -> Option<Vec<u8>> {
        let Self::Screenshot { data, .. } = self else {
            return None;
        };
        let (_, b64) = data.split_once(";base64,")?;
        STANDARD.decode(b64).ok()
    }
}

// ============================================================================
// MutationSummary
// ============================================================================

/// One summarized entry of a DOM mutation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationSummary {
    /// Mutation kind: `childList`, `attributes` or `characterData`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Short description of the mutated node (tag or selector-ish).
    pub target: String,

    /// Number of nodes added.
    #[serde(default)]
    pub added: usize,

    /// Number of nodes removed.
    #[serde(default)]
    pub removed: usize,
}

// ============================================================================
// ControlMessage
// ============================================================================

/// Connection-level control messages from the remote end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// A tab became reachable.
    #[serde(rename = "targetAttached")]
    TargetAttached {
        /// Newly reachable tab.
        #[serde(rename = "tabId")]
        tab_id: TargetId,
    },

    /// A tab went away.
    #[serde(rename = "targetDetached")]
    TargetDetached {
        /// Detached tab.
        #[serde(rename = "tabId")]
        tab_id: TargetId,
    },
}

// ============================================================================
// WireMessage
// ============================================================================

/// Classified inbound wire message.
#[derive(Debug, Clone)]
pub enum WireMessage {
    /// A correlated command response.
    Response(Response),
    /// An unsolicited stream frame.
    Frame(StreamFrame),
    /// A control message.
    Control(ControlMessage),
}

impl WireMessage {
    /// Decodes and classifies an inbound text frame.
    ///
    /// Messages with an `id` are responses; messages with a `type` are
    /// stream frames or control messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for unparseable or unclassifiable text.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        if value.get("id").is_some() {
            let response: Response = serde_json::from_value(value)?;
            return Ok(Self::Response(response));
        }

        match value.get("type").and_then(Value::as_str) {
            Some("dom_stream" | "screenshot_stream" | "screenshot") => {
                Ok(Self::Frame(serde_json::from_value(value)?))
            }
            Some("targetAttached" | "targetDetached") => {
                Ok(Self::Control(serde_json::from_value(value)?))
            }
            Some(other) => Err(Error::protocol(format!("unknown message type: {other}"))),
            None => Err(Error::protocol("message has neither id nor type")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
