//! The closed set of controller actions.
//!
//! Every command the bridge can carry is a variant of [`Action`], each
//! with its own validated parameter structure. Wire decoding goes through
//! [`Action::from_wire`], which is the single point where an arbitrary
//! action string can be rejected as [`Error::UnknownAction`] — after that,
//! matches are exhaustive and a new action is a compile-time-visible
//! addition.
//!
//! # Wire Format
//!
//! ```json
//! { "action": "querySelectorAll", "params": { "selector": "a", "limit": 2 } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default result cap for `querySelectorAll`.
fn default_limit() -> usize {
    100
}

/// Default relative scroll distance in pixels.
fn default_scroll_amount() -> i64 {
    500
}

/// Default `waitForElement` deadline in milliseconds.
fn default_wait_timeout_ms() -> u64 {
    10_000
}

/// Default screenshot interval in milliseconds.
fn default_screenshot_interval_ms() -> u64 {
    3_000
}

/// Default screenshot JPEG quality (0.0 - 1.0).
fn default_screenshot_quality() -> f32 {
    0.2
}

// ============================================================================
// Action
// ============================================================================

/// A validated command for a target's page context.
///
/// | Action | Result shape |
/// |--------|--------------|
/// | `getDOM` | full document markup string |
/// | `querySelector` | `{tag, text, html}` or null |
/// | `querySelectorAll` | array of `{tag, text, href}` |
/// | `click` | `{clicked: true, tier}` |
/// | `type` | `{typed: true}` |
/// | `scroll` | `{scrolled: amount}` |
/// | `eval` | script return value |
/// | `highlight` | `{highlighted: bool}` |
/// | `waitForElement` | `{found, html?}` or `{found: false, timeout: true}` |
/// | `getCookies` / `setCookie` | cookie jar contents / `{set: true}` |
/// | `getStorage` / `setStorage` | storage contents / `{set: true}` |
/// | `listFrames` | array of `{index, src}` |
/// | `evalInFrame` | script return value |
/// | `navigate` | `{navigated: url}` |
/// | stream start/stop | `{running: bool}` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params")]
pub enum Action {
    /// Returns the full document markup.
    #[serde(rename = "getDOM")]
    GetDom {},

    /// Returns a summary of the first element matching `selector`,
    /// or null when nothing matches (null is a valid success).
    #[serde(rename = "querySelector")]
    QuerySelector {
        /// CSS selector.
        selector: String,
    },

    /// Returns up to `limit` element summaries.
    #[serde(rename = "querySelectorAll")]
    QuerySelectorAll {
        /// CSS selector.
        selector: String,
        /// Maximum number of summaries returned.
        #[serde(default = "default_limit")]
        limit: usize,
    },

    /// Clicks an element through the three-tier fallback chain:
    /// selector geometry, explicit coordinates, native activation.
    #[serde(rename = "click")]
    Click {
        /// CSS selector (tier 1 and 3).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        /// Explicit X coordinate (tier 2).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        /// Explicit Y coordinate (tier 2).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
    },

    /// Types text into an element via the low-level input-insertion
    /// primitive so framework-synthesized input handlers fire.
    #[serde(rename = "type")]
    Type {
        /// CSS selector of the input element.
        selector: String,
        /// Text to insert.
        text: String,
    },

    /// Scrolls the page vertically by a relative amount.
    #[serde(rename = "scroll")]
    Scroll {
        /// Pixels to scroll by (negative scrolls up).
        #[serde(default = "default_scroll_amount")]
        amount: i64,
    },

    /// Executes caller-supplied script in the page context.
    ///
    /// Privileged: the script runs with full page authority.
    #[serde(rename = "eval")]
    Eval {
        /// JavaScript source.
        code: String,
    },

    /// Applies a visible outline/glow to an element for operator
    /// debugging.
    #[serde(rename = "highlight")]
    Highlight {
        /// CSS selector.
        selector: String,
    },

    /// Waits for a selector to appear, up to `timeout` milliseconds.
    /// Never errors; failure is encoded in the payload.
    #[serde(rename = "waitForElement")]
    WaitForElement {
        /// CSS selector to wait for.
        selector: String,
        /// Deadline in milliseconds.
        #[serde(default = "default_wait_timeout_ms")]
        timeout: u64,
    },

    /// Reads the target's cookie jar.
    #[serde(rename = "getCookies")]
    GetCookies {},

    /// Writes one cookie.
    #[serde(rename = "setCookie")]
    SetCookie {
        /// Cookie name.
        name: String,
        /// Cookie value.
        value: String,
    },

    /// Reads localStorage, either one key or the whole store.
    #[serde(rename = "getStorage")]
    GetStorage {
        /// Specific key; absent reads everything.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },

    /// Writes one localStorage entry.
    #[serde(rename = "setStorage")]
    SetStorage {
        /// Storage key.
        key: String,
        /// Storage value.
        value: String,
    },

    /// Enumerates embedded frames.
    #[serde(rename = "listFrames")]
    ListFrames {},

    /// Evaluates script inside a frame by index.
    #[serde(rename = "evalInFrame")]
    EvalInFrame {
        /// Zero-based frame index.
        index: usize,
        /// JavaScript source.
        code: String,
    },

    /// Navigates the target to a URL.
    #[serde(rename = "navigate")]
    Navigate {
        /// Destination URL.
        url: String,
    },

    /// Starts the DOM mutation stream for the target.
    #[serde(rename = "startStreaming")]
    StartStreaming {},

    /// Stops the DOM mutation stream.
    #[serde(rename = "stopStreaming")]
    StopStreaming {},

    /// Starts the periodic screenshot stream.
    #[serde(rename = "startScreenshots")]
    StartScreenshots {
        /// Capture interval in milliseconds.
        #[serde(default = "default_screenshot_interval_ms")]
        interval: u64,
        /// JPEG quality, 0.0 - 1.0.
        #[serde(default = "default_screenshot_quality")]
        quality: f32,
    },

    /// Stops the screenshot stream.
    #[serde(rename = "stopScreenshots")]
    StopScreenshots {},
}

// ============================================================================
// Action - Wire Decoding
// ============================================================================

/// All recognized wire action names.
const ACTION_NAMES: &[&str] = &[
    "getDOM",
    "querySelector",
    "querySelectorAll",
    "click",
    "type",
    "scroll",
    "eval",
    "highlight",
    "waitForElement",
    "getCookies",
    "setCookie",
    "getStorage",
    "setStorage",
    "listFrames",
    "evalInFrame",
    "navigate",
    "startStreaming",
    "stopStreaming",
    "startScreenshots",
    "stopScreenshots",
];

impl Action {
    /// Decodes a wire action from its name and parameter bag.
    ///
    /// A missing parameter bag is treated as empty so that senders may
    /// omit `params` for parameterless actions.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownAction`] if `name` is outside the recognized set
    /// - [`Error::Protocol`] if the parameters do not validate
    pub fn from_wire(name: &str, params: Option<Value>) -> Result<Self> {
        if !ACTION_NAMES.contains(&name) {
            return Err(Error::unknown_action(name));
        }

        let mut envelope = Map::new();
        envelope.insert("action".to_string(), Value::String(name.to_string()));
        envelope.insert(
            "params".to_string(),
            params.unwrap_or_else(|| Value::Object(Map::new())),
        );

        serde_json::from_value(Value::Object(envelope))
            .map_err(|e| Error::protocol(format!("invalid params for {name}: {e}")))
    }

    /// Returns the wire name for this action.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetDom {} => "getDOM",
            Self::QuerySelector { .. } => "querySelector",
            Self::QuerySelectorAll { .. } => "querySelectorAll",
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::Scroll { .. } => "scroll",
            Self::Eval { .. } => "eval",
            Self::Highlight { .. } => "highlight",
            Self::WaitForElement { .. } => "waitForElement",
            Self::GetCookies {} => "getCookies",
            Self::SetCookie { .. } => "setCookie",
            Self::GetStorage { .. } => "getStorage",
            Self::SetStorage { .. } => "setStorage",
            Self::ListFrames {} => "listFrames",
            Self::EvalInFrame { .. } => "evalInFrame",
            Self::Navigate { .. } => "navigate",
            Self::StartStreaming {} => "startStreaming",
            Self::StopStreaming {} => "stopStreaming",
            Self::StartScreenshots { .. } => "startScreenshots",
            Self::StopScreenshots {} => "stopScreenshots",
        }
    }

    /// Returns `true` for actions that run caller-supplied script.
    ///
    /// These are privileged: the script executes with full page authority
    /// and is isolated only by the host environment.
    #[inline]
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Eval { .. } | Self::EvalInFrame { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_tagged() {
        let action = Action::QuerySelectorAll {
            selector: "a".to_string(),
            limit: 2,
        };
        let json = serde_json::to_value(&action).expect("serialize");
        assert_eq!(json["action"], "querySelectorAll");
        assert_eq!(json["params"]["selector"], "a");
        assert_eq!(json["params"]["limit"], 2);
    }

    #[test]
    fn test_from_wire_defaults() {
        let action =
            Action::from_wire("querySelectorAll", Some(json!({ "selector": "a" }))).expect("decode");
        assert_eq!(
            action,
            Action::QuerySelectorAll {
                selector: "a".to_string(),
                limit: 100,
            }
        );
    }

    #[test]
    fn test_from_wire_missing_params() {
        let action = Action::from_wire("getDOM", None).expect("decode");
        assert_eq!(action, Action::GetDom {});
    }

    #[test]
    fn test_from_wire_unknown_action() {
        let err = Action::from_wire("frobnicate", None).unwrap_err();
        assert!(matches!(err, Error::UnknownAction { action } if action == "frobnicate"));
    }

    #[test]
    fn test_from_wire_invalid_params() {
        // "type" requires selector and text.
        let err = Action::from_wire("type", Some(json!({ "selector": "#q" }))).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_click_optional_fields() {
        let action =
            Action::from_wire("click", Some(json!({ "x": 10.0, "y": 20.0 }))).expect("decode");
        assert_eq!(
            action,
            Action::Click {
                selector: None,
                x: Some(10.0),
                y: Some(20.0),
            }
        );

        // Coordinates are omitted from the wire form when absent.
        let wire = serde_json::to_value(Action::Click {
            selector: Some("#go".to_string()),
            x: None,
            y: None,
        })
        .expect("serialize");
        assert!(wire["params"].get("x").is_none());
    }

    #[test]
    fn test_scroll_default_amount() {
        let action = Action::from_wire("scroll", Some(json!({}))).expect("decode");
        assert_eq!(action, Action::Scroll { amount: 500 });
    }

    #[test]
    fn test_screenshot_defaults() {
        let action = Action::from_wire("startScreenshots", None).expect("decode");
        match action {
            Action::StartScreenshots { interval, quality } => {
                assert_eq!(interval, 3_000);
                assert!((quality - 0.2).abs() < f32::EPSILON);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_every_name_round_trips() {
        for name in ACTION_NAMES {
            // Parameterless decode may fail for actions with required
            // params; those are exercised above. Here we only check that
            // name() agrees with the wire tag for decodable ones.
            if let Ok(action) = Action::from_wire(name, None) {
                assert_eq!(action.name(), *name);
            }
        }
    }

    #[test]
    fn test_privileged_actions() {
        assert!(
            Action::Eval {
                code: "1".to_string()
            }
            .is_privileged()
        );
        assert!(!Action::GetDom {}.is_privileged());
    }
}
