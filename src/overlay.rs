//! Overlay and popup dismissal.
//!
//! Pages routinely cover themselves with consent banners, newsletter
//! modals and cookie walls before any real interaction can land. This
//! module walks a fixed catalogue of known dismissal selectors, clicking
//! whichever ones resolve to a visible element. Best effort only: a
//! selector that matches nothing, an invisible element or a script
//! failure is skipped, never surfaced as an error.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::TargetId;

// ============================================================================
// Selector Catalogue
// ============================================================================

/// Dismissal selectors, tried in order. Consent-platform specifics
/// first, generic close buttons last.
pub const DISMISS_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    ".qc-cmp2-summary-buttons button[mode='primary']",
    "[class*='cookie'] button[class*='accept']",
    "[class*='consent'] button[class*='accept']",
    "[id*='cookie'] button",
    "[aria-label='Close']",
    "[aria-label='Dismiss']",
    "[aria-label='close']",
    ".modal-close",
    ".popup-close",
    ".overlay-close",
    "button[class*='close']",
];

// ============================================================================
// ScriptHost
// ============================================================================

/// Anything that can run script in a target's page context.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Evaluates `code` in the target's page and returns its value.
    async fn eval(&self, target: TargetId, code: &str) -> Result<Value>;
}

// ============================================================================
// Dismissal
// ============================================================================

/// Attempts to dismiss overlays on the target.
///
/// Returns the number of elements clicked. Selectors that match
/// nothing, match invisible elements or fail to evaluate contribute
/// zero; this function never errors.
pub async fn dismiss_popups<H: ScriptHost + ?Sized>(host: &H, target: TargetId) -> usize {
    let mut dismissed = 0;
    for selector in DISMISS_SELECTORS {
        match try_dismiss(host, target, selector).await {
            Ok(true) => {
                debug!(target_id = %target, selector, "Overlay dismissed");
                dismissed += 1;
            }
            Ok(false) => {}
            Err(e) => {
                trace!(target_id = %target, selector, error = %e, "Dismissal attempt failed");
            }
        }
    }
    dismissed
}

/// Clicks the first visible element matching `selector`, if any.
async fn try_dismiss<H: ScriptHost + ?Sized>(
    host: &H,
    target: TargetId,
    selector: &str,
) -> Result<bool> {
    // Selector goes through JSON so quotes cannot break the script.
    let quoted = serde_json::to_string(selector)?;
    let code = format!(
        "(() => {{\
           const el = document.querySelector({quoted});\
           if (!el) return false;\
           const r = el.getBoundingClientRect();\
           if (r.width === 0 || r.height === 0) return false;\
           el.click();\
           return true;\
         }})()"
    );

    Ok(host.eval(target, &code).await?.as_bool().unwrap_or(false))
}

// ============================================================================
// Tests
// ============================================================================
