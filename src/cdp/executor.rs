//! Direct-protocol action execution.
//!
//! [`ActionExecutor`] runs the full action set against a single page
//! target over a [`CdpChannel`]: DOM reads and script evaluation go
//! through `Runtime.evaluate`, input through the `Input` domain with
//! synthesized pointer trajectories, navigation and screenshots through
//! the `Page` domain.
//!
//! # Click Fallback Chain
//!
//! | Tier | Mechanism | Used when |
//! |------|-----------|-----------|
//! | 1 | pointer events at element center | selector resolves to visible geometry |
//! | 2 | pointer events at explicit coordinates | geometry unavailable, coordinates given |
//! | 3 | native element activation | element exists but has no usable geometry |
//!
//! A selector that matches nothing, with no coordinate fallback, is
//! [`Error::ElementNotFound`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::TargetId;
use crate::overlay::{self, ScriptHost};
use crate::protocol::{Action, MutationSummary, StreamFrame};
use crate::simulate::{Point, pointer_path};
use crate::stream::{CapturePrimitives, StreamKind, StreamManager};

use super::client::CdpChannel;

// ============================================================================
// Constants
// ============================================================================

/// Samples per synthesized pointer trajectory.
const POINTER_STEPS: usize = 12;

/// Poll cadence for `waitForElement`.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Caps on element summary payloads.
const QS_TEXT_CAP: usize = 500;
const QS_HTML_CAP: usize = 1_000;
const QSA_TEXT_CAP: usize = 200;

// ============================================================================
// Script Evaluation
// ============================================================================

/// Evaluates an expression and unwraps its by-value result.
///
/// A thrown exception becomes [`Error::EvalException`] with the
/// engine's description.
async fn eval_value(channel: &dyn CdpChannel, expression: &str) -> Result<Value> {
    let reply = channel
        .send(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        )
        .await?;

    if let Some(details) = reply.get("exceptionDetails") {
        let message = details
            .pointer("/exception/description")
            .and_then(Value::as_str)
            .or_else(|| details.get("text").and_then(Value::as_str))
            .unwrap_or("unhandled exception");
        return Err(Error::eval_exception(message));
    }

    Ok(reply
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

/// Quotes a string as a JavaScript literal.
fn js_str(s: &str) -> Result<String> {
    Ok(serde_json::to_string(s)?)
}

// ============================================================================
// PageCapture
// ============================================================================

/// Capture primitives over the direct protocol.
///
/// Bound to a single-page channel, so the target id on each call is
/// labeling only.
pub struct PageCapture {
    channel: Arc<dyn CdpChannel>,
}

impl PageCapture {
    /// Wraps a channel.
    #[must_use]
    pub fn new(channel: Arc<dyn CdpChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl CapturePrimitives for PageCapture {
    async fn capture_screenshot(&self, _target: TargetId, quality: f32) -> Result<String> {
        let quality = (f64::from(quality.clamp(0.0, 1.0)) * 100.0).round() as u64;
        let reply = self
            .channel
            .send(
                "Page.captureScreenshot",
                json!({ "format": "jpeg", "quality": quality }),
            )
            .await?;

        let data = reply
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("screenshot reply without data"))?;
        Ok(format!("data:image/jpeg;base64,{data}"))
    }

    async fn install_observer(&self, _target: TargetId) -> Result<()> {
        eval_value(
            self.channel.as_ref(),
            "(() => {\
               if (window.__tabwireObserver) return true;\
               window.__tabwireMutations = [];\
               const observer = new MutationObserver((records) => {\
                 for (const r of records) {\
                   window.__tabwireMutations.push({\
                     type: r.type,\
                     target: r.target.nodeName ? r.target.nodeName.toLowerCase() : '',\
                     added: r.addedNodes.length,\
                     removed: r.removedNodes.length,\
                   });\
                 }\
                 if (window.__tabwireMutations.length > 500)\
                   window.__tabwireMutations.splice(0, window.__tabwireMutations.length - 500);\
               });\
               observer.observe(document.documentElement,\
                 { childList: true, subtree: true, attributes: true, characterData: true });\
               window.__tabwireObserver = observer;\
               return true;\
             })()",
        )
        .await?;
        Ok(())
    }

    async fn drain_mutations(&self, _target: TargetId) -> Result<Vec<MutationSummary>> {
        let batch = eval_value(
            self.channel.as_ref(),
            "(() => {\
               const batch = window.__tabwireMutations || [];\
               window.__tabwireMutations = [];\
               return batch;\
             })()",
        )
        .await?;
        Ok(serde_json::from_value(batch)?)
    }

    async fn remove_observer(&self, _target: TargetId) -> Result<()> {
        eval_value(
            self.channel.as_ref(),
            "(() => {\
               if (window.__tabwireObserver) {\
                 window.__tabwireObserver.disconnect();\
                 delete window.__tabwireObserver;\
                 delete window.__tabwireMutations;\
               }\
               return true;\
             })()",
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// ActionExecutor
// ============================================================================

/// Executes the action set against one page target.
pub struct ActionExecutor {
    channel: Arc<dyn CdpChannel>,
    target: TargetId,
    streams: StreamManager,
    pointer: Mutex<Point>,
}

impl ActionExecutor {
    /// Creates an executor over a channel, emitting stream frames into
    /// the given sink.
    #[must_use]
    pub fn new(
        channel: Arc<dyn CdpChannel>,
        target: TargetId,
        frames: broadcast::Sender<StreamFrame>,
    ) -> Self {
        let capture = Arc::new(PageCapture::new(Arc::clone(&channel)));
        Self {
            channel,
            target,
            streams: StreamManager::new(capture, frames),
            pointer: Mutex::new(Point::new(0.0, 0.0)),
        }
    }

    async fn eval(&self, expression: &str) -> Result<Value> {
        eval_value(self.channel.as_ref(), expression).await
    }

    /// Executes one action and returns its result payload.
    pub async fn execute(&self, action: Action) -> Result<Value> {
        debug!(target_id = %self.target, action = action.name(), "Executing");
        match action {
            Action::GetDom {} => self.eval("document.documentElement.outerHTML").await,

            Action::QuerySelector { selector } => {
                let sel = js_str(&selector)?;
                self.eval(&format!(
                    "(() => {{\
                       const el = document.querySelector({sel});\
                       if (!el) return null;\
                       return {{\
                         tag: el.tagName.toLowerCase(),\
                         text: (el.textContent || '').slice(0, {QS_TEXT_CAP}),\
                         html: el.outerHTML.slice(0, {QS_HTML_CAP}),\
                       }};\
                     }})()"
                ))
                .await
            }

            Action::QuerySelectorAll { selector, limit } => {
                let sel = js_str(&selector)?;
                self.eval(&format!(
                    "Array.from(document.querySelectorAll({sel}))\
                       .slice(0, {limit})\
                       .map(el => ({{\
                         tag: el.tagName.toLowerCase(),\
                         text: (el.textContent || '').slice(0, {QSA_TEXT_CAP}),\
                         href: el.href || null,\
                       }}))"
                ))
                .await
            }

            Action::Click { selector, x, y } => self.click(selector, x, y).await,

            Action::Type { selector, text } => self.type_text(&selector, &text).await,

            Action::Scroll { amount } => {
                self.eval(&format!("window.scrollBy(0, {amount})")).await?;
                Ok(json!({ "scrolled": amount }))
            }

            Action::Eval { code } => self.eval(&code).await,

            Action::Highlight { selector } => {
                let sel = js_str(&selector)?;
                let highlighted = self
                    .eval(&format!(
                        "(() => {{\
                           const el = document.querySelector({sel});\
                           if (!el) return false;\
                           el.style.outline = '3px solid #ff5722';\
                           el.style.boxShadow = '0 0 12px 4px rgba(255, 87, 34, 0.7)';\
                           el.scrollIntoView({{ block: 'center' }});\
                           return true;\
                         }})()"
                    ))
                    .await?;
                Ok(json!({ "highlighted": highlighted.as_bool().unwrap_or(false) }))
            }

            Action::WaitForElement { selector, timeout } => {
                self.wait_for_element(&selector, timeout).await
            }

            Action::GetCookies {} => {
                self.eval(
                    "document.cookie.split('; ').filter(Boolean).reduce((jar, kv) => {\
                       const i = kv.indexOf('=');\
                       jar[kv.slice(0, i)] = kv.slice(i + 1);\
                       return jar;\
                     }, {})",
                )
                .await
            }

            Action::SetCookie { name, value } => {
                let name = js_str(&name)?;
                let value = js_str(&value)?;
                self.eval(&format!("document.cookie = {name} + '=' + {value}"))
                    .await?;
                Ok(json!({ "set": true }))
            }

            Action::GetStorage { key } => match key {
                Some(key) => {
                    let key = js_str(&key)?;
                    self.eval(&format!("localStorage.getItem({key})")).await
                }
                None => {
                    self.eval("Object.fromEntries(Object.entries(localStorage))")
                        .await
                }
            },

            Action::SetStorage { key, value } => {
                let key = js_str(&key)?;
                let value = js_str(&value)?;
                self.eval(&format!("localStorage.setItem({key}, {value})"))
                    .await?;
                Ok(json!({ "set": true }))
            }

            Action::ListFrames {} => {
                self.eval(
                    "Array.from(document.querySelectorAll('iframe'))\
                       .map((frame, index) => ({ index, src: frame.src || '' }))",
                )
                .await
            }

            Action::EvalInFrame { index, code } => self.eval_in_frame(index, &code).await,

            Action::Navigate { url } => {
                self.channel
                    .send("Page.navigate", json!({ "url": url }))
                    .await?;
                Ok(json!({ "navigated": url }))
            }

            Action::StartStreaming {} => {
                self.streams.start_dom(self.target);
                Ok(json!({ "running": true }))
            }

            Action::StopStreaming {} => {
                self.streams.stop(StreamKind::Dom, self.target);
                Ok(json!({ "running": false }))
            }

            Action::StartScreenshots { interval, quality } => {
                self.streams.start_screenshots(self.target, interval, quality);
                Ok(json!({ "running": true }))
            }

            Action::StopScreenshots {} => {
                self.streams.stop(StreamKind::Screenshot, self.target);
                Ok(json!({ "running": false }))
            }
        }
    }

    /// Overrides the page's viewport dimensions.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.channel
            .send(
                "Emulation.setDeviceMetricsOverride",
                json!({
                    "width": width,
                    "height": height,
                    "deviceScaleFactor": 1.0,
                    "mobile": false,
                }),
            )
            .await?;
        Ok(())
    }

    /// Best-effort dismissal of overlays covering the page.
    pub async fn dismiss_popups(&self) -> usize {
        overlay::dismiss_popups(self, self.target).await
    }
}

// ============================================================================
// ActionExecutor - Input
// ============================================================================

impl ActionExecutor {
    /// Three-tier click dispatch; see the module table.
    async fn click(
        &self,
        selector: Option<String>,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<Value> {
        if let Some(sel) = &selector {
            let quoted = js_str(sel)?;
            let probe = self
                .eval(&format!(
                    "(() => {{\
                       const el = document.querySelector({quoted});\
                       if (!el) return 'missing';\
                       const r = el.getBoundingClientRect();\
                       if (r.width === 0 || r.height === 0) return null;\
                       return {{ x: r.x + r.width / 2, y: r.y + r.height / 2 }};\
                     }})()"
                ))
                .await?;

            match probe {
                Value::Object(center) => {
                    let cx = center.get("x").and_then(Value::as_f64).unwrap_or(0.0);
                    let cy = center.get("y").and_then(Value::as_f64).unwrap_or(0.0);
                    self.mouse_click(Point::new(cx, cy)).await?;
                    return Ok(json!({ "clicked": true, "tier": 1 }));
                }
                Value::String(_) if x.is_none() || y.is_none() => {
                    return Err(Error::element_not_found(sel));
                }
                // "missing" with coordinates, or element without usable
                // geometry: fall through the chain.
                _ => {}
            }
        }

        if let (Some(x), Some(y)) = (x, y) {
            self.mouse_click(Point::new(x, y)).await?;
            return Ok(json!({ "clicked": true, "tier": 2 }));
        }

        let Some(sel) = selector else {
            return Err(Error::protocol("click requires a selector or coordinates"));
        };

        let quoted = js_str(&sel)?;
        let clicked = self
            .eval(&format!(
                "(() => {{\
                   const el = document.querySelector({quoted});\
                   if (!el) return false;\
                   el.click();\
                   return true;\
                 }})()"
            ))
            .await?;
        if clicked.as_bool().unwrap_or(false) {
            Ok(json!({ "clicked": true, "tier": 3 }))
        } else {
            Err(Error::element_not_found(sel))
        }
    }

    /// Moves the pointer along a synthesized arc, then presses.
    async fn mouse_click(&self, to: Point) -> Result<()> {
        let from = *self.pointer.lock();
        let path = pointer_path(from, to, POINTER_STEPS, &mut rand::rng());

        for p in &path {
            self.channel
                .send(
                    "Input.dispatchMouseEvent",
                    json!({ "type": "mouseMoved", "x": p.x, "y": p.y }),
                )
                .await?;
        }
        for kind in ["mousePressed", "mouseReleased"] {
            self.channel
                .send(
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": kind,
                        "x": to.x,
                        "y": to.y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }

        *self.pointer.lock() = to;
        Ok(())
    }

    /// Focuses the element, then inserts text through the input domain
    /// so framework-synthesized handlers fire.
    async fn type_text(&self, selector: &str, text: &str) -> Result<Value> {
        let quoted = js_str(selector)?;
        let focused = self
            .eval(&format!(
                "(() => {{\
                   const el = document.querySelector({quoted});\
                   if (!el) return false;\
                   el.focus();\
                   return true;\
                 }})()"
            ))
            .await?;
        if !focused.as_bool().unwrap_or(false) {
            return Err(Error::element_not_found(selector));
        }

        self.channel
            .send("Input.insertText", json!({ "text": text }))
            .await?;

        // Frameworks that ignore native insertion still see a bubbled
        // input event. Best effort; a failure here never fails the type.
        let _ = self
            .eval(&format!(
                "(() => {{\
                   const el = document.querySelector({quoted});\
                   if (el) el.dispatchEvent(new Event('input', {{ bubbles: true }}));\
                   return true;\
                 }})()"
            ))
            .await;

        Ok(json!({ "typed": true }))
    }

    /// Polls for the selector until found or the deadline passes.
    /// Absence is encoded in the payload, never as an error.
    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> Result<Value> {
        let quoted = js_str(selector)?;
        let script = format!(
            "(() => {{\
               const el = document.querySelector({quoted});\
               return el ? el.outerHTML.slice(0, {QS_HTML_CAP}) : null;\
             }})()"
        );

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Value::String(html) = self.eval(&script).await? {
                return Ok(json!({ "found": true, "html": html }));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(json!({ "found": false, "timeout": true }));
            }
            sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Evaluates script inside a same-origin frame by index.
    async fn eval_in_frame(&self, index: usize, code: &str) -> Result<Value> {
        let quoted = js_str(code)?;
        let reply = self
            .eval(&format!(
                "(() => {{\
                   const frame = document.querySelectorAll('iframe')[{index}];\
                   if (!frame) return {{ err: 'missing' }};\
                   try {{\
                     return {{ ok: frame.contentWindow.eval({quoted}) }};\
                   }} catch (e) {{\
                     return {{ err: 'inaccessible' }};\
                   }}\
                 }})()"
            ))
            .await?;

        match reply.get("err").and_then(Value::as_str) {
            Some(_) => Err(Error::frame_not_accessible(index)),
            None => Ok(reply.get("ok").cloned().unwrap_or(Value::Null)),
        }
    }
}

#[async_trait]
impl ScriptHost for ActionExecutor {
    async fn eval(&self, _target: TargetId, code: &str) -> Result<Value> {
        eval_value(self.channel.as_ref(), code).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    struct MockChannel {
        calls: Mutex<Vec<(String, Value)>>,
        replies: Mutex<VecDeque<Value>>,
    }

    impl MockChannel {
        fn new(replies: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            })
        }

        fn methods(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl CdpChannel for MockChannel {
        async fn send(&self, method: &str, params: Value) -> Result<Value> {
            self.calls.lock().push((method.to_string(), params));
            Ok(self.replies.lock().pop_front().unwrap_or(Value::Null))
        }
    }

    /// Wraps a value the way `Runtime.evaluate` replies carry it.
    fn eval_reply(value: Value) -> Value {
        json!({ "result": { "value": value } })
    }

    fn executor(channel: Arc<MockChannel>) -> ActionExecutor {
        let (frames, _) = broadcast::channel(16);
        ActionExecutor::new(channel, TargetId::new(1), frames)
    }

    #[tokio::test]
    async fn test_get_dom() {
        let channel = MockChannel::new(vec![eval_reply(json!("<html></html>"))]);
        let result = executor(Arc::clone(&channel))
            .execute(Action::GetDom {})
            .await
            .expect("result");
        assert_eq!(result, json!("<html></html>"));
        assert_eq!(channel.methods(), vec!["Runtime.evaluate"]);
    }

    #[tokio::test]
    async fn test_click_tier1_uses_geometry() {
        let channel = MockChannel::new(vec![eval_reply(json!({ "x": 100.0, "y": 200.0 }))]);
        let result = executor(Arc::clone(&channel))
            .execute(Action::Click {
                selector: Some("#go".to_string()),
                x: None,
                y: None,
            })
            .await
            .expect("result");

        assert_eq!(result, json!({ "clicked": true, "tier": 1 }));
        let methods = channel.methods();
        assert!(methods.iter().any(|m| m == "Input.dispatchMouseEvent"));

        // Press and release both land at the element center.
        let calls = channel.calls.lock();
        let press = calls
            .iter()
            .find(|(_, p)| p["type"] == "mousePressed")
            .expect("press");
        assert_eq!(press.1["x"], 100.0);
        assert_eq!(press.1["y"], 200.0);
    }

    #[tokio::test]
    async fn test_click_tier2_coordinates() {
        let channel = MockChannel::new(vec![]);
        let result = executor(Arc::clone(&channel))
            .execute(Action::Click {
                selector: None,
                x: Some(50.0),
                y: Some(60.0),
            })
            .await
            .expect("result");

        assert_eq!(result, json!({ "clicked": true, "tier": 2 }));
        // No selector probe happened.
        assert!(channel.methods().iter().all(|m| m == "Input.dispatchMouseEvent"));
    }

    #[tokio::test]
    async fn test_click_tier3_native_activation() {
        // Element exists but has no usable geometry.
        let channel = MockChannel::new(vec![eval_reply(Value::Null), eval_reply(json!(true))]);
        let result = executor(channel)
            .execute(Action::Click {
                selector: Some("#hidden".to_string()),
                x: None,
                y: None,
            })
            .await
            .expect("result");
        assert_eq!(result, json!({ "clicked": true, "tier": 3 }));
    }

    #[tokio::test]
    async fn test_click_missing_element() {
        let channel = MockChannel::new(vec![eval_reply(json!("missing"))]);
        let err = executor(channel)
            .execute(Action::Click {
                selector: Some("#ghost".to_string()),
                x: None,
                y: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_click_missing_element_falls_to_coordinates() {
        let channel = MockChannel::new(vec![eval_reply(json!("missing"))]);
        let result = executor(channel)
            .execute(Action::Click {
                selector: Some("#ghost".to_string()),
                x: Some(5.0),
                y: Some(6.0),
            })
            .await
            .expect("result");
        assert_eq!(result, json!({ "clicked": true, "tier": 2 }));
    }

    #[tokio::test]
    async fn test_click_without_parameters() {
        let channel = MockChannel::new(vec![]);
        let err = executor(channel)
            .execute(Action::Click {
                selector: None,
                x: None,
                y: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_type_inserts_text() {
        let channel = MockChannel::new(vec![eval_reply(json!(true))]);
        let result = executor(Arc::clone(&channel))
            .execute(Action::Type {
                selector: "#q".to_string(),
                text: "hello".to_string(),
            })
            .await
            .expect("result");

        assert_eq!(result, json!({ "typed": true }));
        let calls = channel.calls.lock();
        let insert = calls
            .iter()
            .find(|(m, _)| m == "Input.insertText")
            .expect("insertText");
        assert_eq!(insert.1["text"], "hello");
    }

    #[tokio::test]
    async fn test_query_selector_all_embeds_limit() {
        let channel = MockChannel::new(vec![eval_reply(json!([]))]);
        executor(Arc::clone(&channel))
            .execute(Action::QuerySelectorAll {
                selector: "a".to_string(),
                limit: 2,
            })
            .await
            .expect("result");

        let calls = channel.calls.lock();
        let expr = calls[0].1["expression"].as_str().expect("expression");
        assert!(expr.contains(".slice(0, 2)"));
    }

    #[tokio::test]
    async fn test_type_missing_element() {
        let channel = MockChannel::new(vec![eval_reply(json!(false))]);
        let err = executor(channel)
            .execute(Action::Type {
                selector: "#ghost".to_string(),
                text: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_element_times_out_in_payload() {
        // Every probe returns null; the deadline must surface in the
        // payload, not as an error.
        let channel = MockChannel::new(vec![]);
        let result = executor(channel)
            .execute(Action::WaitForElement {
                selector: "#late".to_string(),
                timeout: 2_000,
            })
            .await
            .expect("result");
        assert_eq!(result, json!({ "found": false, "timeout": true }));
    }

    #[tokio::test]
    async fn test_wait_for_element_found() {
        let channel = MockChannel::new(vec![eval_reply(json!("<div id=\"late\"></div>"))]);
        let result = executor(channel)
            .execute(Action::WaitForElement {
                selector: "#late".to_string(),
                timeout: 2_000,
            })
            .await
            .expect("result");
        assert_eq!(result["found"], true);
    }

    #[tokio::test]
    async fn test_eval_exception_mapping() {
        let channel = MockChannel::new(vec![json!({
            "result": {},
            "exceptionDetails": { "text": "Uncaught ReferenceError" }
        })]);
        let err = executor(channel)
            .execute(Action::Eval {
                code: "nope()".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EvalException { .. }));
    }

    #[tokio::test]
    async fn test_eval_in_frame_inaccessible() {
        let channel = MockChannel::new(vec![eval_reply(json!({ "err": "inaccessible" }))]);
        let err = executor(channel)
            .execute(Action::EvalInFrame {
                index: 2,
                code: "1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FrameNotAccessible { index: 2 }));
    }

    #[tokio::test]
    async fn test_eval_in_frame_value() {
        let channel = MockChannel::new(vec![eval_reply(json!({ "ok": 42 }))]);
        let result = executor(channel)
            .execute(Action::EvalInFrame {
                index: 0,
                code: "6 * 7".to_string(),
            })
            .await
            .expect("result");
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn test_navigate() {
        let channel = MockChannel::new(vec![json!({ "frameId": "F1" })]);
        let result = executor(Arc::clone(&channel))
            .execute(Action::Navigate {
                url: "https://example.com".to_string(),
            })
            .await
            .expect("result");

        assert_eq!(result, json!({ "navigated": "https://example.com" }));
        assert_eq!(channel.methods(), vec!["Page.navigate"]);
    }

    #[tokio::test]
    async fn test_storage_round_trip_shapes() {
        let channel = MockChannel::new(vec![
            eval_reply(Value::Null),
            eval_reply(json!({ "k": "v" })),
        ]);
        let exec = executor(channel);

        let set = exec
            .execute(Action::SetStorage {
                key: "k".to_string(),
                value: "v".to_string(),
            })
            .await
            .expect("set");
        assert_eq!(set, json!({ "set": true }));

        let all = exec
            .execute(Action::GetStorage { key: None })
            .await
            .expect("get");
        assert_eq!(all, json!({ "k": "v" }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_stream_emits_frames() {
        let channel = MockChannel::new(vec![json!({ "data": "YWJj" })]);
        let (frames, mut rx) = broadcast::channel(16);
        let exec = ActionExecutor::new(channel, TargetId::new(1), frames);

        let result = exec
            .execute(Action::StartScreenshots {
                interval: 1_000,
                quality: 0.2,
            })
            .await
            .expect("start");
        assert_eq!(result, json!({ "running": true }));

        let frame = rx.recv().await.expect("frame");
        match frame {
            StreamFrame::Screenshot { data, .. } => {
                assert_eq!(data, "data:image/jpeg;base64,YWJj");
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        let stopped = exec
            .execute(Action::StopScreenshots {})
            .await
            .expect("stop");
        assert_eq!(stopped, json!({ "running": false }));
    }

    #[tokio::test]
    async fn test_set_viewport() {
        let channel = MockChannel::new(vec![]);
        executor(Arc::clone(&channel))
            .set_viewport(1280, 800)
            .await
            .expect("viewport");

        let calls = channel.calls.lock();
        assert_eq!(calls[0].0, "Emulation.setDeviceMetricsOverride");
        assert_eq!(calls[0].1["width"], 1280);
        assert_eq!(calls[0].1["mobile"], false);
    }
}
