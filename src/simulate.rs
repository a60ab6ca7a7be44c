//! Human-plausible input synthesis.
//!
//! Pure geometry and timing generators for the direct-protocol executor:
//! curved pointer trajectories and irregular keystroke cadences. Nothing
//! here performs IO; callers feed the generated samples to the input
//! primitives at their own pace.
//!
//! The pointer path is a cubic Bezier whose control points sit at 30%/10%
//! and 70%/90% of the displacement, pulled sideways by a bounded random
//! offset. That asymmetry produces the slight overshoot-and-correct arc
//! of a real hand instead of a straight interpolation.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

// ============================================================================
// Constants
// ============================================================================

/// Control point placement along the displacement, as (x, y) fractions.
const CONTROL_1: (f64, f64) = (0.3, 0.1);
const CONTROL_2: (f64, f64) = (0.7, 0.9);

/// Maximum sideways pull applied to each control point, in pixels.
const CONTROL_JITTER: f64 = 40.0;

// ============================================================================
// Point
// ============================================================================

/// A point in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal page coordinate.
    pub x: f64,
    /// Vertical page coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ============================================================================
// Pointer Path
// ============================================================================

/// Generates a curved pointer trajectory from `from` to `to`.
///
/// Returns exactly `steps` samples (minimum 2). The first sample is
/// exactly `from` and the last exactly `to`; intermediate samples follow
/// a jittered cubic Bezier.
#[must_use]
pub fn pointer_path<R: Rng + ?Sized>(from: Point, to: Point, steps: usize, rng: &mut R) -> Vec<Point> {
    let steps = steps.max(2);
    let dx = to.x - from.x;
    let dy = to.y - from.y;

    let c1 = Point::new(
        from.x + dx * CONTROL_1.0 + rng.random_range(-CONTROL_JITTER..=CONTROL_JITTER),
        from.y + dy * CONTROL_1.1 + rng.random_range(-CONTROL_JITTER..=CONTROL_JITTER),
    );
    let c2 = Point::new(
        from.x + dx * CONTROL_2.0 + rng.random_range(-CONTROL_JITTER..=CONTROL_JITTER),
        from.y + dy * CONTROL_2.1 + rng.random_range(-CONTROL_JITTER..=CONTROL_JITTER),
    );

    let mut path = Vec::with_capacity(steps);
    for i in 0..steps {
        let t = i as f64 / (steps - 1) as f64;
        path.push(bezier(from, c1, c2, to, t));
    }

    // Endpoints must land exactly regardless of rounding.
    path[0] = from;
    let last = steps - 1;
    path[last] = to;
    path
}

/// Evaluates a cubic Bezier at `t` in [0, 1].
fn bezier(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let u = 1.0 - t;
    let b0 = u * u * u;
    let b1 = 3.0 * u * u * t;
    let b2 = 3.0 * u * t * t;
    let b3 = t * t * t;

    Point::new(
        b0 * p0.x + b1 * p1.x + b2 * p2.x + b3 * p3.x,
        b0 * p0.y + b1 * p1.y + b2 * p2.y + b3 * p3.y,
    )
}

// ============================================================================
// Keystroke Cadence
// ============================================================================

/// Generates one inter-keystroke delay per character of `text`.
///
/// Each delay is `base` plus a uniform draw up to `jitter`; whitespace
/// gets a doubled base to mimic the pause between words.
#[must_use]
pub fn keystroke_delays<R: Rng + ?Sized>(
    text: &str,
    base: Duration,
    jitter: Duration,
    rng: &mut R,
) -> Vec<Duration> {
    text.chars()
        .map(|c| {
            let base = if c.is_whitespace() { base * 2 } else { base };
            let extra = if jitter.is_zero() {
                Duration::ZERO
            } else {
                Duration::from_micros(rng.random_range(0..=jitter.as_micros() as u64))
            };
            base + extra
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
