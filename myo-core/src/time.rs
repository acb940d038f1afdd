//! Scale-relative tolerant comparisons for event times.
//!
//! Event times are accumulated through repeated floating-point addition of
//! a period, so two times that are mathematically identical can differ by a
//! few units in the last place. Comparing them exactly would miss or
//! duplicate events. These comparisons accept a difference of less than one
//! machine epsilon relative to the larger magnitude.

/// Returns whether `a` and `b` are equal within one machine epsilon
/// relative to the larger magnitude.
///
/// Exact equality is tested first, so `eq(0.0, 0.0)` is `true` and the
/// relative test never divides by zero.
#[must_use]
pub fn eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() / a.abs().max(b.abs()) < f64::EPSILON
}

/// Returns whether `a >= b`, tolerantly: `a >= b` or [`eq(a, b)`](eq).
#[must_use]
pub fn geq(a: f64, b: f64) -> bool {
    a >= b || eq(a, b)
}
