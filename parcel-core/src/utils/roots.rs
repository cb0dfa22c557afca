//! Bracketed root finding

/// Find a root of `f` in `[lo, hi]` by bisection
///
/// Requires `f(lo) <= 0 <= f(hi)`; this is not checked beyond returning the bracket end
/// whose residual already has the right sign. Iteration stops once the bracket width is
/// below `rtol * |hi|`, the midpoint can no longer be separated from the bracket ends
/// in floating point, or `max_iterations` is reached. The result always lies inside the
/// initial bracket.
pub fn bisect<F>(f: F, mut lo: f64, mut hi: f64, rtol: f64, max_iterations: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    if f(lo) >= 0.0 {
        return lo;
    }
    if f(hi) <= 0.0 {
        return hi;
    }

    for _ in 0..max_iterations {
        if hi - lo <= rtol * hi.abs() {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if f(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    0.5 * (lo + hi)
}
