/// Percentile by linear interpolation between the two nearest order
/// statistics.
///
/// `sorted` must be ascending and `p` in `[0, 100]`. Returns `None` for an
/// empty slice; a single-element slice yields that element for every `p`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }

    // rank in [0, n-1]
    let r = (p / 100.0) * (n - 1) as f64;
    let lo = r.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = r - lo as f64;
    Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
}
