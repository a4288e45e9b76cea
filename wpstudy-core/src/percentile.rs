//! Percentiles with linear interpolation between order statistics.
//!
//! For `n` sorted values and percentile `p`, the rank is `p / 100 * (n - 1)`;
//! the result interpolates between the neighbouring order statistics. NaN
//! sorts after every number.

/// Percentile of unsorted values. `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, p)
}

/// Percentile of values already sorted ascending. `p` is clamped to [0, 100].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
