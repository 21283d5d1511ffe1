//! Common numeric and pacing helpers for fatigue_core.

/// Compute the period in microseconds for a given evaluation rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (1_000_000u64 / u64::from(hz.max(1))).max(1)
}

/// Compute the period in milliseconds for a given evaluation rate in Hz.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (1000u64 / u64::from(hz.max(1))).max(1)
}

/// Clamp a score into [0, 1]; non-finite inputs map to 0.
#[inline]
pub fn clamp01(x: f64) -> f64 {
    if !x.is_finite() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Weighted average of `values` (most-recent first) under `weights`
/// (most-recent first). When fewer values than weights exist, the leading
/// weight suffix is applied as-is, deliberately without renormalization:
/// partial windows under-weigh history and lean on the newest evidence.
pub fn weighted_recent(values: impl Iterator<Item = f64>, weights: &[f64]) -> f64 {
    values
        .zip(weights.iter())
        .map(|(v, w)| v * w)
        .sum::<f64>()
}

/// Ordinary least-squares slope of `ys` against sample index 0..n.
/// Returns 0.0 for fewer than two points or degenerate variance.
pub fn ols_slope(ys: &[f64]) -> f64 {
    let n = ys.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / nf;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    if sxx == 0.0 || !sxx.is_finite() {
        return 0.0;
    }
    let slope = sxy / sxx;
    if slope.is_finite() { slope } else { 0.0 }
}
