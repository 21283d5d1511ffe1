//! Biometric feature extractor.
//!
//! Scores a `BioSample` into a bounded fatigue sub-score, a critical flag,
//! and a quality bonus describing how complete the HRV-derived evidence is.
//! With no enhanced fields present the extractor degrades to raw heart-rate
//! deviation against the pilot baseline.

use crate::types::{BioSample, PilotProfile};
use crate::util::clamp01;

// Enhanced-path component weights, redistributed over the fields present.
const W_STRESS: f64 = 0.40;
const W_RMSSD: f64 = 0.25;
const W_TREND: f64 = 0.15;
const W_DEVIATION: f64 = 0.20;

// Confidence quality bonuses per present field.
const B_STRESS: f64 = 0.35;
const B_RMSSD: f64 = 0.30;
const B_TREND: f64 = 0.20;
const B_DEVIATION: f64 = 0.15;

/// RMSSD below this many milliseconds indicates acute autonomic stress.
const RMSSD_CRITICAL_MS: f64 = 20.0;
const STRESS_CRITICAL: f64 = 0.75;
const TREND_CRITICAL_BPM_PER_MIN: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BioScore {
    pub score: f64,
    pub critical: bool,
    /// Completeness bonus in [0, 1], consumed by the fusion confidence.
    pub quality_bonus: f64,
}

/// HRV sub-score: 1.0 below the critical floor, tapering linearly to 0.0 at
/// the pilot's baseline HRV. Degenerate baselines (at or below the floor)
/// reduce to a step function.
fn rmssd_sub(rmssd_ms: f64, baseline_hrv: f64) -> f64 {
    if rmssd_ms < RMSSD_CRITICAL_MS {
        return 1.0;
    }
    if baseline_hrv <= RMSSD_CRITICAL_MS {
        return 0.0;
    }
    if rmssd_ms >= baseline_hrv {
        return 0.0;
    }
    clamp01((baseline_hrv - rmssd_ms) / (baseline_hrv - RMSSD_CRITICAL_MS))
}

fn trend_sub(trend_bpm_per_min: f64) -> f64 {
    if trend_bpm_per_min > TREND_CRITICAL_BPM_PER_MIN {
        1.0
    } else if trend_bpm_per_min > 0.0 {
        clamp01(trend_bpm_per_min / TREND_CRITICAL_BPM_PER_MIN)
    } else {
        0.0
    }
}

fn deviation_sub(baseline_deviation: f64) -> f64 {
    (clamp01(baseline_deviation) * 2.0).min(1.0)
}

fn is_critical(sample: &BioSample) -> bool {
    sample.stress_index.is_some_and(|s| s >= STRESS_CRITICAL)
        || sample.rmssd_ms.is_some_and(|r| r < RMSSD_CRITICAL_MS)
        || sample
            .hr_trend_bpm_per_min
            .is_some_and(|t| t > TREND_CRITICAL_BPM_PER_MIN)
}

/// Score one biometric sample. Baselines prefer the active pilot profile
/// over the values embedded in the sample. Pure; validation is the caller's
/// responsibility.
pub fn hr_score(sample: &BioSample, profile: Option<&PilotProfile>) -> BioScore {
    let baseline_hr = profile.map_or(sample.baseline_hr, |p| p.baseline_hr);
    let baseline_hrv = profile.map_or(sample.baseline_hrv, |p| p.baseline_hrv);

    let mut weighted = 0.0f64;
    let mut weight_total = 0.0f64;
    let mut bonus = 0.0f64;

    if let Some(stress) = sample.stress_index {
        weighted += W_STRESS * clamp01(stress);
        weight_total += W_STRESS;
        bonus += B_STRESS;
    }
    if let Some(rmssd) = sample.rmssd_ms {
        weighted += W_RMSSD * rmssd_sub(rmssd, baseline_hrv);
        weight_total += W_RMSSD;
        bonus += B_RMSSD;
    }
    if let Some(trend) = sample.hr_trend_bpm_per_min {
        weighted += W_TREND * trend_sub(trend);
        weight_total += W_TREND;
        bonus += B_TREND;
    }
    if let Some(dev) = sample.baseline_deviation {
        weighted += W_DEVIATION * deviation_sub(dev);
        weight_total += W_DEVIATION;
        bonus += B_DEVIATION;
    }

    let score = if weight_total > 0.0 {
        clamp01(weighted / weight_total)
    } else if baseline_hr > 0.0 {
        // Raw-HR fallback: relative deviation from baseline, amplified.
        clamp01(((sample.hr - baseline_hr).abs() / baseline_hr) * 1.5)
    } else {
        0.0
    };

    BioScore {
        score,
        critical: is_critical(sample),
        quality_bonus: clamp01(bonus),
    }
}
