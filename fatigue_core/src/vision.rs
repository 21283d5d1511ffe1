//! Vision feature extractor.
//!
//! Pure scoring of a single `VisionSample` into a bounded fatigue sub-score
//! plus a critical flag. The piecewise curves are calibrated against the
//! EAR/MAR operating points of the landmark pipeline: EAR below 0.15 means
//! the eyes are effectively shut, 0.25 is the drowsiness knee, 0.30 is
//! fully alert.

use crate::types::VisionSample;
use crate::util::clamp01;
use serde::{Deserialize, Serialize};

// Fixed sub-score weights.
const W_EAR: f64 = 0.40;
const W_CLOSURE: f64 = 0.25;
const W_MICROSLEEP: f64 = 0.15;
const W_YAWN: f64 = 0.15;
const W_BLINK: f64 = 0.05;

/// Per-sub-score breakdown, carried on `data:fusion` for traceability.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisionDiagnostics {
    pub ear_sub: f64,
    pub closure_sub: f64,
    pub microsleep_sub: f64,
    pub yawn_sub: f64,
    pub blink_sub: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionScore {
    pub score: f64,
    pub critical: bool,
    pub diagnostics: VisionDiagnostics,
}

fn ear_sub(avg_ear: f64) -> f64 {
    let s = if avg_ear < 0.15 {
        1.0
    } else if avg_ear < 0.20 {
        0.8 + ((0.20 - avg_ear) / 0.05) * 0.2
    } else if avg_ear < 0.25 {
        ((0.25 - avg_ear) / 0.05) * 0.8
    } else {
        (0.30 - avg_ear) / 0.20
    };
    clamp01(s)
}

fn closure_sub(closure_s: f64) -> f64 {
    if closure_s < 0.5 {
        0.0
    } else if closure_s < 1.0 {
        0.5
    } else if closure_s < 3.0 {
        clamp01(0.5 + (closure_s - 1.0) * 0.25)
    } else {
        1.0
    }
}

fn microsleep_sub(count: u32) -> f64 {
    (f64::from(count) * 0.3).min(1.0)
}

/// Yawn evidence: 50% episode frequency, 30% current duration, 20% MAR.
fn yawn_sub(sample: &VisionSample) -> f64 {
    let count = sample.yawn_count;
    let freq = match count {
        0 => 0.0,
        1..=2 => f64::from(count) * 0.3,
        3..=4 => 0.6 + f64::from(count - 3) * 0.2,
        _ => 1.0,
    };

    let dur = sample.yawn_duration_s;
    let duration = if !sample.yawning {
        0.0
    } else if dur < 1.0 {
        0.2
    } else if dur < 2.0 {
        dur * 0.5
    } else if dur < 4.0 {
        0.5 + (dur - 2.0) * 0.25
    } else {
        1.0
    };

    let mar = sample.mar;
    let mouth = if mar < 0.35 {
        0.0
    } else if mar < 0.5 {
        (mar - 0.35) * 3.33
    } else if mar < 0.6 {
        (mar - 0.5) * 10.0
    } else {
        1.0
    };

    clamp01(0.5 * clamp01(freq) + 0.3 * clamp01(duration) + 0.2 * clamp01(mouth))
}

fn blink_sub(rate_per_min: f64) -> f64 {
    let s = if rate_per_min < 5.0 {
        1.0
    } else if rate_per_min < 10.0 {
        (10.0 - rate_per_min) / 5.0
    } else if rate_per_min > 40.0 {
        (rate_per_min - 40.0) / 20.0
    } else {
        0.0
    };
    clamp01(s)
}

/// Conditions that bypass smoothing and stage rate limits.
fn is_critical(sample: &VisionSample) -> bool {
    sample.closure_duration_s >= 1.0
        || sample.avg_ear < 0.15
        || sample.microsleep_count >= 2
        || (sample.yawn_count >= 3 && sample.yawn_duration_s > 2.0)
}

/// Score one vision sample. Pure; the caller is responsible for validation
/// and freshness.
pub fn vision_score(sample: &VisionSample) -> VisionScore {
    let diagnostics = VisionDiagnostics {
        ear_sub: ear_sub(sample.avg_ear),
        closure_sub: closure_sub(sample.closure_duration_s),
        microsleep_sub: microsleep_sub(sample.microsleep_count),
        yawn_sub: yawn_sub(sample),
        blink_sub: blink_sub(sample.blink_rate_per_minute),
    };
    let score = clamp01(
        W_EAR * diagnostics.ear_sub
            + W_CLOSURE * diagnostics.closure_sub
            + W_MICROSLEEP * diagnostics.microsleep_sub
            + W_YAWN * diagnostics.yawn_sub
            + W_BLINK * diagnostics.blink_sub,
    );
    VisionScore {
        score,
        critical: is_critical(sample),
        diagnostics,
    }
}
