//! Confidence-weighted multimodal fusion with dual-path temporal smoothing.
//!
//! Vision carries 0.70 of the fused score and biometrics 0.30; when a
//! modality is absent its weight is redistributed over what remains. A
//! critical event flushes the smoothing window and publishes the raw score
//! unchanged; the normal path runs a recency-weighted EMA plus a trend
//! boost when the smoothed score is climbing fast.

use crate::biometric::BioScore;
use crate::config::FusionCfg;
use crate::error::FatigueError;
use crate::ring::RingBuf;
use crate::types::{BioSample, FusionOutput, VisionSample};
use crate::util::{clamp01, ols_slope, weighted_recent};
use crate::vision::VisionScore;

const W_VISION: f64 = 0.70;
const W_BIO: f64 = 0.30;

/// Number of trailing smoothed scores the slope detector looks at.
const TREND_SLOPE_SAMPLES: usize = 5;

pub struct FusionCore {
    cfg: FusionCfg,
    /// Raw fused scores feeding the EMA (capacity = window_size).
    scores: RingBuf,
    /// Smoothed scores feeding the slope detector (capacity = trend_window_size).
    trend: RingBuf,
    slope_scratch: [f64; TREND_SLOPE_SAMPLES],
}

impl std::fmt::Debug for FusionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionCore")
            .field("window", &self.scores.len())
            .field("trend", &self.trend.len())
            .finish()
    }
}

impl FusionCore {
    pub fn new(cfg: FusionCfg) -> Self {
        let scores = RingBuf::new(cfg.window_size);
        let trend = RingBuf::new(cfg.trend_window_size);
        Self {
            cfg,
            scores,
            trend,
            slope_scratch: [0.0; TREND_SLOPE_SAMPLES],
        }
    }

    /// Reset all smoothing state. Call before a new monitoring session.
    pub fn begin(&mut self) {
        self.scores.clear();
        self.trend.clear();
    }

    /// Number of raw scores currently in the smoothing window.
    pub fn window_len(&self) -> usize {
        self.scores.len()
    }

    /// Number of smoothed scores currently in the trend window.
    pub fn trend_len(&self) -> usize {
        self.trend.len()
    }

    /// Fuse one tick's worth of modality scores.
    ///
    /// Returns `InsufficientModalities` when both modalities are absent; the
    /// engine treats that as a no-op tick rather than a fault.
    pub fn fuse(
        &mut self,
        now_s: f64,
        vision: Option<(&VisionSample, &VisionScore)>,
        bio: Option<(&BioSample, &BioScore)>,
    ) -> Result<FusionOutput, FatigueError> {
        let mut weight_total = 0.0f64;
        let mut weighted = 0.0f64;
        let mut modalities = 0u32;

        if let Some((_, vs)) = vision {
            weighted += W_VISION * vs.score;
            weight_total += W_VISION;
            modalities += 1;
        }
        if let Some((_, bs)) = bio {
            weighted += W_BIO * bs.score;
            weight_total += W_BIO;
            modalities += 1;
        }
        if modalities == 0 {
            return Err(FatigueError::InsufficientModalities);
        }

        // Redistribution keeps the effective weights summing to 1.0.
        let raw = clamp01(weighted / weight_total);

        let base = f64::from(modalities) / 2.0;
        let bonus = bio.map_or(0.0, |(_, bs)| bs.quality_bonus);
        let confidence = clamp01(base + (1.0 - base) * clamp01(bonus));

        let critical = vision.is_some_and(|(_, vs)| vs.critical)
            || bio.is_some_and(|(_, bs)| bs.critical);

        let fusion_score = if critical {
            // Critical path: history must not dilute the event. No smoothed
            // value exists this tick, so the trend window (which holds only
            // smoothed scores) is left untouched.
            self.scores.clear();
            self.scores.push(raw);
            tracing::debug!(raw, "critical event, smoothing window flushed");
            raw
        } else {
            self.scores.push(raw);
            let smoothed = clamp01(weighted_recent(
                self.scores.iter_recent(),
                &self.cfg.ema_weights,
            ));
            self.trend.push(smoothed);
            let boosted = if self.trend.len() >= TREND_SLOPE_SAMPLES {
                let n = self
                    .trend
                    .last_n_chronological(TREND_SLOPE_SAMPLES, &mut self.slope_scratch);
                let slope = ols_slope(&self.slope_scratch[..n]);
                if slope > self.cfg.trend_slope_threshold {
                    tracing::trace!(slope, "upward trend boost applied");
                    clamp01(smoothed + self.cfg.trend_boost)
                } else {
                    smoothed
                }
            } else {
                smoothed
            };
            boosted
        };

        Ok(FusionOutput {
            fusion_score,
            confidence,
            is_critical_event: critical,
            vision: vision.map(|(s, _)| s.clone()),
            bio: bio.map(|(s, _)| s.clone()),
            timestamp_s: now_s,
        })
    }
}
