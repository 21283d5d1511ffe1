//! Hysteretic four-stage fatigue classifier.
//!
//! Thresholds are scaled by pilot sensitivity and by fusion confidence, then
//! compared against a short recency-weighted window of smoothed scores.
//! Normal transitions move one stage at a time and respect a minimum dwell;
//! critical events may jump straight to Moderate/Severe under a tighter
//! rate limit.

use crate::config::StageCfg;
use crate::ring::RingBuf;
use crate::types::{FatigueStage, FusionOutput, Sensitivity};
use crate::util::{clamp01, weighted_recent};

/// Recency weights for the 3-deep decision window, most-recent first.
const WINDOW_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

/// Outcome of one classification tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageDecision {
    pub previous: FatigueStage,
    pub stage: FatigueStage,
    pub changed: bool,
    /// True when the change was committed through the critical bypass.
    pub critical_path: bool,
    pub window_avg: f64,
}

pub struct StageClassifier {
    cfg: StageCfg,
    stage: FatigueStage,
    window: RingBuf,
    last_stage_change_s: f64,
    last_critical_alert_s: f64,
}

impl std::fmt::Debug for StageClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageClassifier")
            .field("stage", &self.stage)
            .field("window", &self.window.len())
            .finish()
    }
}

impl StageClassifier {
    pub fn new(cfg: StageCfg) -> Self {
        Self {
            cfg,
            stage: FatigueStage::Active,
            window: RingBuf::new(WINDOW_WEIGHTS.len()),
            last_stage_change_s: 0.0,
            last_critical_alert_s: f64::NEG_INFINITY,
        }
    }

    /// Reset to Active and restart the dwell timer at `now_s`. The first
    /// normal-path transition can only happen one full dwell later.
    pub fn begin(&mut self, now_s: f64) {
        self.stage = FatigueStage::Active;
        self.window.clear();
        self.last_stage_change_s = now_s;
        self.last_critical_alert_s = f64::NEG_INFINITY;
    }

    pub fn current_stage(&self) -> FatigueStage {
        self.stage
    }

    /// Re-align with an externally committed stage: the decision window is
    /// discarded and the dwell timer restarts at `now_s`. Used when the
    /// state authority refuses a proposed change, so the classifier can
    /// never run ahead of the committed state.
    pub fn resync(&mut self, stage: FatigueStage, now_s: f64) {
        self.stage = stage;
        self.window.clear();
        self.last_stage_change_s = now_s;
    }

    /// Effective upward thresholds [mild, moderate, severe] after sensitivity
    /// and confidence scaling.
    pub fn thresholds(&self, sensitivity: Sensitivity, confidence: f64) -> [f64; 3] {
        let mult = self.cfg.sensitivity_multiplier(sensitivity);
        let factor = 0.8 + clamp01(confidence) * 0.4;
        [
            self.cfg.mild * mult * factor,
            self.cfg.moderate * mult * factor,
            self.cfg.severe * mult * factor,
        ]
    }

    fn stage_for(avg: f64, th: &[f64; 3]) -> FatigueStage {
        if avg >= th[2] {
            FatigueStage::Severe
        } else if avg >= th[1] {
            FatigueStage::Moderate
        } else if avg >= th[0] {
            FatigueStage::Mild
        } else {
            FatigueStage::Active
        }
    }

    /// Upward threshold for a non-Active stage.
    fn threshold_up(stage: FatigueStage, th: &[f64; 3]) -> f64 {
        match stage {
            FatigueStage::Active => 0.0,
            FatigueStage::Mild => th[0],
            FatigueStage::Moderate => th[1],
            FatigueStage::Severe => th[2],
        }
    }

    /// Classify one fusion tick.
    pub fn classify(
        &mut self,
        out: &FusionOutput,
        sensitivity: Sensitivity,
        now_s: f64,
    ) -> StageDecision {
        self.window.push(out.fusion_score);
        let avg = clamp01(weighted_recent(self.window.iter_recent(), &WINDOW_WEIGHTS));
        let th = self.thresholds(sensitivity, out.confidence);
        let target = Self::stage_for(avg, &th);
        let previous = self.stage;

        // Critical bypass: immediate multi-level escalation to Moderate or
        // Severe, rate-limited separately from the normal dwell.
        if out.is_critical_event
            && target > self.stage
            && target >= FatigueStage::Moderate
            && now_s - self.last_critical_alert_s >= self.cfg.max_critical_alert_rate_s
        {
            self.stage = target;
            self.last_critical_alert_s = now_s;
            self.last_stage_change_s = now_s;
            tracing::info!(from = %previous, to = %target, avg, "critical escalation");
            return StageDecision {
                previous,
                stage: target,
                changed: true,
                critical_path: true,
                window_avg: avg,
            };
        }

        // Normal path: one level per evaluation, hysteresis relative to the
        // current stage, minimum dwell between changes.
        let proposed = if target > self.stage {
            self.stage.step_up()
        } else if target < self.stage
            && avg < Self::threshold_up(self.stage, &th) - self.cfg.hysteresis
        {
            self.stage.step_down()
        } else {
            self.stage
        };

        let mut changed = false;
        if proposed != self.stage
            && now_s - self.last_stage_change_s >= self.cfg.min_stage_duration_s
        {
            tracing::info!(from = %self.stage, to = %proposed, avg, "stage change");
            self.stage = proposed;
            self.last_stage_change_s = now_s;
            changed = true;
        }

        StageDecision {
            previous,
            stage: self.stage,
            changed,
            critical_path: false,
            window_avg: avg,
        }
    }
}
