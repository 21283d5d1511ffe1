//! Runtime configuration structs for the engine.
//!
//! These mirror the TOML schemas in `fatigue_config` but carry only what the
//! hot path needs; the CLI maps between the two at startup.

use crate::types::Sensitivity;

/// Fusion core smoothing configuration.
#[derive(Debug, Clone)]
pub struct FusionCfg {
    /// Score ring capacity for the exponential smoothing stage.
    pub window_size: usize,
    /// Trend ring capacity for slope detection.
    pub trend_window_size: usize,
    /// EMA weights applied most-recent first. Length must equal window_size.
    pub ema_weights: Vec<f64>,
    /// Slope (per sample, over the last 5 smoothed scores) above which the
    /// emitted score gets a trend boost.
    pub trend_slope_threshold: f64,
    /// Boost added when the trend threshold is exceeded.
    pub trend_boost: f64,
}

impl Default for FusionCfg {
    fn default() -> Self {
        Self {
            window_size: 5,
            trend_window_size: 10,
            ema_weights: vec![0.4, 0.3, 0.2, 0.07, 0.03],
            trend_slope_threshold: 0.2,
            trend_boost: 0.05,
        }
    }
}

/// Stage classifier thresholds, hysteresis, and pacing.
#[derive(Debug, Clone)]
pub struct StageCfg {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
    /// Offset below an upward threshold used to detect a downward transition.
    pub hysteresis: f64,
    /// Minimum dwell between normal-path stage changes (seconds).
    pub min_stage_duration_s: f64,
    /// Minimum spacing between critical-path escalations (seconds).
    pub max_critical_alert_rate_s: f64,
    /// Threshold multipliers per pilot sensitivity.
    pub sensitivity_high: f64,
    pub sensitivity_medium: f64,
    pub sensitivity_low: f64,
}

impl Default for StageCfg {
    fn default() -> Self {
        Self {
            mild: 0.25,
            moderate: 0.50,
            severe: 0.75,
            hysteresis: 0.10,
            min_stage_duration_s: 2.0,
            max_critical_alert_rate_s: 0.5,
            sensitivity_high: 0.7,
            sensitivity_medium: 1.0,
            sensitivity_low: 1.3,
        }
    }
}

impl StageCfg {
    pub fn sensitivity_multiplier(&self, s: Sensitivity) -> f64 {
        match s {
            Sensitivity::High => self.sensitivity_high,
            Sensitivity::Medium => self.sensitivity_medium,
            Sensitivity::Low => self.sensitivity_low,
        }
    }
}

/// Freshness windows enforced on ingress.
#[derive(Debug, Clone)]
pub struct FreshnessCfg {
    pub vision_max_age_s: f64,
    pub bio_max_age_s: f64,
    pub alcohol_override_window_s: f64,
}

impl Default for FreshnessCfg {
    fn default() -> Self {
        Self {
            vision_max_age_s: 5.0,
            bio_max_age_s: 10.0,
            alcohol_override_window_s: 10.0,
        }
    }
}

/// Evaluation loop pacing, failure budget, and store backoff.
#[derive(Debug, Clone)]
pub struct EvaluatorCfg {
    /// Maximum evaluation rate when inputs arrive continuously.
    pub tick_hz: u32,
    /// Continuous seconds without any valid sample before SYSTEM_ERROR.
    pub failure_budget_s: f64,
    /// Initial store reconnect backoff (seconds); doubles per failure.
    pub backoff_initial_s: f64,
    /// Backoff ceiling (seconds).
    pub backoff_cap_s: f64,
}

impl Default for EvaluatorCfg {
    fn default() -> Self {
        Self {
            tick_hz: 10,
            failure_budget_s: 30.0,
            backoff_initial_s: 0.5,
            backoff_cap_s: 30.0,
        }
    }
}
