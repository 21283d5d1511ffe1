#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the fatigue monitoring system.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; defaults match the published tuning of the
//!   fusion engine (thresholds 0.25/0.50/0.75, hysteresis 0.10, 5-sample
//!   smoothing window, 10 Hz evaluation).
use serde::Deserialize;

/// Store/bus settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreCfg {
    /// Per-record expiration in seconds. Persistent records (pilot profiles,
    /// the state snapshot) are exempt.
    pub redis_ttl_s: u64,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self { redis_ttl_s: 300 }
    }
}

/// State manager settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StateCfg {
    /// Bounded history ring capacity.
    pub history_limit: usize,
}

impl Default for StateCfg {
    fn default() -> Self {
        Self {
            history_limit: 1000,
        }
    }
}

/// Stage classifier thresholds and pacing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StagesCfg {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
    /// Offset below an upward threshold that detects a downward transition.
    pub hysteresis: f64,
    /// Minimum dwell time between normal-path stage changes (seconds).
    pub min_stage_duration_s: f64,
    /// Minimum spacing between critical-path escalations (seconds).
    pub max_critical_alert_rate_s: f64,
}

impl Default for StagesCfg {
    fn default() -> Self {
        Self {
            mild: 0.25,
            moderate: 0.50,
            severe: 0.75,
            hysteresis: 0.10,
            min_stage_duration_s: 2.0,
            max_critical_alert_rate_s: 0.5,
        }
    }
}

/// Fusion core smoothing windows.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FusionTomlCfg {
    /// Score ring capacity for the exponential smoothing stage.
    pub window_size: usize,
    /// Trend ring capacity for slope detection.
    pub trend_window_size: usize,
    /// EMA weights applied most-recent first; length must equal window_size.
    pub ema_weights: Vec<f64>,
}

impl Default for FusionTomlCfg {
    fn default() -> Self {
        Self {
            window_size: 5,
            trend_window_size: 10,
            ema_weights: vec![0.4, 0.3, 0.2, 0.07, 0.03],
        }
    }
}

/// Freshness windows for incoming records.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FreshnessTomlCfg {
    pub vision_max_age_s: f64,
    /// Biometric records arrive at BLE cadence; they tolerate a longer window.
    pub bio_max_age_s: f64,
    pub alcohol_override_window_s: f64,
}

impl Default for FreshnessTomlCfg {
    fn default() -> Self {
        Self {
            vision_max_age_s: 5.0,
            bio_max_age_s: 10.0,
            alcohol_override_window_s: 10.0,
        }
    }
}

/// Per-pilot sensitivity multipliers applied to all stage thresholds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensitivityCfg {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SensitivityCfg {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 1.0,
            low: 1.3,
        }
    }
}

/// Evaluation loop pacing and failure budget.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EvaluatorTomlCfg {
    /// Maximum evaluation rate when inputs arrive continuously.
    pub tick_hz: u32,
    /// Continuous seconds without any valid sample before SYSTEM_ERROR.
    pub failure_budget_s: f64,
    /// Per-subscriber delivery budget before a callback is considered stuck.
    pub subscriber_timeout_s: f64,
}

impl Default for EvaluatorTomlCfg {
    fn default() -> Self {
        Self {
            tick_hz: 10,
            failure_budget_s: 30.0,
            subscriber_timeout_s: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub store: StoreCfg,
    pub state: StateCfg,
    pub stages: StagesCfg,
    pub fusion: FusionTomlCfg,
    pub freshness: FreshnessTomlCfg,
    pub sensitivity: SensitivityCfg,
    pub evaluator: EvaluatorTomlCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Validate cross-field constraints with precise messages.
    pub fn validate(&self) -> eyre::Result<()> {
        let st = &self.stages;
        for (name, v) in [
            ("stages.mild", st.mild),
            ("stages.moderate", st.moderate),
            ("stages.severe", st.severe),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                eyre::bail!("{name} must be within [0, 1], got {v}");
            }
        }
        if !(st.mild < st.moderate && st.moderate < st.severe) {
            eyre::bail!(
                "stage thresholds must be strictly ascending (mild < moderate < severe), got {} / {} / {}",
                st.mild,
                st.moderate,
                st.severe
            );
        }
        if !st.hysteresis.is_finite() || st.hysteresis < 0.0 {
            eyre::bail!("stages.hysteresis must be >= 0, got {}", st.hysteresis);
        }
        if st.hysteresis >= st.mild {
            eyre::bail!(
                "stages.hysteresis ({}) must be below the mild threshold ({})",
                st.hysteresis,
                st.mild
            );
        }
        if !st.min_stage_duration_s.is_finite() || st.min_stage_duration_s < 0.0 {
            eyre::bail!("stages.min_stage_duration_s must be >= 0");
        }
        if !st.max_critical_alert_rate_s.is_finite() || st.max_critical_alert_rate_s < 0.0 {
            eyre::bail!("stages.max_critical_alert_rate_s must be >= 0");
        }

        let fu = &self.fusion;
        if fu.window_size == 0 {
            eyre::bail!("fusion.window_size must be > 0");
        }
        if fu.trend_window_size == 0 {
            eyre::bail!("fusion.trend_window_size must be > 0");
        }
        if fu.ema_weights.len() != fu.window_size {
            eyre::bail!(
                "fusion.ema_weights length ({}) must equal fusion.window_size ({})",
                fu.ema_weights.len(),
                fu.window_size
            );
        }
        for w in &fu.ema_weights {
            if !w.is_finite() || *w < 0.0 {
                eyre::bail!("fusion.ema_weights entries must be finite and >= 0, got {w}");
            }
        }

        let fr = &self.freshness;
        if !fr.vision_max_age_s.is_finite() || fr.vision_max_age_s <= 0.0 {
            eyre::bail!("freshness.vision_max_age_s must be > 0");
        }
        if !fr.bio_max_age_s.is_finite() || fr.bio_max_age_s <= 0.0 {
            eyre::bail!("freshness.bio_max_age_s must be > 0");
        }
        if !fr.alcohol_override_window_s.is_finite() || fr.alcohol_override_window_s <= 0.0 {
            eyre::bail!("freshness.alcohol_override_window_s must be > 0");
        }

        let se = &self.sensitivity;
        for (name, v) in [
            ("sensitivity.high", se.high),
            ("sensitivity.medium", se.medium),
            ("sensitivity.low", se.low),
        ] {
            if !v.is_finite() || v <= 0.0 {
                eyre::bail!("{name} must be > 0, got {v}");
            }
        }

        if self.evaluator.tick_hz == 0 {
            eyre::bail!("evaluator.tick_hz must be > 0");
        }
        if !self.evaluator.failure_budget_s.is_finite() || self.evaluator.failure_budget_s <= 0.0 {
            eyre::bail!("evaluator.failure_budget_s must be > 0");
        }
        if !self.evaluator.subscriber_timeout_s.is_finite()
            || self.evaluator.subscriber_timeout_s <= 0.0
        {
            eyre::bail!("evaluator.subscriber_timeout_s must be > 0");
        }

        if self.state.history_limit == 0 {
            eyre::bail!("state.history_limit must be > 0");
        }

        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.stages.mild, 0.25);
        assert_eq!(cfg.fusion.ema_weights.len(), cfg.fusion.window_size);
        assert_eq!(cfg.store.redis_ttl_s, 300);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg = load_toml("").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.state.history_limit, 1000);
        assert_eq!(cfg.evaluator.tick_hz, 10);
    }
}
