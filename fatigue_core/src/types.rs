//! Sample, profile, and state types shared across the engine.
//!
//! Serialized forms follow the bus payload rules: numbers are IEEE-754
//! doubles, booleans native, enumerations lowercase strings, and every
//! record carries `timestamp_s` plus the originating `service`.

use crate::error::FatigueError;
use serde::{Deserialize, Serialize};

/// One camera frame's worth of facial geometry, produced by the vision
/// pipeline. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSample {
    /// Eye aspect ratio, averaged over both eyes. Valid range (0, 1].
    pub avg_ear: f64,
    /// Mouth aspect ratio in [0, 1].
    pub mar: f64,
    pub eyes_closed: bool,
    /// Current continuous eye-closure duration in seconds.
    pub closure_duration_s: f64,
    pub microsleep_count: u32,
    pub blink_rate_per_minute: f64,
    pub yawning: bool,
    pub yawn_count: u32,
    /// Duration of the yawn in progress, seconds; 0 when not yawning.
    pub yawn_duration_s: f64,
    pub timestamp_s: f64,
}

impl VisionSample {
    /// Range and freshness validation. Geometry outside its declared range
    /// means the landmark extractor glitched; such frames never reach fusion.
    pub fn validate(&self, now_s: f64, max_age_s: f64) -> Result<(), FatigueError> {
        if !self.avg_ear.is_finite() || self.avg_ear <= 0.0 || self.avg_ear > 1.0 {
            return Err(FatigueError::InvalidSample("avg_ear out of range"));
        }
        if !self.mar.is_finite() || !(0.0..=1.0).contains(&self.mar) {
            return Err(FatigueError::InvalidSample("mar out of range"));
        }
        if !self.closure_duration_s.is_finite() || self.closure_duration_s < 0.0 {
            return Err(FatigueError::InvalidSample("closure_duration_s negative"));
        }
        if !self.blink_rate_per_minute.is_finite() || self.blink_rate_per_minute < 0.0 {
            return Err(FatigueError::InvalidSample("blink_rate_per_minute negative"));
        }
        if !self.yawn_duration_s.is_finite() || self.yawn_duration_s < 0.0 {
            return Err(FatigueError::InvalidSample("yawn_duration_s negative"));
        }
        if !fatigue_traits::is_fresh(now_s, self.timestamp_s, max_age_s) {
            return Err(FatigueError::StaleSample {
                age_s: now_s - self.timestamp_s,
                max_age_s,
            });
        }
        Ok(())
    }
}

/// A heart-rate record from the biometric pipeline. The enhanced fields are
/// only present when the HRV window has filled; the engine degrades to raw
/// HR deviation without them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioSample {
    /// Heart rate in bpm, sensor range 0..=255.
    pub hr: f64,
    pub rr_interval_s: Option<f64>,
    pub rmssd_ms: Option<f64>,
    pub hr_trend_bpm_per_min: Option<f64>,
    /// Normalized deviation from the pilot baseline, [0, 1].
    pub baseline_deviation: Option<f64>,
    pub stress_index: Option<f64>,
    pub baseline_hr: f64,
    pub baseline_hrv: f64,
    pub timestamp_s: f64,
}

impl BioSample {
    pub fn validate(&self, now_s: f64, max_age_s: f64) -> Result<(), FatigueError> {
        if !self.hr.is_finite() || !(0.0..=255.0).contains(&self.hr) {
            return Err(FatigueError::InvalidSample("hr out of range"));
        }
        if let Some(s) = self.stress_index
            && (!s.is_finite() || !(0.0..=1.0).contains(&s))
        {
            return Err(FatigueError::InvalidSample("stress_index out of range"));
        }
        if let Some(r) = self.rmssd_ms
            && (!r.is_finite() || r < 0.0)
        {
            return Err(FatigueError::InvalidSample("rmssd_ms negative"));
        }
        if let Some(d) = self.baseline_deviation
            && (!d.is_finite() || !(0.0..=1.0).contains(&d))
        {
            return Err(FatigueError::InvalidSample("baseline_deviation out of range"));
        }
        if !fatigue_traits::is_fresh(now_s, self.timestamp_s, max_age_s) {
            return Err(FatigueError::StaleSample {
                age_s: now_s - self.timestamp_s,
                max_age_s,
            });
        }
        Ok(())
    }

    /// True when at least one enhanced HRV-derived field is present.
    pub fn has_enhanced(&self) -> bool {
        self.stress_index.is_some()
            || self.rmssd_ms.is_some()
            || self.hr_trend_bpm_per_min.is_some()
            || self.baseline_deviation.is_some()
    }
}

/// Alcohol detection record. Freshness of this record drives the override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlcoholEvent {
    pub detection_time: f64,
    pub timestamp_s: f64,
}

/// Per-pilot alerting sensitivity; scales every stage threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    High,
    #[default]
    Medium,
    Low,
}

/// Pilot profile as delivered by the authentication service. Fields beyond
/// the baselines are opaque to the fusion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotProfile {
    pub id: String,
    pub baseline_hr: f64,
    pub baseline_hrv: f64,
    #[serde(default)]
    pub sensitivity: Option<Sensitivity>,
    #[serde(default)]
    pub active: bool,
}

/// Fatigue stages in escalation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FatigueStage {
    #[default]
    Active,
    Mild,
    Moderate,
    Severe,
}

impl FatigueStage {
    pub fn level(self) -> u8 {
        match self {
            FatigueStage::Active => 0,
            FatigueStage::Mild => 1,
            FatigueStage::Moderate => 2,
            FatigueStage::Severe => 3,
        }
    }

    pub fn from_level(level: u8) -> Self {
        match level {
            0 => FatigueStage::Active,
            1 => FatigueStage::Mild,
            2 => FatigueStage::Moderate,
            _ => FatigueStage::Severe,
        }
    }

    /// One stage up, saturating at Severe.
    pub fn step_up(self) -> Self {
        Self::from_level(self.level().saturating_add(1).min(3))
    }

    /// One stage down, saturating at Active.
    pub fn step_down(self) -> Self {
        Self::from_level(self.level().saturating_sub(1))
    }
}

impl std::fmt::Display for FatigueStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatigueStage::Active => write!(f, "active"),
            FatigueStage::Mild => write!(f, "mild"),
            FatigueStage::Moderate => write!(f, "moderate"),
            FatigueStage::Severe => write!(f, "severe"),
        }
    }
}

/// Global system state owned by the state manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    #[default]
    Scanning,
    IntruderDetected,
    MonitoringActive,
    AlertMild,
    AlertModerate,
    AlertSevere,
    AlcoholDetected,
    SystemError,
    SystemCrashed,
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SystemState::Scanning => "scanning",
            SystemState::IntruderDetected => "intruder_detected",
            SystemState::MonitoringActive => "monitoring_active",
            SystemState::AlertMild => "alert_mild",
            SystemState::AlertModerate => "alert_moderate",
            SystemState::AlertSevere => "alert_severe",
            SystemState::AlcoholDetected => "alcohol_detected",
            SystemState::SystemError => "system_error",
            SystemState::SystemCrashed => "system_crashed",
        };
        write!(f, "{s}")
    }
}

impl SystemState {
    /// States driven by the fatigue classifier (plus the monitoring floor).
    pub fn is_fatigue_driven(self) -> bool {
        matches!(
            self,
            SystemState::MonitoringActive
                | SystemState::AlertMild
                | SystemState::AlertModerate
                | SystemState::AlertSevere
        )
    }
}

impl From<FatigueStage> for SystemState {
    fn from(stage: FatigueStage) -> Self {
        match stage {
            FatigueStage::Active => SystemState::MonitoringActive,
            FatigueStage::Mild => SystemState::AlertMild,
            FatigueStage::Moderate => SystemState::AlertModerate,
            FatigueStage::Severe => SystemState::AlertSevere,
        }
    }
}

/// Immutable record of one committed state, as stored in the history ring
/// and delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub state: SystemState,
    pub message: String,
    pub timestamp_s: f64,
    pub pilot_id: Option<String>,
    /// Service that requested the transition.
    pub service: String,
    /// Opaque enrichment payload carried through to consumers.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Result of one fusion tick, published on `data:fusion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionOutput {
    pub fusion_score: f64,
    pub confidence: f64,
    pub is_critical_event: bool,
    /// Inputs copied for traceability.
    pub vision: Option<VisionSample>,
    pub bio: Option<BioSample>,
    pub timestamp_s: f64,
}

/// Tagged sum over everything the evaluation thread can receive, so message
/// handling is exhaustive case analysis rather than key-string dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorMessage {
    Vision(VisionSample),
    Bio(BioSample),
    Alcohol(AlcoholEvent),
    Pilot(PilotProfile),
}
