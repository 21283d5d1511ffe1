#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Multi-modal fatigue fusion engine (bus-agnostic).
//!
//! This crate fuses freshly published vision metrics (eye/mouth geometry,
//! microsleeps, yawning, blink rate) and biometric metrics (heart rate,
//! HRV, stress) into a confidence-weighted fatigue score, smooths it along
//! two paths (critical bypass vs. exponential smoothing with trend boost),
//! and drives a hysteretic four-stage classifier plus the system-wide state
//! authority. All IO goes through `fatigue_traits::Store`; all timing goes
//! through `fatigue_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Extraction**: pure per-modality scoring (`vision`, `biometric`)
//! - **Fusion**: weight redistribution, confidence, dual-path smoothing
//!   (`fusion`)
//! - **Classification**: confidence-scaled thresholds with hysteresis and
//!   rate limits (`classifier`)
//! - **State**: validated transition graph, bounded history, subscriber
//!   dispatch, alcohol override (`state`)
//! - **Ingress/loop**: payload decoding, ordering, the 10 Hz evaluation
//!   thread (`ingress`, `evaluator`)

// Module declarations
pub mod biometric;
pub mod classifier;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fusion;
pub mod ingress;
pub mod mocks;
pub mod ring;
pub mod state;
pub mod types;
pub mod util;
pub mod vision;

pub use biometric::{BioScore, hr_score};
pub use classifier::{StageClassifier, StageDecision};
pub use config::{EvaluatorCfg, FreshnessCfg, FusionCfg, StageCfg};
pub use error::{FatigueError, Result};
pub use evaluator::{EvalStats, Evaluator};
pub use fusion::FusionCore;
pub use state::{StateManager, transition_admissible};
pub use types::{
    AlcoholEvent, BioSample, FatigueStage, FusionOutput, PilotProfile, SensorMessage,
    Sensitivity, StateSnapshot, SystemState, VisionSample,
};
pub use vision::{VisionDiagnostics, VisionScore, vision_score};
