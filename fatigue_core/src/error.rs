//! Domain errors for the fusion engine and the state authority.
use crate::types::SystemState;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FatigueError {
    #[error("stale sample: age {age_s:.3}s exceeds {max_age_s:.3}s")]
    StaleSample { age_s: f64, max_age_s: f64 },
    #[error("invalid sample: {0}")]
    InvalidSample(&'static str),
    #[error("no modality present for fusion")]
    InsufficientModalities,
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition { from: SystemState, to: SystemState },
    #[error("subscriber failure: {0}")]
    SubscriberFailure(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("shutdown requested")]
    ShutdownRequested,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        assert_eq!(
            FatigueError::StaleSample {
                age_s: 6.0,
                max_age_s: 5.0
            }
            .to_string(),
            "stale sample: age 6.000s exceeds 5.000s"
        );
        assert_eq!(
            FatigueError::InvalidSample("avg_ear out of range").to_string(),
            "invalid sample: avg_ear out of range"
        );
        assert_eq!(
            FatigueError::InsufficientModalities.to_string(),
            "no modality present for fusion"
        );
        assert_eq!(
            FatigueError::IllegalTransition {
                from: SystemState::Scanning,
                to: SystemState::AlertSevere
            }
            .to_string(),
            "illegal transition: scanning -> alert_severe"
        );
        assert_eq!(
            FatigueError::ShutdownRequested.to_string(),
            "shutdown requested"
        );
    }
}
