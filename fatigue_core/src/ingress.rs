//! Ingress adapters: store payloads in, typed sensor messages out.
//!
//! Purely mechanical translation plus per-modality ordering enforcement.
//! Sample timestamps must be monotonically non-decreasing per modality;
//! anything older than the last admitted sample is dropped and counted.

use crate::error::FatigueError;
use crate::types::{AlcoholEvent, BioSample, PilotProfile, SensorMessage, VisionSample};

/// Logical key map of the published-data contract.
pub mod keys {
    pub const VISION: &str = "data:vision";
    pub const HR: &str = "data:hr";
    /// Ambient temperature/humidity; display enrichment only, never fused.
    pub const ENV: &str = "data:env";
    pub const ALCOHOL: &str = "data:alcohol_detected";
    pub const PILOT_PREFIX: &str = "data:pilot:";
    pub const PILOT_ID_REQUEST: &str = "data:pilot_id_request";
    pub const FUSION: &str = "data:fusion";
    pub const FATIGUE_ALERT: &str = "data:fatigue_alert";
    pub const STATE_CURRENT: &str = "state:current";
}

/// Decode one store record into a sensor message. Keys outside the engine's
/// input contract (env data, profile-fetch requests, our own outputs) map to
/// `None`.
pub fn decode(
    key: &str,
    value: &serde_json::Value,
) -> Result<Option<SensorMessage>, FatigueError> {
    if key == keys::VISION {
        let sample: VisionSample = serde_json::from_value(value.clone())
            .map_err(|_| FatigueError::InvalidSample("malformed vision payload"))?;
        return Ok(Some(SensorMessage::Vision(sample)));
    }
    if key == keys::HR {
        let sample: BioSample = serde_json::from_value(value.clone())
            .map_err(|_| FatigueError::InvalidSample("malformed biometric payload"))?;
        return Ok(Some(SensorMessage::Bio(sample)));
    }
    if key == keys::ALCOHOL {
        let event: AlcoholEvent = serde_json::from_value(value.clone())
            .map_err(|_| FatigueError::InvalidSample("malformed alcohol payload"))?;
        return Ok(Some(SensorMessage::Alcohol(event)));
    }
    if let Some(_id) = key.strip_prefix(keys::PILOT_PREFIX) {
        let profile: PilotProfile = serde_json::from_value(value.clone())
            .map_err(|_| FatigueError::InvalidSample("malformed pilot profile"))?;
        return Ok(Some(SensorMessage::Pilot(profile)));
    }
    Ok(None)
}

/// Per-modality ordering gate with drop counters.
#[derive(Debug, Default)]
pub struct Ingress {
    last_vision_ts: Option<f64>,
    last_bio_ts: Option<f64>,
    last_alcohol_ts: Option<f64>,
    pub dropped_out_of_order: u64,
    pub decode_failures: u64,
}

impl Ingress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a message if its timestamp does not regress within its
    /// modality. Profiles carry no sample timestamp and always pass.
    pub fn admit(&mut self, msg: SensorMessage) -> Option<SensorMessage> {
        let gate = |last: &mut Option<f64>, ts: f64, modality: &str| -> bool {
            if last.is_some_and(|prev| ts < prev) {
                tracing::debug!(modality, ts, "dropping out-of-order sample");
                return false;
            }
            *last = Some(ts);
            true
        };
        let admitted = match &msg {
            SensorMessage::Vision(s) => gate(&mut self.last_vision_ts, s.timestamp_s, "vision"),
            SensorMessage::Bio(s) => gate(&mut self.last_bio_ts, s.timestamp_s, "bio"),
            SensorMessage::Alcohol(e) => gate(&mut self.last_alcohol_ts, e.timestamp_s, "alcohol"),
            SensorMessage::Pilot(_) => true,
        };
        if admitted {
            Some(msg)
        } else {
            self.dropped_out_of_order += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_routes_by_key() {
        let vision = json!({
            "avg_ear": 0.28, "mar": 0.1, "eyes_closed": false,
            "closure_duration_s": 0.0, "microsleep_count": 0,
            "blink_rate_per_minute": 15.0, "yawning": false,
            "yawn_count": 0, "yawn_duration_s": 0.0, "timestamp_s": 1.0
        });
        assert!(matches!(
            decode(keys::VISION, &vision),
            Ok(Some(SensorMessage::Vision(_)))
        ));

        let alcohol = json!({"detection_time": 1.0, "timestamp_s": 1.0});
        assert!(matches!(
            decode(keys::ALCOHOL, &alcohol),
            Ok(Some(SensorMessage::Alcohol(_)))
        ));

        let profile = json!({
            "id": "p1", "baseline_hr": 70.0, "baseline_hrv": 50.0,
            "sensitivity": "high", "active": true
        });
        assert!(matches!(
            decode("data:pilot:p1", &profile),
            Ok(Some(SensorMessage::Pilot(_)))
        ));

        // env data is consumed elsewhere
        assert!(matches!(decode(keys::ENV, &json!({"temp_c": 21.0})), Ok(None)));
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        assert!(matches!(
            decode(keys::VISION, &json!({"avg_ear": "not a number"})),
            Err(FatigueError::InvalidSample(_))
        ));
    }

    #[test]
    fn out_of_order_samples_are_dropped_per_modality() {
        let mut ingress = Ingress::new();
        let mk = |ts: f64| {
            SensorMessage::Alcohol(AlcoholEvent {
                detection_time: ts,
                timestamp_s: ts,
            })
        };
        assert!(ingress.admit(mk(2.0)).is_some());
        assert!(ingress.admit(mk(1.0)).is_none());
        assert_eq!(ingress.dropped_out_of_order, 1);
        // equal timestamps are non-decreasing, thus admitted
        assert!(ingress.admit(mk(2.0)).is_some());
        // other modalities are unaffected
        let bio = SensorMessage::Bio(BioSample {
            hr: 70.0,
            rr_interval_s: None,
            rmssd_ms: None,
            hr_trend_bpm_per_min: None,
            baseline_deviation: None,
            stress_index: None,
            baseline_hr: 70.0,
            baseline_hrv: 50.0,
            timestamp_s: 0.5,
        });
        assert!(ingress.admit(bio).is_some());
    }
}
