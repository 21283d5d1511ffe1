use proptest::prelude::*;
use std::sync::Arc;

use fatigue_core::classifier::StageClassifier;
use fatigue_core::config::{FusionCfg, StageCfg};
use fatigue_core::fusion::FusionCore;
use fatigue_core::state::{StateManager, transition_admissible};
use fatigue_core::types::{
    BioSample, FatigueStage, FusionOutput, Sensitivity, SystemState, VisionSample,
};
use fatigue_core::{hr_score, vision_score};
use fatigue_traits::{Clock, ManualClock};

fn vision_strategy() -> impl Strategy<Value = VisionSample> {
    (
        0.001f64..=1.0,  // avg_ear
        0.0f64..=1.0,    // mar
        0.0f64..10.0,    // closure_duration_s
        0u32..6,         // microsleep_count
        0.0f64..80.0,    // blink_rate_per_minute
        any::<bool>(),   // yawning
        0u32..8,         // yawn_count
        0.0f64..6.0,     // yawn_duration_s
    )
        .prop_map(
            |(avg_ear, mar, closure, microsleeps, blink, yawning, yawns, yawn_dur)| VisionSample {
                avg_ear,
                mar,
                eyes_closed: closure > 0.0,
                closure_duration_s: closure,
                microsleep_count: microsleeps,
                blink_rate_per_minute: blink,
                yawning,
                yawn_count: yawns,
                yawn_duration_s: yawn_dur,
                timestamp_s: 0.0,
            },
        )
}

fn bio_strategy() -> impl Strategy<Value = BioSample> {
    (
        0.0f64..=255.0,
        proptest::option::of(0.0f64..=1.0),
        proptest::option::of(0.0f64..200.0),
        proptest::option::of(-20.0f64..20.0),
        proptest::option::of(0.0f64..=1.0),
        30.0f64..120.0,
        10.0f64..120.0,
    )
        .prop_map(
            |(hr, stress, rmssd, trend, deviation, baseline_hr, baseline_hrv)| BioSample {
                hr,
                rr_interval_s: None,
                rmssd_ms: rmssd,
                hr_trend_bpm_per_min: trend,
                baseline_deviation: deviation,
                stress_index: stress,
                baseline_hr,
                baseline_hrv,
                timestamp_s: 0.0,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10_000))]

    /// All extractor and fusion outputs stay inside [0, 1].
    #[test]
    fn scores_and_confidence_always_clamp(
        v in vision_strategy(),
        b in proptest::option::of(bio_strategy()),
    ) {
        let vs = vision_score(&v);
        prop_assert!((0.0..=1.0).contains(&vs.score));
        for sub in [
            vs.diagnostics.ear_sub,
            vs.diagnostics.closure_sub,
            vs.diagnostics.microsleep_sub,
            vs.diagnostics.yawn_sub,
            vs.diagnostics.blink_sub,
        ] {
            prop_assert!((0.0..=1.0).contains(&sub), "sub-score {sub} out of range");
        }

        let bs = b.as_ref().map(|sample| hr_score(sample, None));
        if let Some(bs) = &bs {
            prop_assert!((0.0..=1.0).contains(&bs.score));
            prop_assert!((0.0..=1.0).contains(&bs.quality_bonus));
        }

        let mut fc = FusionCore::new(FusionCfg::default());
        let bio_input = b.as_ref().zip(bs.as_ref());
        let out = fc.fuse(0.0, Some((&v, &vs)), bio_input).unwrap();
        prop_assert!((0.0..=1.0).contains(&out.fusion_score));
        prop_assert!((0.0..=1.0).contains(&out.confidence));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// A critical tick leaves exactly the raw score in the window.
    #[test]
    fn critical_tick_leaves_window_of_one(
        calm_ticks in 0usize..8,
        v in vision_strategy(),
    ) {
        let mut fc = FusionCore::new(FusionCfg::default());
        let calm = VisionSample {
            avg_ear: 0.3,
            closure_duration_s: 0.0,
            microsleep_count: 0,
            yawn_count: 0,
            yawning: false,
            ..v.clone()
        };
        let calm_score = vision_score(&calm);
        prop_assume!(!calm_score.critical);
        for i in 0..calm_ticks {
            fc.fuse(i as f64, Some((&calm, &calm_score)), None).unwrap();
        }
        let critical = VisionSample { avg_ear: 0.10, microsleep_count: 3, ..v };
        let cs = vision_score(&critical);
        prop_assert!(cs.critical);
        let trend_before = fc.trend_len();
        let out = fc.fuse(10.0, Some((&critical, &cs)), None).unwrap();
        prop_assert!(out.is_critical_event);
        prop_assert_eq!(fc.window_len(), 1);
        // the trend window holds smoothed scores only; a critical tick
        // produces none
        prop_assert_eq!(fc.trend_len(), trend_before);
    }

    /// Normal-path changes keep the dwell; critical ones keep the alert gap.
    #[test]
    fn stage_changes_respect_rate_limits(
        scores in proptest::collection::vec((0.0f64..=1.0, any::<bool>()), 1..120),
    ) {
        let mut sc = StageClassifier::new(StageCfg::default());
        sc.begin(0.0);
        let mut last_change = 0.0f64;
        let mut last_critical = f64::NEG_INFINITY;
        for (i, (score, critical)) in scores.iter().enumerate() {
            let now = i as f64 * 0.3;
            let out = FusionOutput {
                fusion_score: *score,
                confidence: 0.8,
                is_critical_event: *critical,
                vision: None,
                bio: None,
                timestamp_s: now,
            };
            let d = sc.classify(&out, Sensitivity::Medium, now);
            if d.changed {
                if d.critical_path {
                    prop_assert!(now - last_critical >= 0.5 - 1e-9);
                    last_critical = now;
                } else {
                    prop_assert!(now - last_change >= 2.0 - 1e-9);
                }
                last_change = now;
            }
        }
    }

    /// Classification is monotone in sensitivity at every tick.
    #[test]
    fn sensitivity_is_monotone(
        scores in proptest::collection::vec(0.0f64..=1.0, 1..60),
    ) {
        let mut high = StageClassifier::new(StageCfg::default());
        let mut low = StageClassifier::new(StageCfg::default());
        high.begin(0.0);
        low.begin(0.0);
        for (i, score) in scores.iter().enumerate() {
            let now = i as f64;
            let out = FusionOutput {
                fusion_score: *score,
                confidence: 0.8,
                is_critical_event: false,
                vision: None,
                bio: None,
                timestamp_s: now,
            };
            let sh = high.classify(&out, Sensitivity::High, now).stage;
            let sl = low.classify(&out, Sensitivity::Low, now).stage;
            prop_assert!(sh >= sl, "tick {}: high {:?} < low {:?}", i, sh, sl);
        }
    }
}

fn any_state() -> impl Strategy<Value = SystemState> {
    prop_oneof![
        Just(SystemState::Scanning),
        Just(SystemState::IntruderDetected),
        Just(SystemState::MonitoringActive),
        Just(SystemState::AlertMild),
        Just(SystemState::AlertModerate),
        Just(SystemState::AlertSevere),
        Just(SystemState::AlcoholDetected),
        Just(SystemState::SystemError),
        Just(SystemState::SystemCrashed),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    /// Every committed transition is a graph edge, the history stays
    /// bounded, and its head is always the current snapshot.
    #[test]
    fn state_manager_only_commits_graph_edges(
        requests in proptest::collection::vec((any_state(), 0u8..4), 1..60),
        limit in 2usize..16,
    ) {
        let clock = Arc::new(ManualClock::new());
        let epoch = clock.now();
        let sm = StateManager::new(limit, 10.0, clock.clone(), epoch);
        for (state, msg) in requests {
            let before = sm.current().state;
            let result = sm.set_state(state, format!("m{msg}"), "prop", None, None);
            if result.is_ok() {
                prop_assert!(
                    transition_admissible(before, state),
                    "committed {before:?} -> {state:?} without an edge"
                );
            } else {
                prop_assert_eq!(sm.current().state, before);
            }
            prop_assert!(sm.history_len() <= limit);
            let history = sm.history(limit);
            prop_assert_eq!(&history[0], &sm.current());
            clock.advance_secs(0.1);
        }
    }
}

/// Stage level never skips on the normal path.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn normal_path_moves_at_most_one_level(
        scores in proptest::collection::vec(0.0f64..=1.0, 1..80),
    ) {
        let mut sc = StageClassifier::new(StageCfg::default());
        sc.begin(0.0);
        let mut prev = FatigueStage::Active;
        for (i, score) in scores.iter().enumerate() {
            let now = i as f64 * 2.5;
            let out = FusionOutput {
                fusion_score: *score,
                confidence: 0.8,
                is_critical_event: false,
                vision: None,
                bio: None,
                timestamp_s: now,
            };
            let d = sc.classify(&out, Sensitivity::Medium, now);
            let delta = i16::from(d.stage.level()) - i16::from(prev.level());
            prop_assert!(delta.abs() <= 1, "jumped {prev:?} -> {:?}", d.stage);
            prev = d.stage;
        }
    }
}
