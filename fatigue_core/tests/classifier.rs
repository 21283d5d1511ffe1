use fatigue_core::classifier::StageClassifier;
use fatigue_core::config::{FusionCfg, StageCfg};
use fatigue_core::fusion::FusionCore;
use fatigue_core::types::{FatigueStage, FusionOutput, Sensitivity, VisionSample};
use fatigue_core::vision_score;
use rstest::rstest;

fn vision(avg_ear: f64, closure_s: f64, microsleeps: u32, blink: f64, ts: f64) -> VisionSample {
    VisionSample {
        avg_ear,
        mar: 0.1,
        eyes_closed: closure_s > 0.0,
        closure_duration_s: closure_s,
        microsleep_count: microsleeps,
        blink_rate_per_minute: blink,
        yawning: false,
        yawn_count: 0,
        yawn_duration_s: 0.0,
        timestamp_s: ts,
    }
}

/// Fusion output with a fixed confidence of 0.80 (threshold factor 1.12).
fn output(score: f64, critical: bool, ts: f64) -> FusionOutput {
    FusionOutput {
        fusion_score: score,
        confidence: 0.80,
        is_critical_event: critical,
        vision: None,
        bio: None,
        timestamp_s: ts,
    }
}

/// Drive one vision-only sample through fusion and classification.
fn drive(
    fc: &mut FusionCore,
    sc: &mut StageClassifier,
    sample: &VisionSample,
    sensitivity: Sensitivity,
    now: f64,
) -> FatigueStage {
    let vs = vision_score(sample);
    let out = fc.fuse(now, Some((sample, &vs)), None).unwrap();
    sc.classify(&out, sensitivity, now).stage
}

#[test]
fn gradual_onset_reaches_mild_within_five_ticks() {
    let mut fc = FusionCore::new(FusionCfg::default());
    let mut sc = StageClassifier::new(StageCfg::default());
    fc.begin();
    sc.begin(0.0);

    let ears = [0.30, 0.27, 0.25, 0.22, 0.19];
    let closures = [0.0, 0.5, 0.5, 0.6, 0.6];
    let mut stages = Vec::new();
    for i in 0..5 {
        let s = vision(ears[i], closures[i], 0, 15.0, i as f64);
        stages.push(drive(&mut fc, &mut sc, &s, Sensitivity::Medium, i as f64));
    }
    // no transition before the minimum dwell has elapsed
    assert_eq!(stages[0], FatigueStage::Active);
    assert_eq!(stages[1], FatigueStage::Active);
    // onset lands in Mild by the fifth tick
    assert_eq!(*stages.last().unwrap(), FatigueStage::Mild);
}

#[test]
fn critical_extended_closure_escalates_to_moderate_within_half_second() {
    let mut fc = FusionCore::new(FusionCfg::default());
    let mut sc = StageClassifier::new(StageCfg::default());
    fc.begin();
    sc.begin(0.0);

    // avg_ear 0.08, closure 1.4s, one microsleep, 3 blinks/min
    let mut stage = FatigueStage::Active;
    let mut reached_at = None;
    for i in 0..5 {
        let now = i as f64 * 0.1;
        let s = vision(0.08, 1.4, 1, 3.0, now);
        let vs = vision_score(&s);
        assert!(vs.critical);
        let out = fc.fuse(now, Some((&s, &vs)), None).unwrap();
        assert!(out.is_critical_event);
        stage = sc.classify(&out, Sensitivity::Medium, now).stage;
        if stage >= FatigueStage::Moderate && reached_at.is_none() {
            reached_at = Some(now);
        }
    }
    assert_eq!(stage, FatigueStage::Moderate);
    assert!(reached_at.unwrap() <= 0.5, "took {:?}", reached_at);
}

#[test]
fn recovery_steps_down_without_oscillation() {
    let mut fc = FusionCore::new(FusionCfg::default());
    let mut sc = StageClassifier::new(StageCfg::default());
    fc.begin();
    sc.begin(0.0);

    // Escalate to Moderate through the critical path first.
    for i in 0..4 {
        let now = i as f64 * 0.1;
        let s = vision(0.08, 1.4, 1, 3.0, now);
        drive(&mut fc, &mut sc, &s, Sensitivity::Medium, now);
    }
    assert_eq!(sc.current_stage(), FatigueStage::Moderate);

    // Then recover: wide-open eyes, no closure, for ten 1s ticks.
    let mut stages = Vec::new();
    for i in 0..10 {
        let now = 1.0 + i as f64;
        let s = vision(0.35, 0.0, 0, 15.0, now);
        stages.push(drive(&mut fc, &mut sc, &s, Sensitivity::Medium, now));
    }
    // monotone non-increasing, lands back at Active
    for pair in stages.windows(2) {
        assert!(pair[1] <= pair[0], "oscillated: {stages:?}");
    }
    assert_eq!(*stages.last().unwrap(), FatigueStage::Active);
    // hysteresis + dwell means the walk down takes separate steps
    assert!(stages.contains(&FatigueStage::Mild));
}

#[test]
fn normal_path_moves_one_level_and_respects_dwell() {
    let mut sc = StageClassifier::new(StageCfg::default());
    sc.begin(0.0);

    // A very high non-critical score cannot jump levels or beat the dwell.
    let d = sc.classify(&output(0.95, false, 0.1), Sensitivity::Medium, 0.1);
    assert_eq!(d.stage, FatigueStage::Active);
    assert!(!d.changed);

    let d = sc.classify(&output(0.95, false, 2.1), Sensitivity::Medium, 2.1);
    assert_eq!(d.stage, FatigueStage::Mild);
    assert!(d.changed && !d.critical_path);

    // next level needs another full dwell
    let d = sc.classify(&output(0.95, false, 2.5), Sensitivity::Medium, 2.5);
    assert_eq!(d.stage, FatigueStage::Mild);
    let d = sc.classify(&output(0.95, false, 4.2), Sensitivity::Medium, 4.2);
    assert_eq!(d.stage, FatigueStage::Moderate);
}

#[test]
fn critical_path_is_rate_limited() {
    let mut sc = StageClassifier::new(StageCfg::default());
    sc.begin(0.0);

    // First tick: window average is still suffix-damped below Moderate.
    let d0 = sc.classify(&output(1.0, true, 0.0), Sensitivity::Medium, 0.0);
    assert!(!d0.changed);

    // Second tick clears the Moderate threshold: immediate escalation.
    let d1 = sc.classify(&output(1.0, true, 0.1), Sensitivity::Medium, 0.1);
    assert_eq!(d1.stage, FatigueStage::Moderate);
    assert!(d1.changed && d1.critical_path);

    // 0.1s later the average clears Severe, but the critical path is
    // rate limited and the normal path is dwell limited.
    let d2 = sc.classify(&output(1.0, true, 0.2), Sensitivity::Medium, 0.2);
    assert!(!d2.changed);
    assert_eq!(d2.stage, FatigueStage::Moderate);

    // Once the alert spacing has elapsed the critical path fires again.
    let d3 = sc.classify(&output(1.0, true, 0.7), Sensitivity::Medium, 0.7);
    assert_eq!(d3.stage, FatigueStage::Severe);
    assert!(d3.critical_path);
}

#[test]
fn hysteresis_holds_the_stage_inside_the_band() {
    let mut sc = StageClassifier::new(StageCfg::default());
    sc.begin(0.0);
    // confidence 0.5 -> factor 1.0, thresholds at 0.25/0.50/0.75
    let mk = |score: f64, ts: f64| FusionOutput {
        fusion_score: score,
        confidence: 0.5,
        is_critical_event: false,
        vision: None,
        bio: None,
        timestamp_s: ts,
    };
    // reach Mild
    for i in 0..4 {
        sc.classify(&mk(0.40, i as f64), Sensitivity::Medium, i as f64);
    }
    assert_eq!(sc.current_stage(), FatigueStage::Mild);
    // drift just below the mild threshold but inside the hysteresis band
    for i in 4..8 {
        let d = sc.classify(&mk(0.20, i as f64), Sensitivity::Medium, i as f64);
        // window average decays towards 0.20 > 0.25 - 0.10
        assert_eq!(d.stage, FatigueStage::Mild, "left the band at tick {i}");
    }
    // dropping clearly below threshold - H releases it
    for i in 8..12 {
        sc.classify(&mk(0.05, i as f64), Sensitivity::Medium, i as f64);
    }
    assert_eq!(sc.current_stage(), FatigueStage::Active);
}

#[rstest]
#[case(0.30)]
#[case(0.45)]
#[case(0.62)]
fn higher_sensitivity_never_classifies_lower(#[case] level: f64) {
    let mut high = StageClassifier::new(StageCfg::default());
    let mut low = StageClassifier::new(StageCfg::default());
    high.begin(0.0);
    low.begin(0.0);
    for i in 0..8 {
        let now = i as f64;
        let out = output(level, false, now);
        let sh = high.classify(&out, Sensitivity::High, now).stage;
        let sl = low.classify(&out, Sensitivity::Low, now).stage;
        assert!(sh >= sl, "high {sh:?} < low {sl:?} at tick {i}");
    }
}

#[test]
fn repeated_stable_stream_is_idempotent() {
    let run = || {
        let mut sc = StageClassifier::new(StageCfg::default());
        sc.begin(0.0);
        let mut last = FatigueStage::Active;
        for i in 0..10 {
            let now = i as f64;
            last = sc.classify(&output(0.55, false, now), Sensitivity::Medium, now).stage;
        }
        last
    };
    assert_eq!(run(), run());
}
