use criterion::{Criterion, black_box, criterion_group, criterion_main};

use fatigue_core::classifier::StageClassifier;
use fatigue_core::config::{FusionCfg, StageCfg};
use fatigue_core::fusion::FusionCore;
use fatigue_core::types::{BioSample, Sensitivity, VisionSample};
use fatigue_core::{hr_score, vision_score};

fn vision(avg_ear: f64, closure: f64) -> VisionSample {
    VisionSample {
        avg_ear,
        mar: 0.2,
        eyes_closed: closure > 0.0,
        closure_duration_s: closure,
        microsleep_count: 0,
        blink_rate_per_minute: 14.0,
        yawning: false,
        yawn_count: 1,
        yawn_duration_s: 0.0,
        timestamp_s: 0.0,
    }
}

fn bio() -> BioSample {
    BioSample {
        hr: 78.0,
        rr_interval_s: Some(0.77),
        rmssd_ms: Some(42.0),
        hr_trend_bpm_per_min: Some(1.2),
        baseline_deviation: Some(0.15),
        stress_index: Some(0.35),
        baseline_hr: 70.0,
        baseline_hrv: 55.0,
        timestamp_s: 0.0,
    }
}

fn bench_extract_and_fuse(c: &mut Criterion) {
    let v = vision(0.22, 0.4);
    let b = bio();
    c.bench_function("vision_score", |bench| {
        bench.iter(|| vision_score(black_box(&v)))
    });
    c.bench_function("hr_score", |bench| {
        bench.iter(|| hr_score(black_box(&b), None))
    });

    c.bench_function("fuse_and_classify_tick", |bench| {
        let mut fc = FusionCore::new(FusionCfg::default());
        let mut sc = StageClassifier::new(StageCfg::default());
        sc.begin(0.0);
        let vs = vision_score(&v);
        let bs = hr_score(&b, None);
        let mut now = 0.0f64;
        bench.iter(|| {
            now += 0.1;
            let out = fc
                .fuse(now, Some((&v, &vs)), Some((&b, &bs)))
                .unwrap();
            black_box(sc.classify(&out, Sensitivity::Medium, now))
        })
    });
}

criterion_group!(benches, bench_extract_and_fuse);
criterion_main!(benches);
