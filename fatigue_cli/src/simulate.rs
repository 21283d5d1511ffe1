//! The `simulate` command: replay a scripted drowsiness scenario through
//! the real engine on a manually-advanced clock.
//!
//! Four phases: alert cruising, gradual onset, a microsleep burst, and
//! recovery. Stage alerts print to stdout as they are committed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fatigue_bus::MemoryStore;
use fatigue_config::Config;
use fatigue_core::classifier::StageClassifier;
use fatigue_core::evaluator::Evaluator;
use fatigue_core::fusion::FusionCore;
use fatigue_core::ingress::keys;
use fatigue_core::state::StateManager;
use fatigue_core::types::VisionSample;
use fatigue_traits::{Clock, ManualClock, Store};

use crate::monitor::core_configs;

/// Scripted vision sample for a scenario position in [0, 1).
fn scripted_sample(progress: f64, ts: f64) -> VisionSample {
    let (avg_ear, closure_s, microsleeps) = if progress < 0.3 {
        // cruising, eyes open
        (0.30, 0.0, 0)
    } else if progress < 0.6 {
        // gradual onset: lids drooping, closures lengthening
        let t = (progress - 0.3) / 0.3;
        (0.30 - 0.11 * t, 0.6 * t, 0)
    } else if progress < 0.8 {
        // microsleep burst
        (0.12, 1.3, 2)
    } else {
        // recovery
        (0.33, 0.0, 0)
    };
    VisionSample {
        avg_ear,
        mar: 0.15,
        eyes_closed: closure_s > 0.0,
        closure_duration_s: closure_s,
        microsleep_count: microsleeps,
        blink_rate_per_minute: 15.0,
        yawning: false,
        yawn_count: 0,
        yawn_duration_s: 0.0,
        timestamp_s: ts,
    }
}

pub fn run_simulation(
    cfg: &Config,
    ticks: u32,
    tick_s: f64,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    if ticks == 0 {
        eyre::bail!("ticks must be > 0");
    }
    if !tick_s.is_finite() || tick_s <= 0.0 {
        eyre::bail!("tick_s must be > 0");
    }

    let clock = Arc::new(ManualClock::new());
    let epoch = clock.now();
    let store = Arc::new(MemoryStore::with_clock(
        Some(Duration::from_secs(cfg.store.redis_ttl_s)),
        clock.clone(),
    ));
    let state = Arc::new(
        StateManager::new(
            cfg.state.history_limit,
            cfg.freshness.alcohol_override_window_s,
            clock.clone(),
            epoch,
        )
        .subscriber_timeout(Duration::from_secs_f64(cfg.evaluator.subscriber_timeout_s)),
    );
    state.subscribe(|snapshot| {
        println!(
            "[{:8.2}s] {} — {}",
            snapshot.timestamp_s, snapshot.state, snapshot.message
        );
    });

    let (fusion_cfg, stage_cfg, freshness, eval_cfg) = core_configs(cfg);
    let mut evaluator = Evaluator::new(
        store.clone(),
        state.clone(),
        FusionCore::new(fusion_cfg),
        StageClassifier::new(stage_cfg),
        freshness,
        eval_cfg,
        clock.clone(),
        epoch,
    );
    evaluator.connect()?;

    tracing::info!(ticks, tick_s, "simulation starting");
    for i in 0..ticks {
        if shutdown.load(Ordering::SeqCst) {
            tracing::info!("simulation interrupted");
            break;
        }
        let now = clock.secs_since(epoch);
        let progress = f64::from(i) / f64::from(ticks);
        let sample = scripted_sample(progress, now);
        store
            .put(keys::VISION, serde_json::to_value(&sample)?)
            .map_err(|e| eyre::eyre!("store put: {e}"))?;
        evaluator.step();
        clock.advance_secs(tick_s);
    }

    // Give the subscriber worker a moment to drain the final alerts.
    std::thread::sleep(Duration::from_millis(100));

    let stats = evaluator.stats();
    let final_state = state.current();
    println!(
        "simulation complete: final_state={} stage_changes={} fusions={}",
        final_state.state, stats.stage_changes, stats.fusions
    );
    Ok(())
}
