//! The `monitor` command: wire the store, state manager, and evaluator
//! together and run until shutdown.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use fatigue_bus::MemoryStore;
use fatigue_config::Config;
use fatigue_core::classifier::StageClassifier;
use fatigue_core::config::{EvaluatorCfg, FreshnessCfg, FusionCfg, StageCfg};
use fatigue_core::evaluator::Evaluator;
use fatigue_core::fusion::FusionCore;
use fatigue_core::state::StateManager;
use fatigue_traits::{Clock, MonotonicClock};

/// Map the TOML schema onto the engine's runtime configuration structs.
pub fn core_configs(cfg: &Config) -> (FusionCfg, StageCfg, FreshnessCfg, EvaluatorCfg) {
    let fusion = FusionCfg {
        window_size: cfg.fusion.window_size,
        trend_window_size: cfg.fusion.trend_window_size,
        ema_weights: cfg.fusion.ema_weights.clone(),
        ..FusionCfg::default()
    };
    let stages = StageCfg {
        mild: cfg.stages.mild,
        moderate: cfg.stages.moderate,
        severe: cfg.stages.severe,
        hysteresis: cfg.stages.hysteresis,
        min_stage_duration_s: cfg.stages.min_stage_duration_s,
        max_critical_alert_rate_s: cfg.stages.max_critical_alert_rate_s,
        sensitivity_high: cfg.sensitivity.high,
        sensitivity_medium: cfg.sensitivity.medium,
        sensitivity_low: cfg.sensitivity.low,
    };
    let freshness = FreshnessCfg {
        vision_max_age_s: cfg.freshness.vision_max_age_s,
        bio_max_age_s: cfg.freshness.bio_max_age_s,
        alcohol_override_window_s: cfg.freshness.alcohol_override_window_s,
    };
    let evaluator = EvaluatorCfg {
        tick_hz: cfg.evaluator.tick_hz,
        failure_budget_s: cfg.evaluator.failure_budget_s,
        ..EvaluatorCfg::default()
    };
    (fusion, stages, freshness, evaluator)
}

pub fn run_monitor(
    cfg: &Config,
    shutdown: Arc<AtomicBool>,
    duration_s: Option<u64>,
    stats: bool,
) -> eyre::Result<()> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
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
        tracing::info!(
            state = %snapshot.state,
            message = %snapshot.message,
            service = %snapshot.service,
            "state change"
        );
    });

    let (fusion_cfg, stage_cfg, freshness, eval_cfg) = core_configs(cfg);
    let mut evaluator = Evaluator::new(
        store,
        state,
        FusionCore::new(fusion_cfg),
        StageClassifier::new(stage_cfg),
        freshness,
        eval_cfg,
        clock,
        epoch,
    );

    if let Some(secs) = duration_s {
        let flag = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });
    }

    let final_stats = evaluator.run(&shutdown)?;
    if stats {
        println!("{}", serde_json::to_string_pretty(&final_stats)?);
    }
    Ok(())
}
