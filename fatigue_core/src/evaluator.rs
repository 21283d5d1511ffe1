//! The evaluation thread: store-driven wake-ups, capped tick rate, and the
//! VFE -> BFE -> fusion -> classifier -> state pipeline.
//!
//! Recoverable input problems (stale, invalid, out-of-order samples) skip
//! the affected modality and increment a counter; a store outage backs off
//! exponentially while the state manager keeps serving the last committed
//! snapshot; a continuous stretch without any valid sample exhausts the
//! failure budget and drives the system to SYSTEM_ERROR.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use fatigue_traits::{Clock, Store};
use serde::Serialize;

use crate::biometric::{BioScore, hr_score};
use crate::classifier::StageClassifier;
use crate::config::{EvaluatorCfg, FreshnessCfg};
use crate::error::FatigueError;
use crate::fusion::FusionCore;
use crate::ingress::{Ingress, decode, keys};
use crate::state::StateManager;
use crate::types::{
    BioSample, FatigueStage, FusionOutput, PilotProfile, SensorMessage, StateSnapshot,
    SystemState, VisionSample,
};
use crate::util::period_us;
use crate::vision::{VisionScore, vision_score};

const SERVICE: &str = "fusion_engine";

/// Counters exposed for diagnostics and the CLI `--stats` view.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EvalStats {
    pub ticks: u64,
    pub fusions: u64,
    pub stale_samples: u64,
    pub invalid_samples: u64,
    pub dropped_out_of_order: u64,
    pub illegal_transitions: u64,
    pub stage_changes: u64,
    pub store_failures: u64,
}

pub struct Evaluator<S: Store> {
    store: S,
    state: Arc<StateManager>,
    fusion: FusionCore,
    classifier: StageClassifier,
    ingress: Ingress,
    freshness: FreshnessCfg,
    cfg: EvaluatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,

    latest_vision: Option<VisionSample>,
    latest_bio: Option<BioSample>,
    profile: Option<PilotProfile>,
    monitoring_started: bool,
    last_valid_sample_s: f64,
    backoff_s: f64,
    stats: EvalStats,
    watch_rx: Option<crossbeam_channel::Receiver<String>>,
}

impl<S: Store> Evaluator<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: S,
        state: Arc<StateManager>,
        fusion: FusionCore,
        classifier: StageClassifier,
        freshness: FreshnessCfg,
        cfg: EvaluatorCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        epoch: Instant,
    ) -> Self {
        let backoff_s = cfg.backoff_initial_s;
        Self {
            store,
            state,
            fusion,
            classifier,
            ingress: Ingress::new(),
            freshness,
            cfg,
            clock,
            epoch,
            latest_vision: None,
            latest_bio: None,
            profile: None,
            monitoring_started: false,
            last_valid_sample_s: 0.0,
            backoff_s,
            stats: EvalStats::default(),
            watch_rx: None,
        }
    }

    fn now_s(&self) -> f64 {
        self.clock.secs_since(self.epoch)
    }

    pub fn stats(&self) -> EvalStats {
        let mut s = self.stats;
        s.dropped_out_of_order = self.ingress.dropped_out_of_order;
        s
    }

    /// Register the store watch and reset per-session smoothing state.
    /// Must be called before `step`/`run`.
    pub fn connect(&mut self) -> crate::error::Result<()> {
        let rx = self
            .store
            .watch(&[keys::VISION, keys::HR, keys::ALCOHOL, keys::PILOT_PREFIX])
            .map_err(|e| FatigueError::StoreUnavailable(e.to_string()))?;
        self.watch_rx = Some(rx);
        let now = self.now_s();
        self.fusion.begin();
        self.classifier.begin(now);
        self.last_valid_sample_s = now;
        tracing::info!(tick_hz = self.cfg.tick_hz, "evaluator connected");
        Ok(())
    }

    /// Fold all pending change notifications, then evaluate once.
    /// Drives one deterministic iteration; `run` adds real-time pacing.
    pub fn step(&mut self) {
        if let Some(rx) = self.watch_rx.clone() {
            while let Ok(key) = rx.try_recv() {
                self.fold_key(&key);
            }
        }
        self.tick();
    }

    /// Run until the shutdown flag is raised: wake on new published data or
    /// at the tick cap, whichever comes first. The current tick is always
    /// drained before exit.
    pub fn run(&mut self, shutdown: &AtomicBool) -> crate::error::Result<EvalStats> {
        if self.watch_rx.is_none() {
            self.connect()?;
        }
        let rx = match self.watch_rx.clone() {
            Some(rx) => rx,
            None => {
                return Err(
                    FatigueError::StoreUnavailable("watch not connected".to_string()).into(),
                );
            }
        };
        let period = Duration::from_micros(period_us(self.cfg.tick_hz));
        tracing::info!(tick_hz = self.cfg.tick_hz, "evaluation loop started");

        let mut next_tick = self.clock.now() + period;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("shutdown requested; draining current tick");
                self.step();
                break;
            }

            let wait = next_tick.saturating_duration_since(self.clock.now());
            match rx.recv_timeout(wait) {
                Ok(key) => self.fold_key(&key),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FatigueError::StoreUnavailable(
                        "watch channel disconnected".to_string(),
                    )
                    .into());
                }
            }
            // Fold any further pending notifications before evaluating.
            while let Ok(key) = rx.try_recv() {
                self.fold_key(&key);
            }

            if self.clock.now() >= next_tick {
                self.tick();
                next_tick = self.clock.now() + period;
            }
        }

        tracing::info!(stats = ?self.stats, "evaluation loop stopped");
        Ok(self.stats())
    }

    /// Fetch and fold one changed record into the latest-sample slots.
    fn fold_key(&mut self, key: &str) {
        match self.store.get(key) {
            Ok(Some(value)) => {
                self.backoff_s = self.cfg.backoff_initial_s;
                match decode(key, &value) {
                    Ok(Some(msg)) => {
                        if let Some(msg) = self.ingress.admit(msg) {
                            self.apply(msg);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.stats.invalid_samples += 1;
                        tracing::warn!(key, error = %e, "dropping undecodable record");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => self.store_failure(&e.to_string()),
        }
    }

    fn apply(&mut self, msg: SensorMessage) {
        match msg {
            SensorMessage::Vision(sample) => self.latest_vision = Some(sample),
            SensorMessage::Bio(sample) => self.latest_bio = Some(sample),
            SensorMessage::Alcohol(event) => {
                if let Some(snapshot) = self.state.note_alcohol_event(event.timestamp_s, SERVICE)
                {
                    self.publish_state(&snapshot);
                }
            }
            SensorMessage::Pilot(profile) => {
                if profile.active {
                    tracing::info!(pilot = %profile.id, "pilot profile activated");
                    self.profile = Some(profile);
                } else if self.profile.as_ref().is_some_and(|p| p.id == profile.id) {
                    tracing::info!(pilot = %profile.id, "pilot profile deactivated");
                    self.profile = None;
                }
            }
        }
    }

    /// One evaluation pass over the freshest admitted samples.
    fn tick(&mut self) {
        let now = self.now_s();
        self.stats.ticks += 1;

        // Clear the alcohol override once its window has lapsed. Fatigue
        // tracking restarts from a clean window: evidence accumulated while
        // transitions were suppressed must not drive the first decisions
        // after release.
        if self.monitoring_started
            && self.state.current().state == SystemState::AlcoholDetected
            && !self.state.alcohol_override_active()
        {
            match self.state.set_state(
                SystemState::MonitoringActive,
                "alcohol override cleared",
                SERVICE,
                self.pilot_id(),
                None,
            ) {
                Ok(snapshot) => {
                    self.classifier.begin(now);
                    self.publish_state(&snapshot);
                }
                Err(_) => self.stats.illegal_transitions += 1,
            }
        }

        let mut drop_vision = false;
        let vision_scored: Option<VisionScore> = match &self.latest_vision {
            Some(sample) => match sample.validate(now, self.freshness.vision_max_age_s) {
                Ok(()) => Some(vision_score(sample)),
                Err(FatigueError::StaleSample { age_s, .. }) => {
                    self.stats.stale_samples += 1;
                    tracing::trace!(age_s, "vision sample stale; modality skipped");
                    None
                }
                Err(e) => {
                    self.stats.invalid_samples += 1;
                    tracing::warn!(error = %e, "vision sample rejected");
                    drop_vision = true;
                    None
                }
            },
            None => None,
        };
        if drop_vision {
            self.latest_vision = None;
        }

        let mut drop_bio = false;
        let bio_scored: Option<BioScore> = match &self.latest_bio {
            Some(sample) => match sample.validate(now, self.freshness.bio_max_age_s) {
                Ok(()) => Some(hr_score(sample, self.profile.as_ref())),
                Err(FatigueError::StaleSample { age_s, .. }) => {
                    self.stats.stale_samples += 1;
                    tracing::trace!(age_s, "bio sample stale; modality skipped");
                    None
                }
                Err(e) => {
                    self.stats.invalid_samples += 1;
                    tracing::warn!(error = %e, "bio sample rejected");
                    drop_bio = true;
                    None
                }
            },
            None => None,
        };
        if drop_bio {
            self.latest_bio = None;
        }

        let vision_input = match (&self.latest_vision, &vision_scored) {
            (Some(sample), Some(score)) => Some((sample, score)),
            _ => None,
        };
        let bio_input = match (&self.latest_bio, &bio_scored) {
            (Some(sample), Some(score)) => Some((sample, score)),
            _ => None,
        };

        match self.fusion.fuse(now, vision_input, bio_input) {
            Ok(out) => {
                self.stats.fusions += 1;
                self.last_valid_sample_s = now;
                self.publish_fusion(&out);
                self.drive_stage(&out, now);
            }
            Err(FatigueError::InsufficientModalities) => {
                // Nothing fresh to fuse; not a fault by itself.
            }
            Err(e) => tracing::warn!(error = %e, "fusion failed"),
        }

        // Failure budget: sustained silence is a system-level fault.
        if now - self.last_valid_sample_s >= self.cfg.failure_budget_s {
            let current = self.state.current().state;
            if !matches!(
                current,
                SystemState::SystemError | SystemState::SystemCrashed
            ) {
                tracing::error!(
                    budget_s = self.cfg.failure_budget_s,
                    "failure budget exhausted without valid samples"
                );
                match self.state.set_state(
                    SystemState::SystemError,
                    "no valid samples within failure budget",
                    SERVICE,
                    self.pilot_id(),
                    None,
                ) {
                    Ok(snapshot) => self.publish_state(&snapshot),
                    Err(_) => self.stats.illegal_transitions += 1,
                }
            }
        }
    }

    fn drive_stage(&mut self, out: &FusionOutput, now: f64) {
        // The classifier is silent until monitoring is active: SCANNING is
        // never a precursor for fatigue states.
        if !self.monitoring_started {
            match self.state.set_state(
                SystemState::MonitoringActive,
                "pilot monitoring active",
                SERVICE,
                self.pilot_id(),
                None,
            ) {
                Ok(snapshot) => {
                    self.monitoring_started = true;
                    self.classifier.begin(now);
                    self.publish_state(&snapshot);
                }
                Err(_) => {
                    // Alcohol override or error state; try again next tick.
                    self.stats.illegal_transitions += 1;
                    return;
                }
            }
        }

        // While the override holds, fatigue transitions are suppressed
        // outright: the classifier must not accumulate window content or
        // advance its timers on evidence the state authority will refuse.
        if self.state.alcohol_override_active() {
            return;
        }

        let sensitivity = self
            .profile
            .as_ref()
            .and_then(|p| p.sensitivity)
            .unwrap_or_default();
        let decision = self.classifier.classify(out, sensitivity, now);
        if !decision.changed {
            return;
        }
        match self.state.set_state(
            decision.stage.into(),
            format!("fatigue stage {}", decision.stage),
            SERVICE,
            self.pilot_id(),
            None,
        ) {
            Ok(snapshot) => {
                self.stats.stage_changes += 1;
                self.publish_alert(out, decision.stage, decision.previous, now);
                self.publish_state(&snapshot);
            }
            Err(e) => {
                self.stats.illegal_transitions += 1;
                tracing::debug!(error = %e, "stage transition not committed");
                // Roll the classifier back to the committed stage so its
                // internal state stays in lockstep with the authority.
                self.classifier.resync(decision.previous, now);
            }
        }
    }

    fn pilot_id(&self) -> Option<String> {
        self.profile.as_ref().map(|p| p.id.clone())
    }

    fn publish_fusion(&mut self, out: &FusionOutput) {
        match serde_json::to_value(out) {
            Ok(mut value) => {
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("service".to_string(), SERVICE.into());
                }
                if let Err(e) = self.store.put(keys::FUSION, value) {
                    self.store_failure(&e.to_string());
                }
            }
            Err(e) => tracing::error!(error = %e, "fusion output serialization failed"),
        }
    }

    fn publish_alert(
        &mut self,
        out: &FusionOutput,
        stage: FatigueStage,
        previous: FatigueStage,
        now: f64,
    ) {
        let payload = serde_json::json!({
            "stage": stage,
            "previous": previous,
            "fusion_score": out.fusion_score,
            "confidence": out.confidence,
            "is_critical_event": out.is_critical_event,
            "pilot_id": self.pilot_id(),
            "timestamp_s": now,
            "service": SERVICE,
        });
        if let Err(e) = self.store.put(keys::FATIGUE_ALERT, payload) {
            self.store_failure(&e.to_string());
        }
    }

    fn publish_state(&mut self, snapshot: &StateSnapshot) {
        match serde_json::to_value(snapshot) {
            Ok(value) => {
                if let Err(e) = self.store.put_persistent(keys::STATE_CURRENT, value) {
                    self.store_failure(&e.to_string());
                }
            }
            Err(e) => tracing::error!(error = %e, "snapshot serialization failed"),
        }
    }

    /// Exponential backoff on store trouble, capped; the engine keeps its
    /// last committed view and retries.
    fn store_failure(&mut self, error: &str) {
        self.stats.store_failures += 1;
        tracing::warn!(error, backoff_s = self.backoff_s, "store unavailable; backing off");
        self.clock.sleep(Duration::from_secs_f64(self.backoff_s));
        self.backoff_s = (self.backoff_s * 2.0).min(self.cfg.backoff_cap_s);
    }
}
