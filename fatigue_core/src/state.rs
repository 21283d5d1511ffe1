//! System-wide state authority.
//!
//! A single mutex-guarded owner of the current `StateSnapshot` plus a
//! bounded insertion-ordered history. Transitions are validated against the
//! system state graph; the alcohol override suppresses fatigue transitions
//! while its detection record is fresh. Subscribers receive committed
//! snapshots on their own worker threads, in commit order, isolated from
//! each other and from the engine.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use fatigue_traits::clock::Clock;

use crate::error::FatigueError;
use crate::types::{StateSnapshot, SystemState};

/// Per-subscriber delivery queue depth. A subscriber that falls this far
/// behind starts losing notifications instead of blocking commits.
const SUBSCRIBER_QUEUE: usize = 64;

/// Validated transition graph. The self-edge is admissible everywhere it
/// appears and is used for message updates without a level change.
pub fn transition_admissible(from: SystemState, to: SystemState) -> bool {
    use SystemState::*;
    match from {
        Scanning | IntruderDetected => matches!(
            to,
            Scanning | IntruderDetected | MonitoringActive | AlcoholDetected | SystemError
                | SystemCrashed
        ),
        MonitoringActive => true,
        AlertMild | AlertModerate | AlertSevere => !matches!(to, IntruderDetected),
        AlcoholDetected => matches!(to, AlcoholDetected | SystemError | SystemCrashed),
        SystemError => matches!(
            to,
            Scanning | MonitoringActive | AlcoholDetected | SystemError | SystemCrashed
        ),
        SystemCrashed => matches!(to, SystemCrashed),
    }
}

struct Inner {
    current: StateSnapshot,
    history: VecDeque<StateSnapshot>,
    /// Timestamp of the most recent alcohol detection, engine timebase.
    last_alcohol_s: Option<f64>,
}

struct SubscriberWorker {
    tx: xch::Sender<StateSnapshot>,
    handle: Option<std::thread::JoinHandle<()>>,
}

pub struct StateManager {
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<SubscriberWorker>>,
    history_limit: usize,
    alcohol_window_s: f64,
    /// Per-worker drain budget on shutdown before the thread is abandoned.
    join_timeout: Duration,
    /// Callback panics and dropped notifications, shared with the workers.
    subscriber_failures: Arc<AtomicU64>,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("state", &self.current().state)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

impl StateManager {
    pub fn new(
        history_limit: usize,
        alcohol_window_s: f64,
        clock: Arc<dyn Clock + Send + Sync>,
        epoch: Instant,
    ) -> Self {
        let initial = StateSnapshot {
            state: SystemState::Scanning,
            message: "state manager initialized".to_string(),
            timestamp_s: clock.secs_since(epoch),
            pilot_id: None,
            service: "state_manager".to_string(),
            data: serde_json::Map::new(),
        };
        let mut history = VecDeque::with_capacity(history_limit.max(1).min(4096));
        history.push_back(initial.clone());
        Self {
            inner: Mutex::new(Inner {
                current: initial,
                history,
                last_alcohol_s: None,
            }),
            subscribers: Mutex::new(Vec::new()),
            history_limit: history_limit.max(1),
            alcohol_window_s,
            join_timeout: Duration::from_secs(2),
            subscriber_failures: Arc::new(AtomicU64::new(0)),
            clock,
            epoch,
        }
    }

    /// Override the per-worker drain budget applied at shutdown.
    pub fn subscriber_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Seconds since the engine epoch, from the shared monotonic clock.
    pub fn now_s(&self) -> f64 {
        self.clock.secs_since(self.epoch)
    }

    // A poisoned mutex means a panic escaped mid-operation; the snapshot data
    // itself is plain values, so recover the guard and keep serving.
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::error!("state mutex poisoned; recovering last committed snapshot");
                poisoned.into_inner()
            }
        }
    }

    /// Non-blocking consistent read of the current snapshot.
    pub fn current(&self) -> StateSnapshot {
        self.lock_inner().current.clone()
    }

    /// Up to `limit` snapshots, newest first.
    pub fn history(&self, limit: usize) -> Vec<StateSnapshot> {
        let inner = self.lock_inner();
        inner.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.lock_inner().history.len()
    }

    /// True while the most recent alcohol detection is inside the override
    /// window.
    pub fn alcohol_override_active(&self) -> bool {
        let now = self.now_s();
        self.lock_inner()
            .last_alcohol_s
            .is_some_and(|t| fatigue_traits::is_fresh(now, t, self.alcohol_window_s))
    }

    pub fn subscriber_failure_count(&self) -> u64 {
        self.subscriber_failures.load(Ordering::Relaxed)
    }

    /// Register a change callback on its own worker thread. Notifications
    /// arrive in commit order; a panicking callback is isolated and counted.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&StateSnapshot) + Send + 'static,
    {
        let (tx, rx) = xch::bounded::<StateSnapshot>(SUBSCRIBER_QUEUE);
        let failures_worker = self.subscriber_failures.clone();
        let handle = std::thread::spawn(move || {
            while let Ok(snapshot) = rx.recv() {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&snapshot)));
                if result.is_err() {
                    failures_worker.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        state = %snapshot.state,
                        "subscriber failure: callback panicked; continuing"
                    );
                }
            }
            tracing::trace!("subscriber worker exiting");
        });
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(SubscriberWorker {
                tx,
                handle: Some(handle),
            }),
            Err(poisoned) => poisoned.into_inner().push(SubscriberWorker {
                tx,
                handle: Some(handle),
            }),
        }
    }

    /// Record an alcohol detection. A fresh record forces ALCOHOL_DETECTED
    /// (unless the system has already crashed) and arms the override that
    /// suppresses fatigue transitions until the record ages out.
    ///
    /// Returns the forced snapshot when a transition was committed.
    pub fn note_alcohol_event(
        &self,
        detection_ts_s: f64,
        service: &str,
    ) -> Option<StateSnapshot> {
        let now = self.now_s();
        if !fatigue_traits::is_fresh(now, detection_ts_s, self.alcohol_window_s) {
            tracing::debug!(age_s = now - detection_ts_s, "ignoring stale alcohol record");
            return None;
        }
        let mut inner = self.lock_inner();
        inner.last_alcohol_s = Some(detection_ts_s);
        if matches!(
            inner.current.state,
            SystemState::AlcoholDetected | SystemState::SystemCrashed
        ) {
            return None;
        }
        let from = inner.current.state;
        let snapshot = StateSnapshot {
            state: SystemState::AlcoholDetected,
            message: "alcohol detected; monitoring overridden".to_string(),
            timestamp_s: now,
            pilot_id: inner.current.pilot_id.clone(),
            service: service.to_string(),
            data: serde_json::Map::new(),
        };
        Self::commit(&mut inner, self.history_limit, snapshot.clone());
        tracing::warn!(from = %from, "alcohol override engaged");
        self.notify(&snapshot);
        Some(snapshot)
    }

    /// Validated transition. Rejections return `IllegalTransition` with no
    /// side effects; an identical state+message is an idempotent no-op.
    pub fn set_state(
        &self,
        state: SystemState,
        message: impl Into<String>,
        service: impl Into<String>,
        pilot_id: Option<String>,
        data: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<StateSnapshot, FatigueError> {
        let message = message.into();
        let now = self.now_s();
        let mut inner = self.lock_inner();
        let from = inner.current.state;

        if state == from && message == inner.current.message {
            // Idempotent repeat; no history duplicate.
            return Ok(inner.current.clone());
        }

        let override_active = inner
            .last_alcohol_s
            .is_some_and(|t| fatigue_traits::is_fresh(now, t, self.alcohol_window_s));

        if override_active
            && !matches!(
                state,
                SystemState::AlcoholDetected | SystemState::SystemError | SystemState::SystemCrashed
            )
        {
            tracing::debug!(to = %state, "transition suppressed by alcohol override");
            return Err(FatigueError::IllegalTransition { from, to: state });
        }

        // Once the override window lapses the only way off AlcoholDetected is
        // back through scanning or monitoring; the graph itself has no such
        // edge, so release is handled here. Requires a recorded detection,
        // i.e. the state was actually reached through the override.
        let override_release = from == SystemState::AlcoholDetected
            && inner.last_alcohol_s.is_some()
            && !override_active
            && matches!(state, SystemState::Scanning | SystemState::MonitoringActive);

        if !transition_admissible(from, state) && !override_release {
            tracing::warn!(from = %from, to = %state, "illegal transition rejected");
            return Err(FatigueError::IllegalTransition { from, to: state });
        }

        let snapshot = StateSnapshot {
            state,
            message,
            timestamp_s: now,
            pilot_id,
            service: service.into(),
            data: data.unwrap_or_default(),
        };
        Self::commit(&mut inner, self.history_limit, snapshot.clone());
        // Enqueue while still holding the state lock so subscribers observe
        // commits in commit order; invocation happens on the worker threads.
        self.notify(&snapshot);
        drop(inner);
        tracing::info!(from = %from, to = %state, "state committed");
        Ok(snapshot)
    }

    fn commit(inner: &mut Inner, limit: usize, snapshot: StateSnapshot) {
        inner.current = snapshot.clone();
        inner.history.push_back(snapshot);
        while inner.history.len() > limit {
            inner.history.pop_front();
        }
    }

    /// Enqueue a committed snapshot to every subscriber. Invocation happens
    /// on the worker threads; a full queue drops the notification for that
    /// subscriber rather than blocking the commit path.
    fn notify(&self, snapshot: &StateSnapshot) {
        let subs = match self.subscribers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        for worker in subs.iter() {
            if let Err(xch::TrySendError::Full(_)) = worker.tx.try_send(snapshot.clone()) {
                self.subscriber_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("subscriber lagging; notification dropped");
            }
        }
    }
}

impl Drop for StateManager {
    fn drop(&mut self) {
        let mut subs = match self.subscribers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        for mut worker in subs.drain(..) {
            // Disconnect the channel so the worker drains and exits.
            drop(worker.tx);
            if let Some(handle) = worker.handle.take() {
                let deadline = Instant::now() + self.join_timeout;
                while !handle.is_finished() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(10));
                }
                if handle.is_finished() {
                    if handle.join().is_err() {
                        tracing::warn!("subscriber worker panicked during shutdown");
                    }
                } else {
                    // Stuck callback: abandon the worker rather than hang.
                    tracing::warn!("subscriber worker still busy at shutdown; abandoning");
                }
            }
        }
    }
}
