#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! In-memory reference implementation of the `fatigue_traits::Store`
//! contract: a keyed hash map with per-record TTL and change notifications.
//!
//! Stands in for any external pub/sub KV (Redis or similar) that honors the
//! same contract. Records written with `put` expire after the default TTL;
//! persistent records (pilot profiles, the state snapshot) never expire.
//! Watchers are notified after each write with the key name; a watcher that
//! falls behind loses notifications rather than blocking the writer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use fatigue_traits::{Clock, MonotonicClock, Store};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,
}

/// Queue depth per watcher before notifications are dropped.
const WATCHER_QUEUE: usize = 256;

struct Entry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

struct Watcher {
    /// Watched keys; a key ending in ':' matches as a prefix
    /// (e.g. "data:pilot:" matches every pilot profile record).
    keys: Vec<String>,
    tx: xch::Sender<String>,
}

impl Watcher {
    fn matches(&self, key: &str) -> bool {
        self.keys.iter().any(|w| {
            if w.ends_with(':') {
                key.starts_with(w.as_str())
            } else {
                key == w
            }
        })
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    watchers: Vec<Watcher>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock + Send + Sync>,
    default_ttl: Option<Duration>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryStore {
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self::with_clock(default_ttl, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        default_ttl: Option<Duration>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                watchers: Vec::new(),
            }),
            clock,
            default_ttl,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    fn write(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let expires_at = ttl.map(|d| self.clock.now() + d);
        let mut inner = self.lock()?;
        inner.entries.insert(key.to_string(), Entry { value, expires_at });
        // Notify after the write; drop-from lagging watchers, prune dead ones.
        inner.watchers.retain(|w| {
            if !w.matches(key) {
                return true;
            }
            match w.tx.try_send(key.to_string()) {
                Ok(()) => true,
                Err(xch::TrySendError::Full(_)) => {
                    tracing::warn!(key, "watcher lagging; notification dropped");
                    true
                }
                Err(xch::TrySendError::Disconnected(_)) => false,
            }
        });
        Ok(())
    }

    /// Number of live (unexpired) entries; test and diagnostics helper.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock().map_or(0, |inner| {
            inner
                .entries
                .values()
                .filter(|e| e.expires_at.is_none_or(|t| t > now))
                .count()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn put(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write(key, value, self.default_ttl)
    }

    fn put_persistent(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write(key, value, None)
    }

    fn get(
        &self,
        key: &str,
    ) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        match inner.entries.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|t| t <= now) => {
                inner.entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn watch(
        &self,
        keys: &[&str],
    ) -> Result<crossbeam_channel::Receiver<String>, Box<dyn std::error::Error + Send + Sync>>
    {
        let (tx, rx) = xch::bounded(WATCHER_QUEUE);
        let mut inner = self.lock()?;
        inner.watchers.push(Watcher {
            keys: keys.iter().map(|k| (*k).to_string()).collect(),
            tx,
        });
        Ok(rx)
    }

    fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }
}
