#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Traits that define the time and data-bus abstractions used by the system.
//!
//! - `Store` models the keyed hash store with change notifications that the
//!   fusion engine is wired to (latest-sample records, pilot profiles, the
//!   authoritative state snapshot).
//! - `clock` offers a `MonotonicClock` for deterministic timing and a
//!   manually-advanced clock for tests and simulation.
//!
//! Other crates depend only on these traits, so the engine runs unchanged
//! against the in-memory reference store or any external pub/sub KV that
//! honors the same contract.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock, is_fresh};

use std::time::Duration;

/// Keyed hash store with change notifications.
///
/// Records are JSON values (numbers are IEEE-754 doubles, enumerations are
/// lowercase strings). `put` applies the store's default TTL; persistent
/// records (pilot profiles, the state snapshot) go through `put_persistent`.
/// `watch` returns a channel that yields the key name after each write to
/// one of the watched keys; a watched key ending in ':' matches as a prefix
/// (profile records are keyed per pilot). A watcher that falls behind loses
/// notifications rather than blocking the writer.
pub trait Store {
    fn put(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn put_persistent(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn get(
        &self,
        key: &str,
    ) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>>;

    fn watch(
        &self,
        keys: &[&str],
    ) -> Result<crossbeam_channel::Receiver<String>, Box<dyn std::error::Error + Send + Sync>>;

    /// Default record lifetime applied by `put`. Informational for adapters.
    fn default_ttl(&self) -> Option<Duration> {
        None
    }
}

// Allow boxed/shared trait objects to be used where a generic S: Store is expected.
impl<T: ?Sized + Store> Store for Box<T> {
    fn put(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).put(key, value)
    }
    fn put_persistent(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).put_persistent(key, value)
    }
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).get(key)
    }
    fn watch(
        &self,
        keys: &[&str],
    ) -> Result<crossbeam_channel::Receiver<String>, Box<dyn std::error::Error + Send + Sync>>
    {
        (**self).watch(keys)
    }
    fn default_ttl(&self) -> Option<Duration> {
        (**self).default_ttl()
    }
}

impl<T: ?Sized + Store> Store for std::sync::Arc<T> {
    fn put(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).put(key, value)
    }
    fn put_persistent(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).put_persistent(key, value)
    }
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).get(key)
    }
    fn watch(
        &self,
        keys: &[&str],
    ) -> Result<crossbeam_channel::Receiver<String>, Box<dyn std::error::Error + Send + Sync>>
    {
        (**self).watch(keys)
    }
    fn default_ttl(&self) -> Option<Duration> {
        (**self).default_ttl()
    }
}
