//! Test and helper mocks for fatigue_core

use fatigue_traits::Store;

/// A store that always errors; useful for exercising the backoff path and
/// for constructing an evaluator whose inputs are injected directly.
pub struct NoopStore;

impl Store for NoopStore {
    fn put(
        &self,
        _key: &str,
        _value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop store")))
    }

    fn put_persistent(
        &self,
        _key: &str,
        _value: serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop store")))
    }

    fn get(
        &self,
        _key: &str,
    ) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop store")))
    }

    fn watch(
        &self,
        _keys: &[&str],
    ) -> Result<crossbeam_channel::Receiver<String>, Box<dyn std::error::Error + Send + Sync>>
    {
        Err(Box::new(std::io::Error::other("noop store")))
    }
}
