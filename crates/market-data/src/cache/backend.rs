use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;

/// Key-value store with per-entry expiry.
///
/// Values are opaque JSON strings; typing happens in [`super::CacheLayer`].
/// Errors are reported as `CacheUnavailable` and never escape the layer.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Backend name for logs ("memory", "redis").
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, MarketDataError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), MarketDataError>;

    async fn delete(&self, key: &str) -> Result<(), MarketDataError>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn clear(&self, prefix: &str) -> Result<usize, MarketDataError>;

    /// Round-trip to the store.
    async fn ping(&self) -> Result<(), MarketDataError>;
}
