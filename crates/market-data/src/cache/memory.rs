//! In-process cache backend using moka.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use crate::errors::MarketDataError;

use super::backend::CacheBackend;

#[derive(Clone, Debug)]
struct CachedValue {
    payload: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryExpiry;

impl Expiry<String, CachedValue> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    // An overwrite restarts the clock with the new TTL
    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded in-memory backend, the default when no Redis URL is configured.
pub struct MemoryCacheBackend {
    cache: Cache<String, CachedValue>,
}

impl MemoryCacheBackend {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryExpiry)
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, MarketDataError> {
        Ok(self.cache.get(key).await.map(|v| v.payload))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), MarketDataError> {
        self.cache
            .insert(
                key.to_string(),
                CachedValue {
                    payload: value,
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MarketDataError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<usize, MarketDataError> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_ref().clone())
            .collect();

        for key in &keys {
            self.cache.invalidate(key).await;
        }
        Ok(keys.len())
    }

    async fn ping(&self) -> Result<(), MarketDataError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = MemoryCacheBackend::default();
        backend
            .set("tl:quote:aapl", "{}".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            backend.get("tl:quote:aapl").await.unwrap().as_deref(),
            Some("{}")
        );

        backend.delete("tl:quote:aapl").await.unwrap();
        assert!(backend.get("tl:quote:aapl").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_expire_individually() {
        let backend = MemoryCacheBackend::default();
        backend
            .set("short", "1".to_string(), Duration::from_millis(50))
            .await
            .unwrap();
        backend
            .set("long", "2".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(backend.get("short").await.unwrap().is_none());
        assert_eq!(backend.get("long").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_clear_by_prefix() {
        let backend = MemoryCacheBackend::default();
        let ttl = Duration::from_secs(60);
        backend.set("a:quote:x", "1".into(), ttl).await.unwrap();
        backend.set("a:search:y", "2".into(), ttl).await.unwrap();
        backend.set("b:quote:x", "3".into(), ttl).await.unwrap();

        let removed = backend.clear("a:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(backend.get("a:quote:x").await.unwrap().is_none());
        assert_eq!(backend.get("b:quote:x").await.unwrap().as_deref(), Some("3"));
    }
}
