//! TTL cache in front of every provider call.
//!
//! Keys are `{namespace}:{operation}:{identifier}` with the identifier
//! trimmed and lower-cased. Values are JSON. The layer never fails a
//! lookup: a miss, an unreachable backend and an undecodable payload all
//! read as "nothing cached", and write failures are logged and dropped.

mod backend;
mod memory;
mod redis;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use self::backend::CacheBackend;
pub use self::memory::MemoryCacheBackend;
pub use self::redis::RedisCacheBackend;

/// Operation tier of a cache entry. Each tier has its own TTL.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CacheOperation {
    Search,
    Quote,
    Fundamentals,
    Details,
    History,
    Isin,
    Mapping,
    Live,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Quote => "quote",
            Self::Fundamentals => "fundamentals",
            Self::Details => "details",
            Self::History => "history",
            Self::Isin => "isin",
            Self::Mapping => "mapping",
            Self::Live => "live",
        }
    }

    /// Default time-to-live for the tier.
    pub fn default_ttl(&self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        const DAY: u64 = 24 * HOUR;

        Duration::from_secs(match self {
            Self::Search | Self::Quote => 5 * MINUTE,
            Self::Fundamentals | Self::Details | Self::History => HOUR,
            Self::Isin | Self::Live => DAY,
            Self::Mapping => 30 * DAY,
        })
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed, namespaced access to a [`CacheBackend`].
#[derive(Clone)]
pub struct CacheLayer {
    namespace: String,
    backend: Arc<dyn CacheBackend>,
    ttl_overrides: HashMap<CacheOperation, Duration>,
}

impl CacheLayer {
    pub fn new(namespace: impl Into<String>, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            namespace: namespace.into(),
            backend,
            ttl_overrides: HashMap::new(),
        }
    }

    /// In-memory layer, used by default and in tests.
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(namespace, Arc::new(MemoryCacheBackend::default()))
    }

    /// Replace the TTL of one tier.
    pub fn with_ttl(mut self, operation: CacheOperation, ttl: Duration) -> Self {
        self.ttl_overrides.insert(operation, ttl);
        self
    }

    pub fn ttl(&self, operation: CacheOperation) -> Duration {
        self.ttl_overrides
            .get(&operation)
            .copied()
            .unwrap_or_else(|| operation.default_ttl())
    }

    pub fn key(&self, operation: CacheOperation, identifier: &str) -> String {
        format!(
            "{}:{}:{}",
            self.namespace,
            operation,
            identifier.trim().to_lowercase()
        )
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: CacheOperation,
        identifier: &str,
    ) -> Option<T> {
        let key = self.key(operation, identifier);
        match self.backend.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache miss: {}", key);
                None
            }
            Err(e) => {
                warn!("Cache read failed for {} ({}): {}", key, self.backend.name(), e);
                None
            }
        }
    }

    /// Store a value. `ttl` overrides the tier TTL for this entry only.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        operation: CacheOperation,
        identifier: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        let key = self.key(operation, identifier);
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot encode cache entry {}: {}", key, e);
                return;
            }
        };
        let ttl = ttl.unwrap_or_else(|| self.ttl(operation));

        if let Err(e) = self.backend.set(&key, payload, ttl).await {
            warn!("Cache write failed for {} ({}): {}", key, self.backend.name(), e);
        }
    }

    pub async fn delete(&self, operation: CacheOperation, identifier: &str) {
        let key = self.key(operation, identifier);
        if let Err(e) = self.backend.delete(&key).await {
            warn!("Cache delete failed for {}: {}", key, e);
        }
    }

    /// Remove every entry of this namespace. Returns the number removed.
    pub async fn clear(&self) -> usize {
        let prefix = format!("{}:", self.namespace);
        match self.backend.clear(&prefix).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Cache clear failed for {}: {}", prefix, e);
                0
            }
        }
    }

    /// True when the backend answers.
    pub async fn health_check(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache backend {} unhealthy: {}", self.backend.name(), e);
                false
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
