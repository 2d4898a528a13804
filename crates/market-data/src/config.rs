//! Engine configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`crate::MarketDataService`]. Every field has a default, so
/// an empty JSON object is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketDataConfig {
    /// Cache key namespace
    pub namespace: String,

    /// `memory`, or a `redis://` URL
    pub cache_backend: String,
    pub cache_timeout_ms: u64,

    /// Quote resolutions per search
    pub enrich_limit: usize,
    pub enrich_delay_ms: u64,

    pub search_limit: usize,
    pub fan_out_timeout_secs: u64,

    /// Program run for ISIN live lookups; disabled when absent
    pub live_lookup_command: Option<String>,
    pub live_lookup_args: Vec<String>,
    pub live_lookup_timeout_secs: u64,

    /// Local instrument snapshot; an empty dataset when absent
    pub dataset_path: Option<PathBuf>,
    pub dataset_refresh_secs: Option<u64>,

    pub yahoo_enabled: bool,
    pub finnhub_api_key: Option<String>,
    pub alpha_vantage_api_key: Option<String>,
    pub openfigi_enabled: bool,
    pub openfigi_api_key: Option<String>,

    /// Ticker → MIC pairs added to the built-in well-known tickers
    pub extra_tickers: HashMap<String, String>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            namespace: "tickerlens".to_string(),
            cache_backend: "memory".to_string(),
            cache_timeout_ms: 500,
            enrich_limit: 3,
            enrich_delay_ms: 100,
            search_limit: 20,
            fan_out_timeout_secs: 15,
            live_lookup_command: None,
            live_lookup_args: Vec::new(),
            live_lookup_timeout_secs: 20,
            dataset_path: None,
            dataset_refresh_secs: None,
            yahoo_enabled: true,
            finnhub_api_key: None,
            alpha_vantage_api_key: None,
            openfigi_enabled: true,
            openfigi_api_key: None,
            extra_tickers: HashMap::new(),
        }
    }
}

impl MarketDataConfig {
    /// Redis URL when the cache backend is not in-memory.
    pub fn redis_url(&self) -> Option<&str> {
        let backend = self.cache_backend.trim();
        (backend.starts_with("redis://") || backend.starts_with("rediss://")).then_some(backend)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn enrich_delay(&self) -> Duration {
        Duration::from_millis(self.enrich_delay_ms)
    }

    pub fn fan_out_timeout(&self) -> Duration {
        Duration::from_secs(self.fan_out_timeout_secs)
    }

    pub fn live_lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.live_lookup_timeout_secs)
    }

    pub fn dataset_refresh(&self) -> Option<Duration> {
        self.dataset_refresh_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
