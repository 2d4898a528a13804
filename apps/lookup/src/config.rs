use std::env;
use std::path::PathBuf;

use tickerlens_market_data::MarketDataConfig;

/// Process configuration read from `TL_*` environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub market_data: MarketDataConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = MarketDataConfig::default();
        let market_data = MarketDataConfig {
            namespace: env::var("TL_CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            cache_backend: env::var("TL_CACHE_URL").unwrap_or(defaults.cache_backend),
            cache_timeout_ms: parse_var("TL_CACHE_TIMEOUT_MS", defaults.cache_timeout_ms),
            enrich_limit: parse_var("TL_ENRICH_LIMIT", defaults.enrich_limit),
            enrich_delay_ms: parse_var("TL_ENRICH_DELAY_MS", defaults.enrich_delay_ms),
            search_limit: parse_var("TL_SEARCH_LIMIT", defaults.search_limit),
            fan_out_timeout_secs: parse_var("TL_FAN_OUT_TIMEOUT_SECS", defaults.fan_out_timeout_secs),
            live_lookup_command: optional_var("TL_LIVE_LOOKUP_CMD"),
            live_lookup_args: env::var("TL_LIVE_LOOKUP_ARGS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            live_lookup_timeout_secs: parse_var(
                "TL_LIVE_LOOKUP_TIMEOUT_SECS",
                defaults.live_lookup_timeout_secs,
            ),
            dataset_path: optional_var("TL_DATASET_PATH").map(PathBuf::from),
            dataset_refresh_secs: optional_var("TL_DATASET_REFRESH_SECS").and_then(|v| v.parse().ok()),
            yahoo_enabled: parse_var("TL_YAHOO_ENABLED", defaults.yahoo_enabled),
            finnhub_api_key: optional_var("TL_FINNHUB_API_KEY"),
            alpha_vantage_api_key: optional_var("TL_ALPHA_VANTAGE_API_KEY"),
            openfigi_enabled: parse_var("TL_OPENFIGI_ENABLED", defaults.openfigi_enabled),
            openfigi_api_key: optional_var("TL_OPENFIGI_API_KEY"),
            extra_tickers: defaults.extra_tickers,
        };

        Self { market_data }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match optional_var(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={}", name, raw);
            default
        }),
        None => default,
    }
}
