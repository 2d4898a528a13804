//! Error types for the market data crate.
//!
//! Every failure inside the engine is a [`MarketDataError`] value. Adapters,
//! cache backends and lookup tiers return these values instead of panicking;
//! orchestrators record them as [`ProviderAttempt`]s and keep going. Only
//! [`MarketDataError::NotFound`] is meant to reach the caller as a genuine
//! negative result.

use std::fmt;

use thiserror::Error;

use crate::registry::ProviderAttempt;

/// Which local rate-limit counter rejected a call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LimitScope {
    /// The sliding one-minute window.
    Minute,
    /// The per-day budget.
    Daily,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minute => write!(f, "per-minute"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

/// Errors that can occur during market data operations.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// A provider-specific failure: non-2xx status, malformed payload,
    /// transport problem.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The upstream provider rejected the request with a quota response.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The adapter's own counters refused the call before any network I/O.
    #[error("Rate limit exceeded: {provider} ({scope} limit)")]
    RateLimitExceeded {
        /// The adapter whose budget is exhausted
        provider: String,
        /// Which counter is exhausted
        scope: LimitScope,
    },

    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol exists but has no data in the requested period.
    #[error("No data for date range")]
    NoDataForRange,

    /// The provider does not implement the operation.
    #[error("{operation} not supported by {provider}")]
    NotSupported {
        /// Operation name (search, isin search, fundamentals, ...)
        operation: String,
        /// The provider lacking support
        provider: String,
    },

    /// The symbol cannot be expressed in the provider's grammar.
    #[error("Resolution failed for provider {provider}: {symbol}")]
    ResolutionFailed {
        /// The provider that cannot encode the symbol
        provider: String,
        /// The canonical symbol
        symbol: String,
    },

    /// The cache backend is unreachable or returned garbage.
    /// Never propagated past the cache layer.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Every tier and adapter was tried and none produced data.
    #[error("No data found for '{query}': {}", summarize(.attempts))]
    NotFound {
        /// The query or identifier that was resolved
        query: String,
        /// One entry per tier/adapter tried, in order
        attempts: Vec<ProviderAttempt>,
    },

    /// The out-of-process live lookup failed or timed out.
    #[error("Live lookup failed: {0}")]
    LiveLookup(String),

    /// The local dataset snapshot could not be loaded.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// The query cannot be processed (empty, malformed identifier).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Shorthand for building a [`MarketDataError::ProviderError`].
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// True when the error came from the adapter's own counters.
    pub fn is_local_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }

    /// Attempts recorded on a `NotFound` error, empty otherwise.
    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            Self::NotFound { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

fn summarize(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no sources tried".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_error_display() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: INVALID");

        let error = MarketDataError::RateLimitExceeded {
            provider: "FINNHUB".to_string(),
            scope: LimitScope::Daily,
        };
        assert_eq!(
            format!("{}", error),
            "Rate limit exceeded: FINNHUB (daily limit)"
        );

        let error = MarketDataError::provider("ALPHA_VANTAGE", "API key invalid");
        assert_eq!(
            format!("{}", error),
            "Provider error: ALPHA_VANTAGE - API key invalid"
        );
    }

    #[test]
    fn test_not_found_lists_attempts() {
        let error = MarketDataError::NotFound {
            query: "XX0000000000".to_string(),
            attempts: vec![
                ProviderAttempt::failed(Cow::Borrowed("cache"), "miss"),
                ProviderAttempt::failed(Cow::Borrowed("YAHOO"), "Timeout: YAHOO"),
            ],
        };

        let text = error.to_string();
        assert!(text.contains("cache: ERROR (miss)"));
        assert!(text.contains("YAHOO: ERROR (Timeout: YAHOO)"));
        assert_eq!(error.attempts().len(), 2);
    }

    #[test]
    fn test_local_rate_limit_flag() {
        let local = MarketDataError::RateLimitExceeded {
            provider: "YAHOO".to_string(),
            scope: LimitScope::Minute,
        };
        let upstream = MarketDataError::RateLimited {
            provider: "YAHOO".to_string(),
        };
        assert!(local.is_local_rate_limit());
        assert!(!upstream.is_local_rate_limit());
    }
}
