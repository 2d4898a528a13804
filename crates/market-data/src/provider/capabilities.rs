//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how it should be rate-limited.

use std::time::Duration;

use crate::resolver::Region;

/// Describes the capabilities of a market data provider.
///
/// Used by the registry to decide which providers take part in a search
/// fan-out, which ones are asked for quotes, and which ones act as region
/// specialists.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider supports symbol/name search.
    pub supports_search: bool,

    /// Whether the provider returns latest quotes.
    pub supports_quotes: bool,

    /// Whether the provider supports historical series.
    pub supports_historical: bool,

    /// Whether the provider publishes valuation figures.
    pub supports_fundamentals: bool,

    /// Whether the provider can look instruments up by ISIN.
    pub supports_isin_search: bool,

    /// Regions where this provider is the preferred first stop.
    pub specialized_regions: &'static [Region],
}

impl ProviderCapabilities {
    pub fn specializes_in(&self, region: Region) -> bool {
        self.specialized_regions.contains(&region)
    }
}

/// Rate limiting configuration for a provider.
///
/// Counters are enforced locally before any request leaves the process.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Maximum requests allowed in any sliding one-minute window.
    pub requests_per_minute: u32,

    /// Maximum requests per UTC day, if the provider has a daily quota.
    pub daily_limit: Option<u32>,

    /// Timeout applied to each HTTP request.
    pub timeout: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            daily_limit: None,
            timeout: Duration::from_secs(10),
        }
    }
}
