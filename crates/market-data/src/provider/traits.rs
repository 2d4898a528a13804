//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that every
//! source adapter implements, and the `IdentifierMapper` trait for
//! identifier mapping services.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Fundamentals, HistoricalSeries, HistoryPeriod, Quote, SearchResult};
use crate::resolver::CanonicalSymbol;

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// The registry uses the provider's capabilities and priority to decide
/// when and how to call it.
///
/// Every operation must consult the provider's own rate limiter before
/// touching the network and must hand back canonical symbols.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use tickerlens_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             supports_search: true,
///             supports_quotes: true,
///             supports_historical: false,
///             supports_fundamentals: false,
///             supports_isin_search: false,
///             specialized_regions: &[],
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     // ... implement get_quote
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "ALPHA_VANTAGE", etc.
    /// Used for logging, provenance and diagnostics.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    /// The registry uses this to order providers and to decide which
    /// report wins when two providers describe the same symbol.
    fn priority(&self) -> u8 {
        10
    }

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit;

    /// Search for instruments matching a symbol or name.
    ///
    /// Default implementation returns `NotSupported`.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let _ = query;
        Err(MarketDataError::NotSupported {
            operation: "search".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch the latest quote for a listing.
    async fn get_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError>;

    /// Fetch daily (or intraday, for short periods) bars.
    ///
    /// Default implementation returns `NotSupported`.
    async fn get_historical_data(
        &self,
        symbol: &CanonicalSymbol,
        period: HistoryPeriod,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let _ = (symbol, period);
        Err(MarketDataError::NotSupported {
            operation: "history".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Look up listings of an ISIN.
    ///
    /// Default implementation returns `NotSupported`.
    async fn search_by_isin(&self, isin: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let _ = isin;
        Err(MarketDataError::NotSupported {
            operation: "isin search".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch valuation figures for a listing.
    ///
    /// Default implementation returns `NotSupported`.
    async fn get_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::NotSupported {
            operation: "fundamentals".to_string(),
            provider: self.id().to_string(),
        })
    }
}

/// One listing of an instrument returned by an identifier mapping service.
#[derive(Clone, Debug, PartialEq)]
pub struct ListingCandidate {
    pub symbol: CanonicalSymbol,
    pub name: String,
    /// Instrument type as reported ("Common Stock", "ETP", ...)
    pub security_type: Option<String>,
    /// Raw exchange code as reported, kept for logging
    pub exchange_code: Option<String>,
}

/// A global security-identifier mapping service.
///
/// Unlike a provider, a mapper returns every listing of an instrument
/// across exchanges and carries no prices.
#[async_trait]
pub trait IdentifierMapper: Send + Sync {
    fn id(&self) -> &'static str;

    /// All listings of the ISIN, in the order the service returned them.
    async fn map_isin(&self, isin: &str) -> Result<Vec<ListingCandidate>, MarketDataError>;
}
