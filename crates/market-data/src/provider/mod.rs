//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all source adapters implement
//! - The `IdentifierMapper` trait for ISIN mapping services
//! - Provider capabilities and rate limiting configuration
//! - Concrete implementations (Yahoo, Finnhub, Alpha Vantage, OpenFIGI)
//!
//! # Architecture
//!
//! Providers receive canonical symbols and encode them into their own
//! grammar through the resolver module. Results come back canonical, so the
//! registry can merge reports from several providers by symbol.
//!
//! Each provider owns a `RateLimiter` and consults it before any network
//! call; an exhausted budget surfaces as `RateLimitExceeded`.

mod capabilities;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;
pub mod openfigi;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::{IdentifierMapper, ListingCandidate, MarketDataProvider};

use crate::resolver::{mic_to_currency, mic_to_exchange_name, CanonicalSymbol};

/// Exchange name and currency for a listing.
///
/// Listings without a MIC are treated as US listings.
pub(crate) fn describe_listing(symbol: &CanonicalSymbol) -> (String, Option<String>) {
    match symbol.mic.as_deref() {
        Some(mic) => (
            mic_to_exchange_name(mic).unwrap_or(mic).to_string(),
            mic_to_currency(mic).map(str::to_string),
        ),
        None => ("US".to_string(), Some("USD".to_string())),
    }
}
