//! TickerLens Market Data Crate
//!
//! Resolves a ticker, company name or ISIN into normalized search results,
//! quotes, historical series and fundamentals by orchestrating several
//! independent, rate-limited data providers.
//!
//! # Architecture
//!
//! ```text
//!                     +--------------------+
//!   query  ---------> |  SearchController  |
//!                     +--------------------+
//!                       |        |        |
//!            LocalDataset   LiveLookup   aggregator
//!                                          |
//!                     +--------------------+--------------------+
//!                     |                                         |
//!              +-------------+                          +-------------+
//!              | SearchRouter|  region short-circuit    | IsinResolver|  cache -> mapper
//!              +-------------+  or fan-out + merge      +-------------+  -> providers
//!                     |                                         |
//!              +--------------+                                 |
//!              | QuoteEnricher| -> QuoteResolver <--------------+
//!              +--------------+
//!                     |
//!              +--------------------+       +------------+
//!              | MarketDataProvider | <---> | CacheLayer |
//!              | Yahoo / Finnhub /  |       +------------+
//!              | Alpha Vantage      |
//!              +--------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Query`] - Classified user input (ISIN, symbol, name)
//! - [`CanonicalSymbol`] - Ticker plus MIC, the form every provider returns
//! - [`SearchResult`] - Merged search result with provenance
//! - [`Quote`] - Latest price with optional fundamentals
//! - [`HistoricalSeries`] - Bars over a [`HistoryPeriod`]

pub mod cache;
pub mod config;
pub mod errors;
pub mod isin;
pub mod models;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod search;
pub mod service;

pub use config::MarketDataConfig;
pub use errors::{LimitScope, MarketDataError};
pub use service::{CacheHealth, MarketDataService};

// Re-export all public types from models
pub use models::{
    Currency, Fundamentals, HistoricalBar, HistoricalSeries, HistoryPeriod, Mic, ProviderId,
    Query, QueryKind, Quote, SearchResult,
};

// Re-export resolver types
pub use resolver::{CanonicalSymbol, MarketClass, MarketClassifier, Region, SymbolGrammar};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::openfigi::OpenFigiMapper;
pub use provider::yahoo::YahooProvider;
pub use provider::{
    IdentifierMapper, ListingCandidate, MarketDataProvider, ProviderCapabilities, RateLimit,
};

// Re-export orchestration types
pub use cache::{CacheLayer, CacheOperation};
pub use isin::{IsinResolution, IsinResolver};
pub use registry::{
    CallBudget, FetchDiagnostics, ProviderAttempt, ProviderRegistry, QuoteEnricher, QuoteResolver,
    RateLimiter, SearchRouter, SkipReason,
};
pub use search::{CommandLiveLookup, LiveLookup, LocalDataset, SearchController, SearchResponse};
