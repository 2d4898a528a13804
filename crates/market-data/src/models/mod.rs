//! Market data models
//!
//! This module contains the canonical data types every adapter maps into:
//! - `types` - Type aliases for common identifiers (ProviderId, Mic, Currency)
//! - `query` - Query classification (ISIN, symbol, name)
//! - `search` - Search result data with provenance (SearchResult)
//! - `quote` - Quote and fundamentals (Quote, Fundamentals)
//! - `history` - Historical bars and look-back periods

mod history;
mod query;
mod quote;
mod search;
mod types;

pub use history::{HistoricalBar, HistoricalSeries, HistoryPeriod};
pub use query::{classify, is_isin, Query, QueryKind};
pub use quote::{Fundamentals, Quote};
pub use search::SearchResult;
pub use types::{Currency, Mic, ProviderId};
