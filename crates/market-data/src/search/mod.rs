//! Search strategy: local dataset, live lookup, provider aggregation.

mod controller;
mod dataset;
mod live;

pub use controller::{
    SearchController, SearchResponse, AGGREGATOR_SCORE, DEFAULT_SEARCH_LIMIT, ISIN_RESOLVER_SCORE,
    LIVE_SCORE,
};
pub use dataset::{DatasetSnapshot, LocalDataset, LocalInstrument, EXACT_ISIN_SCORE, SUBSTRING_SCORE};
pub use live::{CommandLiveLookup, LiveLookup, DEFAULT_LIVE_TIMEOUT};
