#![allow(dead_code)]

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use tickerlens_market_data::search::LocalInstrument;
use tickerlens_market_data::{
    CacheLayer, CanonicalSymbol, Fundamentals, IdentifierMapper, ListingCandidate, LiveLookup,
    LocalDataset, MarketDataConfig, MarketDataError, MarketDataProvider, MarketDataService,
    ProviderCapabilities, ProviderId, Quote, RateLimit, Region, SearchResult,
};

/// Scripted provider counting every call it receives.
pub struct MockProvider {
    pub id: &'static str,
    pub priority: u8,
    pub capabilities: ProviderCapabilities,
    pub search_results: Vec<SearchResult>,
    pub isin_results: Vec<SearchResult>,
    pub price: Option<(Decimal, &'static str)>,
    pub fundamentals: Option<Fundamentals>,
    pub search_calls: AtomicUsize,
    pub quote_calls: AtomicUsize,
    pub isin_calls: AtomicUsize,
    pub fundamentals_calls: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(id: &'static str, priority: u8) -> Self {
        Self {
            id,
            priority,
            capabilities: ProviderCapabilities {
                supports_search: true,
                supports_quotes: true,
                supports_historical: false,
                supports_fundamentals: false,
                supports_isin_search: false,
                specialized_regions: &[],
            },
            search_results: Vec::new(),
            isin_results: Vec::new(),
            price: None,
            fundamentals: None,
            search_calls: AtomicUsize::new(0),
            quote_calls: AtomicUsize::new(0),
            isin_calls: AtomicUsize::new(0),
            fundamentals_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Specialist for every non-US region.
    pub fn specialist(mut self) -> Self {
        self.capabilities.specialized_regions = &Region::ALL;
        self
    }

    pub fn with_search(mut self, results: Vec<SearchResult>) -> Self {
        self.search_results = results;
        self
    }

    pub fn with_isin_search(mut self, results: Vec<SearchResult>) -> Self {
        self.capabilities.supports_isin_search = true;
        self.isin_results = results;
        self
    }

    pub fn with_price(mut self, price: Decimal, currency: &'static str) -> Self {
        self.price = Some((price, currency));
        self
    }

    pub fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
        self.capabilities.supports_fundamentals = true;
        self.fundamentals = Some(fundamentals);
        self
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn quotes(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn isin_searches(&self) -> usize {
        self.isin_calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        let source: ProviderId = Cow::Borrowed(self.id);
        Ok(self
            .search_results
            .iter()
            .cloned()
            .map(|r| r.with_source(&source))
            .collect())
    }

    async fn get_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        match self.price {
            Some((price, currency)) => Ok(Quote::new(symbol.to_string(), price, currency, self.id)),
            None => Err(MarketDataError::SymbolNotFound(symbol.to_string())),
        }
    }

    async fn search_by_isin(&self, isin: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        self.isin_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .isin_results
            .iter()
            .cloned()
            .map(|r| r.with_isin(isin))
            .collect())
    }

    async fn get_fundamentals(
        &self,
        _symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, MarketDataError> {
        self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
        self.fundamentals.clone().ok_or_else(|| MarketDataError::NotSupported {
            operation: "fundamentals".to_string(),
            provider: self.id.to_string(),
        })
    }
}

/// Identifier mapper returning a fixed listing set.
pub struct MockMapper {
    pub listings: Vec<ListingCandidate>,
    pub calls: AtomicUsize,
}

impl MockMapper {
    pub fn new(listings: Vec<ListingCandidate>) -> Self {
        Self {
            listings,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentifierMapper for MockMapper {
    fn id(&self) -> &'static str {
        "OPENFIGI"
    }

    async fn map_isin(&self, _isin: &str) -> Result<Vec<ListingCandidate>, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.listings.clone())
    }
}

/// Live lookup answering with a fixed result, or failing when empty.
pub struct MockLive {
    pub hit: Option<SearchResult>,
    pub calls: AtomicUsize,
}

impl MockLive {
    pub fn new(hit: Option<SearchResult>) -> Self {
        Self {
            hit,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveLookup for MockLive {
    async fn lookup(&self, _isin: &str) -> Result<SearchResult, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hit
            .clone()
            .ok_or_else(|| MarketDataError::LiveLookup("not listed".to_string()))
    }
}

pub fn listing(ticker: &str, mic: &str) -> ListingCandidate {
    ListingCandidate {
        symbol: CanonicalSymbol::new(ticker, Some(mic.to_string())),
        name: "ENEL SPA".to_string(),
        security_type: Some("Common Stock".to_string()),
        exchange_code: None,
    }
}

pub fn instrument(isin: &str, symbol: &str, name: &str) -> LocalInstrument {
    LocalInstrument {
        isin: isin.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        asset_type: "ETF".to_string(),
        exchange: Some("Borsa Italiana".to_string()),
        currency: Some("EUR".to_string()),
        price: None,
    }
}

/// Configuration with no pauses between enrichment calls.
pub fn test_config() -> MarketDataConfig {
    MarketDataConfig {
        enrich_delay_ms: 0,
        ..MarketDataConfig::default()
    }
}

pub struct Harness {
    pub providers: Vec<Arc<dyn MarketDataProvider>>,
    pub mapper: Option<Arc<dyn IdentifierMapper>>,
    pub dataset: Arc<LocalDataset>,
    pub live: Option<Arc<dyn LiveLookup>>,
}

impl Harness {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self {
            providers,
            mapper: None,
            dataset: Arc::new(LocalDataset::empty()),
            live: None,
        }
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn IdentifierMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn with_dataset(mut self, dataset: LocalDataset) -> Self {
        self.dataset = Arc::new(dataset);
        self
    }

    pub fn with_live(mut self, live: Arc<dyn LiveLookup>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn build(self) -> MarketDataService {
        MarketDataService::assemble(
            &test_config(),
            self.providers,
            self.mapper,
            self.dataset,
            self.live,
            CacheLayer::in_memory("test"),
        )
    }
}
