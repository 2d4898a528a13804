//! Engine facade.
//!
//! Wires the providers, cache, router, resolvers and search controller
//! together and exposes the operations callers use.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::cache::{CacheLayer, RedisCacheBackend};
use crate::config::MarketDataConfig;
use crate::errors::MarketDataError;
use crate::isin::{IsinResolution, IsinResolver};
use crate::models::{Fundamentals, HistoricalSeries, HistoryPeriod, Quote};
use crate::provider::alpha_vantage::AlphaVantageProvider;
use crate::provider::finnhub::FinnhubProvider;
use crate::provider::openfigi::OpenFigiMapper;
use crate::provider::yahoo::YahooProvider;
use crate::provider::{IdentifierMapper, MarketDataProvider};
use crate::registry::{ProviderRegistry, QuoteEnricher, QuoteResolver, SearchRouter};
use crate::resolver::{CanonicalSymbol, MarketClassifier};
use crate::search::{CommandLiveLookup, LiveLookup, LocalDataset, SearchController, SearchResponse};

/// Health of the cache and the configured sources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealth {
    pub backend: String,
    pub healthy: bool,
    pub providers: Vec<String>,
    pub dataset_size: usize,
}

/// Everything a caller needs, behind one handle.
pub struct MarketDataService {
    registry: Arc<ProviderRegistry>,
    quotes: Arc<QuoteResolver>,
    isin: Arc<IsinResolver>,
    search: SearchController,
    dataset: Arc<LocalDataset>,
    refresh: Option<JoinHandle<()>>,
}

impl MarketDataService {
    /// Build the engine from configuration: connect the cache, load the
    /// dataset and construct every configured provider.
    pub async fn from_config(config: &MarketDataConfig) -> Result<Self, MarketDataError> {
        let cache = build_cache(config).await;

        let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
        if config.yahoo_enabled {
            match YahooProvider::new().await {
                Ok(yahoo) => providers.push(Arc::new(yahoo)),
                Err(e) => warn!("Yahoo provider unavailable: {}", e),
            }
        }
        if let Some(key) = config.finnhub_api_key.clone().filter(|k| !k.is_empty()) {
            providers.push(Arc::new(FinnhubProvider::new(key)));
        }
        if let Some(key) = config.alpha_vantage_api_key.clone().filter(|k| !k.is_empty()) {
            providers.push(Arc::new(AlphaVantageProvider::new(key)));
        }

        let mapper: Option<Arc<dyn IdentifierMapper>> = config.openfigi_enabled.then(|| {
            Arc::new(OpenFigiMapper::new(config.openfigi_api_key.clone())) as Arc<dyn IdentifierMapper>
        });

        let dataset = match &config.dataset_path {
            Some(path) => Arc::new(LocalDataset::load(path).await?),
            None => Arc::new(LocalDataset::empty()),
        };

        let live: Option<Arc<dyn LiveLookup>> = config.live_lookup_command.as_ref().map(|program| {
            Arc::new(
                CommandLiveLookup::new(program.clone())
                    .with_args(config.live_lookup_args.clone())
                    .with_timeout(config.live_lookup_timeout()),
            ) as Arc<dyn LiveLookup>
        });

        let mut service = Self::assemble(config, providers, mapper, dataset, live, cache);
        if config.dataset_path.is_some() {
            if let Some(every) = config.dataset_refresh() {
                service.refresh = Some(service.dataset.spawn_refresh(every));
            }
        }
        Ok(service)
    }

    /// Build the engine from ready-made parts.
    pub fn assemble(
        config: &MarketDataConfig,
        providers: Vec<Arc<dyn MarketDataProvider>>,
        mapper: Option<Arc<dyn IdentifierMapper>>,
        dataset: Arc<LocalDataset>,
        live: Option<Arc<dyn LiveLookup>>,
        cache: CacheLayer,
    ) -> Self {
        let classifier = MarketClassifier::new().with_extra_tickers(config.extra_tickers.clone());
        let registry =
            Arc::new(ProviderRegistry::new(providers, cache.clone()).with_classifier(classifier));

        let quotes = Arc::new(QuoteResolver::new(Arc::clone(&registry)));
        let enricher = Arc::new(
            QuoteEnricher::new(Arc::clone(&quotes))
                .with_limit(config.enrich_limit)
                .with_delay(config.enrich_delay()),
        );
        let router =
            Arc::new(SearchRouter::new(Arc::clone(&registry)).with_timeout(config.fan_out_timeout()));
        let isin = Arc::new(IsinResolver::new(
            Arc::clone(&registry),
            mapper,
            Arc::clone(&enricher),
        ));

        let mut search = SearchController::new(
            Arc::clone(&dataset),
            router,
            enricher,
            Arc::clone(&isin),
            cache,
        )
        .with_limit(config.search_limit);
        if let Some(live) = live {
            search = search.with_live_lookup(live);
        }

        info!(
            "Market data service ready: {} providers, {} local instruments",
            registry.providers().len(),
            dataset.len()
        );

        Self {
            registry,
            quotes,
            isin,
            search,
            dataset,
            refresh: None,
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchResponse, MarketDataError> {
        self.search.search(query).await
    }

    pub async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.quotes.resolve(&parse_symbol(symbol)?).await
    }

    pub async fn history(
        &self,
        symbol: &str,
        period: HistoryPeriod,
    ) -> Result<HistoricalSeries, MarketDataError> {
        self.quotes.history(&parse_symbol(symbol)?, period).await
    }

    pub async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        self.quotes.fundamentals(&parse_symbol(symbol)?).await
    }

    pub async fn resolve_isin(&self, isin: &str) -> Result<IsinResolution, MarketDataError> {
        self.isin.resolve(isin).await
    }

    pub async fn cache_health(&self) -> CacheHealth {
        let cache = self.registry.cache();
        CacheHealth {
            backend: cache.backend_name().to_string(),
            healthy: cache.health_check().await,
            providers: self
                .registry
                .providers()
                .iter()
                .map(|p| p.id().to_string())
                .collect(),
            dataset_size: self.dataset.len(),
        }
    }

    /// Drop every cached entry of this engine's namespace.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.registry.cache().clear().await;
        info!("Cleared {} cache entries", removed);
        removed
    }
}

impl Drop for MarketDataService {
    fn drop(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.abort();
        }
    }
}

fn parse_symbol(raw: &str) -> Result<CanonicalSymbol, MarketDataError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MarketDataError::InvalidQuery("empty symbol".to_string()));
    }
    Ok(CanonicalSymbol::parse(trimmed))
}

/// Redis when configured and reachable, memory otherwise.
async fn build_cache(config: &MarketDataConfig) -> CacheLayer {
    if let Some(url) = config.redis_url() {
        match RedisCacheBackend::connect(url, config.cache_timeout()).await {
            Ok(backend) => return CacheLayer::new(config.namespace.clone(), Arc::new(backend)),
            Err(e) => warn!("Redis cache unavailable, using in-memory cache: {}", e),
        }
    }
    CacheLayer::in_memory(config.namespace.clone())
}
