//! Quote, history and fundamentals resolution across providers.
//!
//! Each operation reads its cache tier first, then walks the providers in
//! the registry's order until one answers. Failures are collected as
//! attempts; only exhaustion reaches the caller.

use std::sync::Arc;

use log::{debug, info, warn};

use super::diagnostics::{FetchDiagnostics, SkipReason};
use super::provider_registry::{bounded, ProviderRegistry};
use crate::cache::CacheOperation;
use crate::errors::MarketDataError;
use crate::models::{Fundamentals, HistoricalSeries, HistoryPeriod, Quote};
use crate::resolver::CanonicalSymbol;

/// Cap on provider calls shared by a batch of resolutions.
///
/// Every quote or fundamentals request sent to a provider spends one call;
/// cache hits are free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallBudget {
    remaining: Option<usize>,
}

impl CallBudget {
    pub fn new(calls: usize) -> Self {
        Self {
            remaining: Some(calls),
        }
    }

    pub fn unlimited() -> Self {
        Self { remaining: None }
    }

    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    pub fn is_spent(&self) -> bool {
        self.remaining == Some(0)
    }

    fn try_spend(&mut self) -> bool {
        match self.remaining.as_mut() {
            None => true,
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
        }
    }
}

/// First-success resolution of prices and related data.
pub struct QuoteResolver {
    registry: Arc<ProviderRegistry>,
}

impl QuoteResolver {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Latest quote for a listing.
    ///
    /// Providers are tried in quote order. When the winning quote carries no
    /// fundamentals, one extra fundamentals call is made against the first
    /// fundamentals-capable provider and its figures are folded in.
    pub async fn resolve(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError> {
        self.resolve_within(symbol, &mut CallBudget::unlimited()).await
    }

    /// Same as [`resolve`](Self::resolve), but stops sending requests once
    /// `budget` is spent. A quote whose fundamentals were cut short by the
    /// budget is returned but not cached.
    pub async fn resolve_within(
        &self,
        symbol: &CanonicalSymbol,
        budget: &mut CallBudget,
    ) -> Result<Quote, MarketDataError> {
        let key = symbol.to_string();
        let cache = self.registry.cache();

        if let Some(quote) = cache.get::<Quote>(CacheOperation::Quote, &key).await {
            return Ok(quote);
        }

        let mut diagnostics = FetchDiagnostics::new();

        for provider in self.registry.quote_order() {
            let provider_id = provider.id();
            if !budget.try_spend() {
                diagnostics.record_skip(provider_id, SkipReason::BudgetSpent);
                break;
            }
            let timeout = provider.rate_limit().timeout;

            match bounded(provider_id, timeout, provider.get_quote(symbol)).await {
                Ok(mut quote) => {
                    diagnostics.record_success(provider_id);
                    let complete = quote.has_fundamentals()
                        || self.fill_fundamentals(symbol, &mut quote, budget).await;

                    debug!(
                        "Quote for {} from {} ({})",
                        key,
                        provider_id,
                        diagnostics.summary()
                    );
                    if complete {
                        cache.set(CacheOperation::Quote, &key, &quote, None).await;
                    }
                    return Ok(quote);
                }
                Err(e) => {
                    debug!("Quote: {} failed for {}: {}", provider_id, key, e);
                    diagnostics.record_failure(provider_id, &e);
                }
            }
        }

        info!("Quote: no provider could price {}: {}", key, diagnostics.summary());
        Err(diagnostics.into_not_found(key))
    }

    /// Returns false only when the budget prevented the call.
    async fn fill_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
        quote: &mut Quote,
        budget: &mut CallBudget,
    ) -> bool {
        let providers = self.registry.fundamentals_providers();
        let Some(provider) = providers.first() else {
            return true;
        };
        if !budget.try_spend() {
            debug!("Quote: budget spent before fundamentals for {}", symbol);
            return false;
        }

        let provider_id = provider.id();
        let timeout = provider.rate_limit().timeout;
        match bounded(provider_id, timeout, provider.get_fundamentals(symbol)).await {
            Ok(fundamentals) => quote.merge_fundamentals(&fundamentals),
            Err(e) => warn!(
                "Quote: fundamentals from {} unavailable for {}: {}",
                provider_id, symbol, e
            ),
        }
        true
    }

    /// Historical bars for a listing over a look-back period.
    pub async fn history(
        &self,
        symbol: &CanonicalSymbol,
        period: HistoryPeriod,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let key = format!("{}:{}", symbol, period);
        let cache = self.registry.cache();

        if let Some(series) = cache.get::<HistoricalSeries>(CacheOperation::History, &key).await {
            return Ok(series);
        }

        let mut diagnostics = FetchDiagnostics::new();

        for provider in self.registry.history_providers() {
            let provider_id = provider.id();
            let timeout = provider.rate_limit().timeout;

            match bounded(provider_id, timeout, provider.get_historical_data(symbol, period)).await {
                Ok(mut series) if !series.is_empty() => {
                    series.normalize();
                    cache.set(CacheOperation::History, &key, &series, None).await;
                    return Ok(series);
                }
                Ok(_) => diagnostics.record_error(provider_id, "no bars"),
                Err(e) => {
                    debug!("History: {} failed for {}: {}", provider_id, key, e);
                    diagnostics.record_failure(provider_id, &e);
                }
            }
        }

        info!("History: nothing for {}: {}", key, diagnostics.summary());
        Err(diagnostics.into_not_found(key))
    }

    /// Valuation figures for a listing.
    pub async fn fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, MarketDataError> {
        let key = symbol.to_string();
        let cache = self.registry.cache();

        if let Some(fundamentals) = cache
            .get::<Fundamentals>(CacheOperation::Fundamentals, &key)
            .await
        {
            return Ok(fundamentals);
        }

        let mut diagnostics = FetchDiagnostics::new();

        for provider in self.registry.fundamentals_providers() {
            let provider_id = provider.id();
            let timeout = provider.rate_limit().timeout;

            match bounded(provider_id, timeout, provider.get_fundamentals(symbol)).await {
                Ok(fundamentals) if !fundamentals.is_empty() => {
                    cache
                        .set(CacheOperation::Fundamentals, &key, &fundamentals, None)
                        .await;
                    return Ok(fundamentals);
                }
                Ok(_) => diagnostics.record_error(provider_id, "no figures"),
                Err(e) => diagnostics.record_failure(provider_id, &e),
            }
        }

        Err(diagnostics.into_not_found(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheLayer;
    use crate::models::{HistoricalBar, SearchResult};
    use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockQuotes {
        id: &'static str,
        priority: u8,
        fundamentals: Option<Fundamentals>,
        fail: bool,
        quote_calls: AtomicUsize,
        fundamentals_calls: AtomicUsize,
    }

    impl MockQuotes {
        fn new(id: &'static str, priority: u8) -> Self {
            Self {
                id,
                priority,
                fundamentals: None,
                fail: false,
                quote_calls: AtomicUsize::new(0),
                fundamentals_calls: AtomicUsize::new(0),
            }
        }

        fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
            self.fundamentals = Some(fundamentals);
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockQuotes {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                supports_search: false,
                supports_quotes: true,
                supports_historical: true,
                supports_fundamentals: self.fundamentals.is_some(),
                supports_isin_search: false,
                specialized_regions: &[],
            }
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::default()
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
            Ok(Vec::new())
        }

        async fn get_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MarketDataError::provider(self.id, "HTTP 500"));
            }
            Ok(Quote::new(symbol.to_string(), dec!(100), "USD", self.id))
        }

        async fn get_historical_data(
            &self,
            symbol: &CanonicalSymbol,
            period: HistoryPeriod,
        ) -> Result<HistoricalSeries, MarketDataError> {
            if self.fail {
                return Err(MarketDataError::NoDataForRange);
            }
            Ok(HistoricalSeries {
                symbol: symbol.to_string(),
                period,
                currency: "USD".to_string(),
                bars: vec![HistoricalBar::new(Utc::now(), dec!(101))],
                source: self.id.to_string(),
            })
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

    fn resolver(providers: Vec<Arc<dyn MarketDataProvider>>) -> QuoteResolver {
        QuoteResolver::new(Arc::new(ProviderRegistry::new(
            providers,
            CacheLayer::in_memory("test"),
        )))
    }

    #[tokio::test]
    async fn test_first_success_wins_and_is_cached() {
        let failing = Arc::new(MockQuotes::new("FIRST", 1).failing());
        let second = Arc::new(MockQuotes::new("SECOND", 2));
        let resolver = resolver(vec![failing.clone(), second.clone()]);
        let symbol = CanonicalSymbol::parse("AAPL");

        let quote = resolver.resolve(&symbol).await.unwrap();
        assert_eq!(quote.source, "SECOND");

        let again = resolver.resolve(&symbol).await.unwrap();
        assert_eq!(again.source, "SECOND");
        assert_eq!(failing.quote_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.quote_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fundamentals_capable_provider_is_asked_first() {
        let plain = Arc::new(MockQuotes::new("PLAIN", 1));
        let rich = Arc::new(MockQuotes::new("RICH", 3).with_fundamentals(Fundamentals {
            pe_ratio: Some(21.0),
            ..Default::default()
        }));
        let resolver = resolver(vec![plain.clone(), rich.clone()]);

        let quote = resolver.resolve(&CanonicalSymbol::parse("ENEL.MI")).await.unwrap();
        assert_eq!(quote.source, "RICH");
        assert_eq!(quote.fundamentals.pe_ratio, Some(21.0));
        assert_eq!(plain.quote_calls.load(Ordering::SeqCst), 0);
        assert_eq!(rich.fundamentals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fundamentals_come_from_another_provider() {
        let rich = Arc::new(
            MockQuotes::new("RICH", 1)
                .with_fundamentals(Fundamentals {
                    pe_ratio: Some(21.0),
                    market_cap: Some(5.0e10),
                    ..Default::default()
                })
                .failing(),
        );
        let plain = Arc::new(MockQuotes::new("PLAIN", 2));
        let resolver = resolver(vec![plain.clone(), rich.clone()]);

        let quote = resolver.resolve(&CanonicalSymbol::parse("ENEL.MI")).await.unwrap();

        assert_eq!(quote.source, "PLAIN");
        assert_eq!(quote.price, dec!(100));
        assert_eq!(quote.fundamentals.pe_ratio, Some(21.0));
        assert_eq!(quote.fundamentals.market_cap, Some(5.0e10));
        assert_eq!(rich.quote_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rich.fundamentals_calls.load(Ordering::SeqCst), 1);
        assert_eq!(plain.fundamentals_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_budget_stops_the_fallback_chain() {
        let first = Arc::new(MockQuotes::new("A", 1).failing());
        let second = Arc::new(MockQuotes::new("B", 2).failing());
        let third = Arc::new(MockQuotes::new("C", 3));
        let resolver = resolver(vec![first.clone(), second.clone(), third.clone()]);
        let mut budget = CallBudget::new(2);

        let err = resolver
            .resolve_within(&CanonicalSymbol::parse("AAPL"), &mut budget)
            .await
            .unwrap_err();

        assert!(budget.is_spent());
        assert_eq!(third.quote_calls.load(Ordering::SeqCst), 0);
        let attempts = err.attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[2].skipped, Some(SkipReason::BudgetSpent));
    }

    #[tokio::test]
    async fn test_budget_cut_fundamentals_are_not_cached() {
        let rich = Arc::new(MockQuotes::new("RICH", 1).with_fundamentals(Fundamentals {
            pe_ratio: Some(21.0),
            ..Default::default()
        }));
        let resolver = resolver(vec![rich.clone()]);
        let symbol = CanonicalSymbol::parse("AAPL");

        let quote = resolver
            .resolve_within(&symbol, &mut CallBudget::new(1))
            .await
            .unwrap();
        assert!(!quote.has_fundamentals());
        assert_eq!(rich.fundamentals_calls.load(Ordering::SeqCst), 0);

        let full = resolver.resolve(&symbol).await.unwrap();
        assert_eq!(full.fundamentals.pe_ratio, Some(21.0));
        assert_eq!(rich.quote_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_lists_attempts() {
        let resolver = resolver(vec![
            Arc::new(MockQuotes::new("A", 1).failing()),
            Arc::new(MockQuotes::new("B", 2).failing()),
        ]);

        let err = resolver.resolve(&CanonicalSymbol::parse("ZZZZ")).await.unwrap_err();
        assert_eq!(err.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_history_falls_back() {
        let resolver = resolver(vec![
            Arc::new(MockQuotes::new("A", 1).failing()),
            Arc::new(MockQuotes::new("B", 2)),
        ]);

        let series = resolver
            .history(&CanonicalSymbol::parse("AAPL"), HistoryPeriod::OneMonth)
            .await
            .unwrap();
        assert_eq!(series.source, "B");
        assert_eq!(series.bars.len(), 1);
    }

    #[tokio::test]
    async fn test_fundamentals_without_capable_provider() {
        let resolver = resolver(vec![Arc::new(MockQuotes::new("A", 1))]);
        let err = resolver
            .fundamentals(&CanonicalSymbol::parse("AAPL"))
            .await
            .unwrap_err();
        assert!(err.attempts().is_empty());
    }
}
