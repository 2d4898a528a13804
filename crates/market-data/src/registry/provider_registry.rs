//! Provider registry.
//!
//! Holds the configured providers ordered by priority, together with the
//! market classifier and the cache shared by every orchestrator. The
//! registry itself never talks to the network; it answers "who should be
//! asked, in which order" for each kind of request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::cache::CacheLayer;
use crate::errors::MarketDataError;
use crate::provider::MarketDataProvider;
use crate::resolver::{MarketClassifier, Region};

/// Registered providers plus the shared classifier and cache.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    classifier: MarketClassifier,
    cache: CacheLayer,
}

impl ProviderRegistry {
    /// Create a registry. Providers are kept sorted by priority, ties in
    /// registration order.
    pub fn new(mut providers: Vec<Arc<dyn MarketDataProvider>>, cache: CacheLayer) -> Self {
        providers.sort_by_key(|p| p.priority());

        info!(
            "Provider registry: {}",
            providers
                .iter()
                .map(|p| format!("{}({})", p.id(), p.priority()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            providers,
            classifier: MarketClassifier::new(),
            cache,
        }
    }

    pub fn with_classifier(mut self, classifier: MarketClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// All providers, best priority first.
    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    pub fn classifier(&self) -> &MarketClassifier {
        &self.classifier
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    /// Static priority of a provider id, if registered.
    pub fn priority_of(&self, provider_id: &str) -> Option<u8> {
        self.providers
            .iter()
            .find(|p| p.id() == provider_id)
            .map(|p| p.priority())
    }

    /// Best-priority search-capable provider specialized in `region`.
    pub fn specialist_for(&self, region: Region) -> Option<&Arc<dyn MarketDataProvider>> {
        let specialist = self.providers.iter().find(|p| {
            let caps = p.capabilities();
            caps.supports_search && caps.specializes_in(region)
        });
        debug!(
            "Specialist for {:?}: {}",
            region,
            specialist.map_or("none", |p| p.id())
        );
        specialist
    }

    /// Providers taking part in a search fan-out.
    pub fn search_providers(&self) -> Vec<&Arc<dyn MarketDataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.capabilities().supports_search)
            .collect()
    }

    /// Quote-capable providers, fundamentals-capable ones first, then by
    /// priority.
    pub fn quote_order(&self) -> Vec<&Arc<dyn MarketDataProvider>> {
        let mut providers: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.capabilities().supports_quotes)
            .collect();
        // Stable: priority order is kept within each group
        providers.sort_by_key(|p| !p.capabilities().supports_fundamentals);
        providers
    }

    /// Fundamentals-capable providers in quote order.
    pub fn fundamentals_providers(&self) -> Vec<&Arc<dyn MarketDataProvider>> {
        self.quote_order()
            .into_iter()
            .filter(|p| p.capabilities().supports_fundamentals)
            .collect()
    }

    /// History-capable providers by priority.
    pub fn history_providers(&self) -> Vec<&Arc<dyn MarketDataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.capabilities().supports_historical)
            .collect()
    }

    /// ISIN-capable providers by priority.
    pub fn isin_providers(&self) -> Vec<&Arc<dyn MarketDataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.capabilities().supports_isin_search)
            .collect()
    }
}

/// Run a provider call under a wall-clock bound; an elapsed bound reads as a
/// provider timeout.
pub(crate) async fn bounded<T, F>(
    provider: &str,
    timeout: Duration,
    call: F,
) -> Result<T, MarketDataError>
where
    F: Future<Output = Result<T, MarketDataError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(MarketDataError::Timeout {
            provider: provider.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quote;
    use crate::provider::{ProviderCapabilities, RateLimit};
    use crate::resolver::CanonicalSymbol;
    use async_trait::async_trait;

    struct StaticProvider {
        id: &'static str,
        priority: u8,
        caps: ProviderCapabilities,
    }

    impl StaticProvider {
        fn new(id: &'static str, priority: u8, fundamentals: bool, regions: &'static [Region]) -> Self {
            Self {
                id,
                priority,
                caps: ProviderCapabilities {
                    supports_search: true,
                    supports_quotes: true,
                    supports_historical: true,
                    supports_fundamentals: fundamentals,
                    supports_isin_search: false,
                    specialized_regions: regions,
                },
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for StaticProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn capabilities(&self) -> ProviderCapabilities {
            self.caps.clone()
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::default()
        }

        async fn get_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError> {
            Err(MarketDataError::SymbolNotFound(symbol.to_string()))
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(
            vec![
                Arc::new(StaticProvider::new("SLOW", 3, true, &[])),
                Arc::new(StaticProvider::new("REGIONAL", 1, false, &[Region::Europe])),
                Arc::new(StaticProvider::new("RICH", 2, true, &[])),
            ],
            CacheLayer::in_memory("test"),
        )
    }

    fn ids(providers: Vec<&Arc<dyn MarketDataProvider>>) -> Vec<&'static str> {
        providers.into_iter().map(|p| p.id()).collect()
    }

    #[test]
    fn test_providers_sorted_by_priority() {
        let registry = registry();
        let order: Vec<_> = registry.providers().iter().map(|p| p.id()).collect();
        assert_eq!(order, vec!["REGIONAL", "RICH", "SLOW"]);
        assert_eq!(registry.priority_of("SLOW"), Some(3));
        assert_eq!(registry.priority_of("MISSING"), None);
    }

    #[test]
    fn test_quote_order_prefers_fundamentals() {
        let registry = registry();
        assert_eq!(ids(registry.quote_order()), vec!["RICH", "SLOW", "REGIONAL"]);
        assert_eq!(ids(registry.fundamentals_providers()), vec!["RICH", "SLOW"]);
    }

    #[test]
    fn test_specialist_for_region() {
        let registry = registry();
        assert_eq!(
            registry.specialist_for(Region::Europe).map(|p| p.id()),
            Some("REGIONAL")
        );
        assert!(registry.specialist_for(Region::AsiaPacific).is_none());
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), MarketDataError> = bounded("SLOW", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(MarketDataError::Timeout { .. })));
    }
}
