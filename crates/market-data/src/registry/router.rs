//! Search routing: regional short-circuit, then concurrent fan-out.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};

use super::diagnostics::FetchDiagnostics;
use super::merge::{merge_reports, ProviderReport};
use super::provider_registry::{bounded, ProviderRegistry};
use crate::errors::MarketDataError;
use crate::models::{Query, SearchResult};
use crate::resolver::MarketClass;

/// Default bound on a single provider's search during fan-out.
pub const DEFAULT_FAN_OUT_TIMEOUT: Duration = Duration::from_secs(15);

/// Routes a search to the providers able to answer it.
pub struct SearchRouter {
    registry: Arc<ProviderRegistry>,
    timeout: Duration,
}

impl SearchRouter {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_FAN_OUT_TIMEOUT,
        }
    }

    /// Bound applied to each provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Search every relevant provider and merge their answers.
    ///
    /// Regional queries go to the region's specialist first; a non-empty
    /// answer there is final and no other provider is called. Otherwise all
    /// search-capable providers, the specialist included, are queried
    /// concurrently with the raw query and their reports merged once every
    /// call has finished.
    pub async fn search(&self, query: &Query) -> Result<Vec<SearchResult>, MarketDataError> {
        let mut diagnostics = FetchDiagnostics::new();

        if let MarketClass::Regional { mic, region, symbol } = self.registry.classifier().classify(query) {
            if let Some(specialist) = self.registry.specialist_for(region) {
                let provider_id = specialist.id();
                let canonical = symbol.to_string();
                info!(
                    "Router: '{}' is regional ({}), asking specialist {} for '{}'",
                    query.as_str(),
                    mic,
                    provider_id,
                    canonical
                );

                match bounded(provider_id, self.timeout, specialist.search(&canonical)).await {
                    Ok(results) if !results.is_empty() => {
                        debug!(
                            "Router: specialist {} answered with {} results",
                            provider_id,
                            results.len()
                        );
                        return Ok(merge_reports(vec![ProviderReport {
                            provider: provider_id,
                            priority: specialist.priority(),
                            results,
                        }]));
                    }
                    Ok(_) => diagnostics.record_error(provider_id, "no results"),
                    Err(e) => {
                        warn!("Router: specialist {} failed: {}", provider_id, e);
                        diagnostics.record_failure(provider_id, &e);
                    }
                }
            }
        }

        let merged = self.fan_out(query.as_str(), &mut diagnostics).await;
        if merged.is_empty() {
            info!(
                "Router: nothing found for '{}': {}",
                query.as_str(),
                diagnostics.summary()
            );
            return Err(diagnostics.into_not_found(query.as_str()));
        }
        Ok(merged)
    }

    /// Query every search-capable provider concurrently.
    ///
    /// Reports are merged in completion order, so the fastest reporter of a
    /// symbol lays down the base record and priority decides overlays.
    async fn fan_out(
        &self,
        query: &str,
        diagnostics: &mut FetchDiagnostics,
    ) -> Vec<SearchResult> {
        let providers: Vec<_> = self
            .registry
            .search_providers()
            .into_iter()
            .cloned()
            .collect();

        debug!(
            "Router: fanning out '{}' to {} providers",
            query,
            providers.len()
        );

        let mut pending: FuturesUnordered<_> = providers
            .into_iter()
            .map(|provider| {
                let query = query.to_string();
                let timeout = self.timeout;
                let provider_id = provider.id();
                let priority = provider.priority();
                let handle = tokio::spawn(async move {
                    bounded(provider_id, timeout, provider.search(&query)).await
                });
                async move { (provider_id, priority, handle.await) }
            })
            .collect();

        let mut reports = Vec::new();
        while let Some((provider_id, priority, joined)) = pending.next().await {
            match joined {
                Ok(Ok(results)) if !results.is_empty() => {
                    diagnostics.record_success(provider_id);
                    reports.push(ProviderReport {
                        provider: provider_id,
                        priority,
                        results,
                    });
                }
                Ok(Ok(_)) => diagnostics.record_error(provider_id, "no results"),
                Ok(Err(e)) => {
                    debug!("Router: {} failed: {}", provider_id, e);
                    diagnostics.record_failure(provider_id, &e);
                }
                Err(join_error) => {
                    warn!("Router: search task for {} aborted: {}", provider_id, join_error);
                    diagnostics.record_error(provider_id, join_error.to_string());
                }
            }
        }

        merge_reports(reports)
    }
}
