//! Three-level search.
//!
//! Level 1 is the local dataset. Level 2, the live lookup, runs only for
//! ISIN-shaped queries the dataset does not match exactly. Level 3, the
//! provider aggregator, runs for every symbol or name query and for ISINs
//! the first two levels could not answer.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::dataset::{LocalDataset, EXACT_ISIN_SCORE, LOCAL_SOURCE};
use super::live::{LiveLookup, LIVE_SOURCE};
use crate::cache::{CacheLayer, CacheOperation};
use crate::errors::MarketDataError;
use crate::isin::IsinResolver;
use crate::models::{Query, QueryKind, SearchResult};
use crate::registry::{FetchDiagnostics, QuoteEnricher, SearchRouter};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const LIVE_SCORE: f64 = 100.0;
pub const ISIN_RESOLVER_SCORE: f64 = 90.0;
pub const AGGREGATOR_SCORE: f64 = 40.0;

/// Ranked results of one search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub kind: QueryKind,
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub cached: bool,
}

pub struct SearchController {
    dataset: Arc<LocalDataset>,
    live: Option<Arc<dyn LiveLookup>>,
    router: Arc<SearchRouter>,
    enricher: Arc<QuoteEnricher>,
    isin: Arc<IsinResolver>,
    cache: CacheLayer,
    limit: usize,
}

impl SearchController {
    pub fn new(
        dataset: Arc<LocalDataset>,
        router: Arc<SearchRouter>,
        enricher: Arc<QuoteEnricher>,
        isin: Arc<IsinResolver>,
        cache: CacheLayer,
    ) -> Self {
        Self {
            dataset,
            live: None,
            router,
            enricher,
            isin,
            cache,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_live_lookup(mut self, live: Arc<dyn LiveLookup>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub async fn search(&self, raw: &str) -> Result<SearchResponse, MarketDataError> {
        let query = Query::parse(raw)
            .ok_or_else(|| MarketDataError::InvalidQuery("empty query".to_string()))?;
        let cache_key = query.normalized();

        if let Some(mut hit) = self
            .cache
            .get::<SearchResponse>(CacheOperation::Search, &cache_key)
            .await
        {
            hit.cached = true;
            return Ok(hit);
        }

        let mut diagnostics = FetchDiagnostics::new();

        // Level 1
        let mut results = self.dataset.search(&query);
        if results.is_empty() {
            diagnostics.record_error(LOCAL_SOURCE, "no match");
        } else {
            diagnostics.record_success(LOCAL_SOURCE);
        }

        // Level 2
        let exact_local = results.iter().any(|r| r.score == Some(EXACT_ISIN_SCORE));
        if query.is_isin() && !exact_local {
            if let Some(hit) = self.live_lookup(&query, &mut diagnostics).await {
                results.retain(|r| r.key() != hit.key());
                results.insert(0, hit);
            }
        }

        // Level 3
        if !query.is_isin() || results.is_empty() {
            let (found, score) = self.aggregate(&query, &mut diagnostics).await;
            append_new(&mut results, found, score);
        }

        if results.is_empty() {
            info!("Search '{}' exhausted: {}", query.as_str(), diagnostics.summary());
            return Err(diagnostics.into_not_found(query.as_str()));
        }

        // Stable: equal scores keep level order
        results.sort_by(|a, b| {
            b.score
                .unwrap_or_default()
                .total_cmp(&a.score.unwrap_or_default())
        });
        results.truncate(self.limit);

        let response = SearchResponse {
            query: query.as_str().to_string(),
            kind: query.kind(),
            results,
            cached: false,
        };
        self.cache
            .set(CacheOperation::Search, &cache_key, &response, None)
            .await;
        Ok(response)
    }

    async fn live_lookup(
        &self,
        query: &Query,
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<SearchResult> {
        let live = self.live.as_ref()?;
        let isin = query.normalized();

        if let Some(hit) = self.cache.get::<SearchResult>(CacheOperation::Live, &isin).await {
            diagnostics.record_success(LIVE_SOURCE);
            return Some(hit);
        }

        match live.lookup(&isin).await {
            Ok(mut hit) => {
                hit.score = Some(LIVE_SCORE);
                hit.live = true;
                self.cache.set(CacheOperation::Live, &isin, &hit, None).await;
                diagnostics.record_success(LIVE_SOURCE);
                Some(hit)
            }
            Err(e) => {
                warn!("Live lookup for {} failed: {}", isin, e);
                diagnostics.record_failure(LIVE_SOURCE, &e);
                None
            }
        }
    }

    /// Level 3: ISINs through the resolver, everything else through the
    /// router followed by enrichment.
    async fn aggregate(
        &self,
        query: &Query,
        diagnostics: &mut FetchDiagnostics,
    ) -> (Vec<SearchResult>, f64) {
        if query.is_isin() {
            match self.isin.resolve(query.as_str()).await {
                Ok(resolution) => (resolution.results, ISIN_RESOLVER_SCORE),
                Err(e) => {
                    absorb(diagnostics, e);
                    (Vec::new(), ISIN_RESOLVER_SCORE)
                }
            }
        } else {
            match self.router.search(query).await {
                Ok(mut found) => {
                    let issued = self.enricher.enrich(&mut found).await;
                    debug!("Enriched {} of {} aggregator results", issued, found.len());
                    (found, AGGREGATOR_SCORE)
                }
                Err(e) => {
                    absorb(diagnostics, e);
                    (Vec::new(), AGGREGATOR_SCORE)
                }
            }
        }
    }
}

/// Fold a lower tier's failure into the running diagnostics.
fn absorb(diagnostics: &mut FetchDiagnostics, error: MarketDataError) {
    match error {
        MarketDataError::NotFound { attempts, .. } => diagnostics.extend(attempts),
        other => diagnostics.record_failure("AGGREGATOR", &other),
    }
}

/// Append results whose symbol is not present yet, with the given score.
fn append_new(results: &mut Vec<SearchResult>, found: Vec<SearchResult>, score: f64) {
    let mut seen: HashSet<String> = results.iter().map(SearchResult::key).collect();
    for mut result in found {
        if seen.insert(result.key()) {
            result.score = Some(score);
            results.push(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(symbol: &str, score: f64) -> SearchResult {
        SearchResult::new(symbol, symbol, "", "EQUITY").with_score(score)
    }

    #[test]
    fn test_append_skips_known_symbols() {
        let mut results = vec![result("ENEL.MI", 50.0)];
        append_new(
            &mut results,
            vec![result("enel.mi", 7.0), result("ENL.DE", 7.0)],
            AGGREGATOR_SCORE,
        );

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, Some(50.0));
        assert_eq!(results[1].score, Some(AGGREGATOR_SCORE));
    }

    #[test]
    fn test_absorb_keeps_nested_attempts() {
        let mut inner = FetchDiagnostics::new();
        inner.record_error("YAHOO", "no results");
        inner.record_error("FINNHUB", "no results");

        let mut outer = FetchDiagnostics::new();
        outer.record_error(LOCAL_SOURCE, "no match");
        absorb(&mut outer, inner.into_not_found("zzz"));

        assert_eq!(outer.len(), 3);
    }
}
