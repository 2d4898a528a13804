//! ISIN resolution.
//!
//! An ISIN is resolved through an ordered list of tiers, stopping at the
//! first one that produces listings:
//!
//! 1. the `isin` cache tier
//! 2. a global identifier mapper (OpenFIGI), whose listings are ranked by
//!    market, priced and cached
//! 3. every provider able to search by ISIN, in priority order
//!
//! Exhaustion yields `NotFound` carrying one attempt per tier or provider.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::CacheOperation;
use crate::errors::MarketDataError;
use crate::models::{is_isin, SearchResult};
use crate::provider::{describe_listing, IdentifierMapper, ListingCandidate};
use crate::registry::{bounded, FetchDiagnostics, ProviderRegistry, QuoteEnricher};
use crate::resolver::{home_mic_for_isin, major_market_rank};

/// Listings kept from a mapping response.
pub const MAX_LISTINGS: usize = 10;

const CACHE_TIER: &str = "cache";

/// Listings of one ISIN and where they came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsinResolution {
    pub isin: String,
    pub results: Vec<SearchResult>,
    /// Tier or provider that produced the listings
    pub source: String,
    /// True when served from the cache
    #[serde(default)]
    pub cached: bool,
}

/// Multi-tier ISIN resolver.
pub struct IsinResolver {
    registry: Arc<ProviderRegistry>,
    mapper: Option<Arc<dyn IdentifierMapper>>,
    enricher: Arc<QuoteEnricher>,
}

impl IsinResolver {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        mapper: Option<Arc<dyn IdentifierMapper>>,
        enricher: Arc<QuoteEnricher>,
    ) -> Self {
        Self {
            registry,
            mapper,
            enricher,
        }
    }

    pub async fn resolve(&self, raw: &str) -> Result<IsinResolution, MarketDataError> {
        let isin = raw.trim().to_uppercase();
        if !is_isin(&isin) {
            return Err(MarketDataError::InvalidQuery(format!(
                "'{}' is not a valid ISIN",
                raw.trim()
            )));
        }

        let cache = self.registry.cache();
        let mut diagnostics = FetchDiagnostics::new();

        if let Some(mut hit) = cache.get::<IsinResolution>(CacheOperation::Isin, &isin).await {
            hit.cached = true;
            return Ok(hit);
        }
        diagnostics.record_error(CACHE_TIER, "miss");

        if let Some(mapper) = &self.mapper {
            match mapper.map_isin(&isin).await {
                Ok(candidates) if !candidates.is_empty() => {
                    let mut results = listings_to_results(&isin, mapper.id(), candidates);
                    self.enricher.enrich(&mut results).await;

                    let resolution = IsinResolution {
                        isin: isin.clone(),
                        results,
                        source: mapper.id().to_string(),
                        cached: false,
                    };
                    info!(
                        "ISIN {} mapped to {} listings by {}",
                        isin,
                        resolution.results.len(),
                        mapper.id()
                    );
                    cache.set(CacheOperation::Isin, &isin, &resolution, None).await;
                    return Ok(resolution);
                }
                Ok(_) => diagnostics.record_error(mapper.id(), "no listings"),
                Err(e) => {
                    warn!("ISIN {}: mapper {} failed: {}", isin, mapper.id(), e);
                    diagnostics.record_failure(mapper.id(), &e);
                }
            }
        }

        for provider in self.registry.isin_providers() {
            let provider_id = provider.id();
            let timeout = provider.rate_limit().timeout;

            match bounded(provider_id, timeout, provider.search_by_isin(&isin)).await {
                Ok(results) if !results.is_empty() => {
                    let resolution = IsinResolution {
                        isin: isin.clone(),
                        results,
                        source: provider_id.to_string(),
                        cached: false,
                    };
                    cache.set(CacheOperation::Isin, &isin, &resolution, None).await;
                    return Ok(resolution);
                }
                Ok(_) => diagnostics.record_error(provider_id, "no results"),
                Err(e) => {
                    debug!("ISIN {}: {} failed: {}", isin, provider_id, e);
                    diagnostics.record_failure(provider_id, &e);
                }
            }
        }

        info!("ISIN {} unresolved: {}", isin, diagnostics.summary());
        Err(diagnostics.into_not_found(isin))
    }
}

/// Deduplicate, rank and convert mapped listings.
///
/// Ranking: the issuer's home market first, then the major markets in
/// preference order, then everything else in response order.
fn listings_to_results(
    isin: &str,
    source: &str,
    candidates: Vec<ListingCandidate>,
) -> Vec<SearchResult> {
    let home = home_mic_for_isin(isin);

    let mut ranked = candidates;
    ranked.sort_by_key(|c| {
        let mic = c.symbol.mic.as_deref();
        if mic.is_some() && mic == home {
            (0, 0)
        } else if let Some(rank) = mic.and_then(major_market_rank) {
            (1, rank)
        } else {
            (2, 0)
        }
    });

    // US venues render to the same bare ticker; keep the best-ranked one
    let mut seen = HashSet::new();
    let mut unique: Vec<ListingCandidate> = ranked
        .into_iter()
        .filter(|c| seen.insert(c.symbol.to_string().to_uppercase()))
        .collect();
    unique.truncate(MAX_LISTINGS);

    unique
        .into_iter()
        .map(|candidate| {
            let (exchange, currency) = describe_listing(&candidate.symbol);
            let asset_type = normalize_security_type(candidate.security_type.as_deref());

            let mut result = SearchResult::new(candidate.symbol.to_string(), candidate.name, exchange, asset_type)
                .with_isin(isin);
            result.currency = currency;
            result.add_source(source);
            result
        })
        .collect()
}

fn normalize_security_type(raw: Option<&str>) -> String {
    match raw.map(str::to_lowercase).as_deref() {
        Some("common stock") | Some("preference") | Some("depositary receipt") | None => {
            "EQUITY".to_string()
        }
        Some("etp") | Some("etf") => "ETF".to_string(),
        Some("open-end fund") | Some("mutual fund") => "FUND".to_string(),
        Some(other) => other.to_uppercase(),
    }
}
