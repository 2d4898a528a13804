//! Sequential price enrichment of search results.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use super::quote_resolver::{CallBudget, QuoteResolver};
use crate::models::SearchResult;
use crate::resolver::CanonicalSymbol;

pub const DEFAULT_ENRICH_LIMIT: usize = 3;
pub const DEFAULT_ENRICH_DELAY: Duration = Duration::from_millis(100);

/// Fills price and fundamentals of the leading results.
///
/// One `enrich` call sends at most `limit` requests to providers in total,
/// fallbacks and fundamentals lookups included. Resolutions run one at a
/// time with a pause in between.
pub struct QuoteEnricher {
    resolver: Arc<QuoteResolver>,
    limit: usize,
    delay: Duration,
}

impl QuoteEnricher {
    pub fn new(resolver: Arc<QuoteResolver>) -> Self {
        Self {
            resolver,
            limit: DEFAULT_ENRICH_LIMIT,
            delay: DEFAULT_ENRICH_DELAY,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Enrich results that carry neither a price nor fundamentals until the
    /// call budget is spent. Returns the number of provider calls issued.
    pub async fn enrich(&self, results: &mut [SearchResult]) -> usize {
        let mut budget = CallBudget::new(self.limit);
        let mut resolutions = 0;

        for result in results.iter_mut().filter(|r| r.needs_enrichment()) {
            if budget.is_spent() {
                break;
            }
            if resolutions > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            resolutions += 1;

            let symbol = CanonicalSymbol::parse(&result.symbol);
            match self.resolver.resolve_within(&symbol, &mut budget).await {
                Ok(quote) => result.apply_quote(&quote),
                Err(e) => debug!("Enrichment skipped for {}: {}", result.symbol, e),
            }
        }

        self.limit - budget.remaining().unwrap_or(0)
    }
}
