//! Search result models for symbol lookup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quote::{Fundamentals, Quote};
use super::types::ProviderId;

/// Result from a ticker/name/ISIN search, in the canonical schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Canonical symbol (e.g., "AAPL", "ENEL.MI")
    pub symbol: String,

    /// Display name (e.g., "Apple Inc")
    pub name: String,

    /// Asset type (e.g., "EQUITY", "ETF", "FUND")
    #[serde(rename = "type")]
    pub asset_type: String,

    /// Exchange name or MIC (e.g., "NASDAQ", "XMIL")
    pub exchange: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fundamentals: Option<Fundamentals>,

    /// Relevance score (higher = better match)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Every source that reported this instrument, base source first
    #[serde(default)]
    pub provenance: Vec<String>,

    /// True when produced by the out-of-process live lookup
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub live: bool,
}

impl SearchResult {
    /// Create a new search result with required fields.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        exchange: impl Into<String>,
        asset_type: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            asset_type: asset_type.into(),
            exchange: exchange.into(),
            currency: None,
            isin: None,
            price: None,
            change: None,
            change_percent: None,
            fundamentals: None,
            score: None,
            provenance: Vec::new(),
            live: false,
        }
    }

    /// Set the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Set the ISIN.
    pub fn with_isin(mut self, isin: impl Into<String>) -> Self {
        self.isin = Some(isin.into());
        self
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the price.
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// Record the reporting source.
    pub fn with_source(mut self, source: &ProviderId) -> Self {
        self.add_source(source);
        self
    }

    /// Upper-cased symbol used as the deduplication key.
    pub fn key(&self) -> String {
        self.symbol.trim().to_uppercase()
    }

    /// Add a source to the provenance if not already present.
    pub fn add_source(&mut self, source: &str) {
        if !self.provenance.iter().any(|s| s == source) {
            self.provenance.push(source.to_string());
        }
    }

    /// The source owning the base fields.
    pub fn primary_source(&self) -> Option<&str> {
        self.provenance.first().map(String::as_str)
    }

    /// True when neither a price nor any fundamentals are known.
    pub fn needs_enrichment(&self) -> bool {
        self.price.is_none() && self.fundamentals.as_ref().map_or(true, Fundamentals::is_empty)
    }

    /// Copy base fields from a higher-precedence report.
    ///
    /// Only present values replace existing ones; provenance is handled by
    /// the caller.
    pub fn overlay(&mut self, other: &SearchResult) {
        if !other.name.is_empty() {
            self.name = other.name.clone();
        }
        if !other.asset_type.is_empty() {
            self.asset_type = other.asset_type.clone();
        }
        if !other.exchange.is_empty() {
            self.exchange = other.exchange.clone();
        }
        if other.currency.is_some() {
            self.currency = other.currency.clone();
        }
        if other.isin.is_some() {
            self.isin = other.isin.clone();
        }
        if other.price.is_some() {
            self.price = other.price;
            self.change = other.change;
            self.change_percent = other.change_percent;
        }
        if other.fundamentals.is_some() {
            self.fundamentals = other.fundamentals.clone();
        }
        if other.score.is_some() {
            self.score = other.score;
        }
    }

    /// Fill price, change and fundamentals from a resolved quote.
    pub fn apply_quote(&mut self, quote: &Quote) {
        self.price = Some(quote.price);
        self.change = quote.change;
        self.change_percent = quote.change_percent;
        if quote.has_fundamentals() {
            self.fundamentals = Some(quote.fundamentals.clone());
        }
        if self.currency.is_none() && !quote.currency.is_empty() {
            self.currency = Some(quote.currency.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::borrow::Cow;

    #[test]
    fn test_provenance_is_a_set() {
        let source: ProviderId = Cow::Borrowed("YAHOO");
        let mut result = SearchResult::new("AAPL", "Apple Inc", "NASDAQ", "EQUITY").with_source(&source);
        result.add_source("FINNHUB");
        result.add_source("YAHOO");

        assert_eq!(result.provenance, vec!["YAHOO", "FINNHUB"]);
        assert_eq!(result.primary_source(), Some("YAHOO"));
    }

    #[test]
    fn test_needs_enrichment() {
        let mut result = SearchResult::new("AAPL", "Apple Inc", "NASDAQ", "EQUITY");
        assert!(result.needs_enrichment());

        result.fundamentals = Some(Fundamentals::default());
        assert!(result.needs_enrichment());

        result.price = Some(dec!(190));
        assert!(!result.needs_enrichment());
    }

    #[test]
    fn test_overlay_keeps_existing_when_other_is_missing() {
        let mut base = SearchResult::new("ENEL.MI", "Enel", "Milan", "EQUITY").with_currency("EUR");
        let other = SearchResult::new("ENEL.MI", "Enel S.p.A.", "", "");

        base.overlay(&other);

        assert_eq!(base.name, "Enel S.p.A.");
        assert_eq!(base.exchange, "Milan");
        assert_eq!(base.asset_type, "EQUITY");
        assert_eq!(base.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_apply_quote_sets_currency_only_when_missing() {
        let quote = Quote::new("ENEL.MI", dec!(6.42), "EUR", "YAHOO")
            .with_change(Some(dec!(0.05)), Some(dec!(0.78)));

        let mut result = SearchResult::new("ENEL.MI", "Enel", "Milan", "EQUITY");
        result.apply_quote(&quote);
        assert_eq!(result.price, Some(dec!(6.42)));
        assert_eq!(result.change_percent, Some(dec!(0.78)));
        assert_eq!(result.currency.as_deref(), Some("EUR"));

        let mut listed = SearchResult::new("ENEL.MI", "Enel", "Milan", "EQUITY").with_currency("GBX");
        listed.apply_quote(&quote);
        assert_eq!(listed.currency.as_deref(), Some("GBX"));
    }

    #[test]
    fn test_search_result_serialization() {
        let result = SearchResult::new("AAPL", "Apple Inc", "NASDAQ", "EQUITY").with_currency("USD");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "EQUITY");
        assert!(json.get("live").is_none());
        assert!(json.get("price").is_none());
    }
}
