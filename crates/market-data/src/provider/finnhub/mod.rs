//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Latest quotes via /quote
//! - Daily and intraday candles via /stock/candle
//! - Symbol, name and ISIN search via /search
//! - Valuation figures via /stock/metric
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{
    Fundamentals, HistoricalBar, HistoricalSeries, HistoryPeriod, Quote, SearchResult,
};
use crate::provider::{describe_listing, MarketDataProvider, ProviderCapabilities, RateLimit};
use crate::registry::RateLimiter;
use crate::resolver::{CanonicalSymbol, SymbolGrammar};

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change versus previous close
    d: Option<f64>,
    /// Percent change versus previous close
    dp: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Response from /stock/candle endpoint
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// Status: "ok" or "no_data"
    s: String,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
    #[serde(default)]
    t: Vec<i64>,
}

/// Response from /search endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchItem>,
}

/// Individual search result item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    /// Full description/name
    description: String,
    /// Symbol for API calls
    symbol: String,
    /// Security type (e.g., "Common Stock", "ETF")
    #[serde(rename = "type", default)]
    security_type: String,
}

/// Response from /stock/metric endpoint
#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: Option<Metrics>,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    /// Market capitalization in millions
    #[serde(rename = "marketCapitalization")]
    market_capitalization: Option<f64>,
    #[serde(rename = "peTTM")]
    pe_ttm: Option<f64>,
    #[serde(rename = "peBasicExclExtraTTM")]
    pe_basic: Option<f64>,
    /// Dividend yield in percent
    #[serde(rename = "dividendYieldIndicatedAnnual")]
    dividend_yield: Option<f64>,
    #[serde(rename = "52WeekHigh")]
    week_52_high: Option<f64>,
    #[serde(rename = "52WeekLow")]
    week_52_low: Option<f64>,
}

impl Metrics {
    fn to_fundamentals(&self) -> Fundamentals {
        Fundamentals {
            market_cap: self.market_capitalization.map(|mc| mc * 1_000_000.0),
            pe_ratio: self.pe_ttm.or(self.pe_basic),
            dividend_yield: self.dividend_yield.map(|pct| pct / 100.0),
            week_52_high: self.week_52_high,
            week_52_low: self.week_52_low,
        }
    }
}

/// Error response from Finnhub
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
///
/// Covers US equities in depth and the major non-US exchanges.
/// Supports ISIN search and fundamentals alongside quotes and candles.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limit: RateLimit,
    limiter: RateLimiter,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider with the given API key.
    pub fn new(api_key: String) -> Self {
        Self::with_config(api_key, DEFAULT_BASE_URL, Self::default_rate_limit())
    }

    /// Create a provider against a custom endpoint and budget.
    pub fn with_config(api_key: String, base_url: impl Into<String>, rate_limit: RateLimit) -> Self {
        let client = Client::builder()
            .timeout(rate_limit.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: base_url.into(),
            limiter: RateLimiter::new(PROVIDER_ID, &rate_limit),
            rate_limit,
        }
    }

    pub fn default_rate_limit() -> RateLimit {
        RateLimit {
            requests_per_minute: 60, // Free tier limit
            daily_limit: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        // Local budget first: a refused call never reaches the network
        self.limiter.try_acquire()?;

        let url = format!("{}{}", self.base_url, endpoint);

        // API key as header (more secure than query param)
        let request = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", &self.api_key)
            .query(params);

        debug!("Finnhub request: {} with {} params", endpoint, params.len());

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER_ID, format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();

        // 429, and 403 on quota exhaustion
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                "Invalid or missing API key",
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
                if let Some(error_msg) = error_resp.error {
                    return Err(MarketDataError::provider(PROVIDER_ID, error_msg));
                }
            }

            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("HTTP {} - {}", status, body),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, format!("Failed to read response: {}", e)))
    }

    fn parse<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T, MarketDataError> {
        serde_json::from_str(text).map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to parse {} response: {}", what, e))
        })
    }

    fn encode(symbol: &CanonicalSymbol) -> Result<String, MarketDataError> {
        symbol.encode(SymbolGrammar::Finnhub)
    }

    fn to_search_results(response: SearchResponse, isin: Option<&str>) -> Vec<SearchResult> {
        response
            .result
            .into_iter()
            .map(|item| {
                let symbol = CanonicalSymbol::decode(SymbolGrammar::Finnhub, &item.symbol);
                let (exchange, currency) = describe_listing(&symbol);
                let mut result = SearchResult::new(
                    symbol.to_string(),
                    item.description,
                    exchange,
                    map_security_type(&item.security_type),
                );
                result.currency = currency;
                result.isin = isin.map(str::to_string);
                result.add_source(PROVIDER_ID);
                result
            })
            .collect()
    }

    fn resolution(period: HistoryPeriod) -> &'static str {
        match period.interval() {
            "5m" => "5",
            "1h" => "60",
            "1wk" => "W",
            _ => "D",
        }
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: true,
            supports_quotes: true,
            supports_historical: true,
            supports_fundamentals: true,
            supports_isin_search: true,
            specialized_regions: &[],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        self.rate_limit.clone()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        debug!("Searching Finnhub for '{}'", query);

        let text = self.fetch("/search", &[("q", query)]).await?;
        let response: SearchResponse = Self::parse(&text, "search")?;
        let results = Self::to_search_results(response, None);

        debug!("Finnhub: found {} search results for '{}'", results.len(), query);
        Ok(results)
    }

    async fn get_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;
        debug!("Fetching latest quote for {} from Finnhub", provider_symbol);

        let text = self.fetch("/quote", &[("symbol", &provider_symbol)]).await?;
        let response: QuoteResponse = Self::parse(&text, "quote")?;

        let close = response
            .c
            .ok_or_else(|| MarketDataError::SymbolNotFound(provider_symbol.clone()))?;

        // Finnhub returns 0 for unknown symbols instead of an error
        if close == 0.0 && response.o.unwrap_or(0.0) == 0.0 {
            return Err(MarketDataError::SymbolNotFound(provider_symbol));
        }

        let price = Decimal::try_from(close).map_err(|_| {
            MarketDataError::provider(PROVIDER_ID, format!("Invalid close price: {}", close))
        })?;

        let timestamp = response
            .t
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        let currency = symbol.currency().unwrap_or("USD");

        Ok(Quote::new(symbol.to_string(), price, currency, PROVIDER_ID)
            .with_change(
                response.d.and_then(|v| Decimal::try_from(v).ok()),
                response.dp.and_then(|v| Decimal::try_from(v).ok()),
            )
            .with_timestamp(timestamp))
    }

    async fn get_historical_data(
        &self,
        symbol: &CanonicalSymbol,
        period: HistoryPeriod,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;
        let end = Utc::now();
        let start = period.start_from(end);
        let from_ts = start.timestamp().to_string();
        let to_ts = end.timestamp().to_string();

        debug!(
            "Fetching {} history for {} from Finnhub",
            period, provider_symbol
        );

        let params = [
            ("symbol", provider_symbol.as_str()),
            ("resolution", Self::resolution(period)),
            ("from", &from_ts),
            ("to", &to_ts),
        ];
        let text = self.fetch("/stock/candle", &params).await?;
        let response: CandleResponse = Self::parse(&text, "candle")?;

        if response.s == "no_data" {
            return Err(MarketDataError::NoDataForRange);
        }
        if response.s != "ok" {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("Unexpected candle status: {}", response.s),
            ));
        }

        let len = response.t.len();
        if response.c.len() != len {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                "Mismatched array lengths in candle response",
            ));
        }

        let mut bars = Vec::with_capacity(len);
        for i in 0..len {
            let Some(timestamp) = Utc.timestamp_opt(response.t[i], 0).single() else {
                warn!("Invalid timestamp at index {}: {}", i, response.t[i]);
                continue;
            };
            let Ok(close) = Decimal::try_from(response.c[i]) else {
                warn!("Invalid close price at index {}: {}", i, response.c[i]);
                continue;
            };

            bars.push(HistoricalBar {
                timestamp,
                open: response.o.get(i).and_then(|&v| Decimal::try_from(v).ok()),
                high: response.h.get(i).and_then(|&v| Decimal::try_from(v).ok()),
                low: response.l.get(i).and_then(|&v| Decimal::try_from(v).ok()),
                close,
                volume: response.v.get(i).and_then(|&v| Decimal::try_from(v).ok()),
            });
        }

        if bars.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }

        let mut series = HistoricalSeries {
            symbol: symbol.to_string(),
            period,
            currency: symbol.currency().unwrap_or("USD").to_string(),
            bars,
            source: PROVIDER_ID.to_string(),
        };
        series.normalize();
        Ok(series)
    }

    async fn search_by_isin(&self, isin: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        debug!("Searching Finnhub by ISIN {}", isin);

        let text = self.fetch("/search", &[("q", isin)]).await?;
        let response: SearchResponse = Self::parse(&text, "search")?;
        Ok(Self::to_search_results(response, Some(isin)))
    }

    async fn get_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;
        debug!("Fetching fundamentals for {} from Finnhub", provider_symbol);

        let params = [("symbol", provider_symbol.as_str()), ("metric", "all")];
        let text = self.fetch("/stock/metric", &params).await?;
        let response: MetricResponse = Self::parse(&text, "metric")?;

        let fundamentals = response
            .metric
            .map(|m| m.to_fundamentals())
            .unwrap_or_default();

        if fundamentals.is_empty() {
            return Err(MarketDataError::SymbolNotFound(provider_symbol));
        }
        Ok(fundamentals)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Map Finnhub security type to the canonical asset type.
fn map_security_type(finnhub_type: &str) -> String {
    match finnhub_type.to_lowercase().as_str() {
        "common stock" | "stock" => "EQUITY".to_string(),
        "etf" | "etp" => "ETF".to_string(),
        "mutual fund" | "fund" | "closed-end fund" => "FUND".to_string(),
        "adr" | "american depositary receipt" => "ADR".to_string(),
        "reit" => "REIT".to_string(),
        "preferred stock" | "preferred" => "PREFERRED".to_string(),
        "" => "EQUITY".to_string(),
        _ => finnhub_type.to_uppercase(),
    }
}

// ============================================================================
// Tests
// ============================================================================
