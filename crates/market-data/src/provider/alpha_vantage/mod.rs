//! Alpha Vantage market data provider.
//!
//! Endpoints used:
//! - SYMBOL_SEARCH for symbol and name search
//! - GLOBAL_QUOTE for the latest quote
//! - TIME_SERIES_DAILY for daily history
//! - OVERVIEW for fundamentals
//!
//! Free tier: 5 calls per minute, 25 per day.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{
    Fundamentals, HistoricalBar, HistoricalSeries, HistoryPeriod, Quote, SearchResult,
};
use crate::provider::{describe_listing, MarketDataProvider, ProviderCapabilities, RateLimit};
use crate::registry::RateLimiter;
use crate::resolver::{CanonicalSymbol, SymbolGrammar};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Alpha Vantage market data provider.
///
/// Covers US equities and the exchanges it has a suffix for.
/// The tight free-tier quota makes it the last resort for quotes.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limit: RateLimit,
    limiter: RateLimiter,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// SYMBOL_SEARCH response
#[derive(Debug, Deserialize)]
struct SymbolSearchResponse {
    #[serde(rename = "bestMatches")]
    best_matches: Option<Vec<SymbolMatch>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolMatch {
    #[serde(rename = "1. symbol")]
    symbol: String,
    #[serde(rename = "2. name")]
    name: String,
    #[serde(rename = "3. type", default)]
    asset_type: String,
    #[serde(rename = "8. currency")]
    currency: Option<String>,
    #[serde(rename = "9. matchScore")]
    match_score: Option<String>,
}

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Unknown symbols come back as an empty object, so every field is optional.
#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// TIME_SERIES_DAILY response for equities
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyQuote>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyQuote {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

/// OVERVIEW response for company fundamentals.
/// Only the valuation fields are mapped; the API returns many more.
#[derive(Debug, Deserialize)]
struct CompanyOverviewResponse {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,

    // Market data
    #[serde(rename = "MarketCapitalization")]
    market_capitalization: Option<String>,

    // Valuation ratios
    #[serde(rename = "PERatio")]
    pe_ratio: Option<String>,
    #[serde(rename = "TrailingPE")]
    trailing_pe: Option<String>,

    // Dividend data
    #[serde(rename = "DividendYield")]
    dividend_yield: Option<String>,

    // Technical indicators
    #[serde(rename = "52WeekHigh")]
    week_52_high: Option<String>,
    #[serde(rename = "52WeekLow")]
    week_52_low: Option<String>,

    // Error handling
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

impl CompanyOverviewResponse {
    /// Parse a string field as f64, handling "None" and "-" values
    fn parse_f64(s: &Option<String>) -> Option<f64> {
        s.as_ref()
            .filter(|v| !v.is_empty() && *v != "None" && *v != "-" && *v != "0")
            .and_then(|v| v.parse::<f64>().ok())
    }

    fn to_fundamentals(&self) -> Fundamentals {
        Fundamentals {
            market_cap: Self::parse_f64(&self.market_capitalization),
            pe_ratio: Self::parse_f64(&self.pe_ratio)
                .or_else(|| Self::parse_f64(&self.trailing_pe)),
            dividend_yield: Self::parse_f64(&self.dividend_yield),
            week_52_high: Self::parse_f64(&self.week_52_high),
            week_52_low: Self::parse_f64(&self.week_52_low),
        }
    }
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the given API key.
    pub fn new(api_key: String) -> Self {
        Self::with_config(api_key, BASE_URL, Self::default_rate_limit())
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
            requests_per_minute: 5, // Free tier is very limited
            daily_limit: Some(25),
            timeout: Duration::from_secs(30),
        }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        self.limiter.try_acquire()?;

        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER_ID, e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("HTTP {}", status),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, e.to_string()))
    }

    fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, MarketDataError> {
        serde_json::from_str(text).map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })
    }

    /// Check for API-level errors in the response.
    fn check_api_error(
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), MarketDataError> {
        if let Some(ref msg) = error_message {
            // Check if it's a "not found" type error
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::SymbolNotFound(msg.clone()));
            }
            return Err(MarketDataError::provider(PROVIDER_ID, msg.clone()));
        }

        // "Note" usually indicates rate limiting
        if let Some(ref msg) = note {
            if msg.contains("API call frequency") || msg.contains("rate limit") {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage note: {}", msg);
        }

        // "Information" can indicate various issues
        if let Some(ref msg) = information {
            if msg.contains("API call frequency") || msg.contains("rate limit") {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage info: {}", msg);
        }

        Ok(())
    }

    /// Parse a date string in YYYY-MM-DD format to DateTime<Utc>.
    fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| Utc.from_local_datetime(&dt).single())
    }

    /// Parse a decimal value from a string, tolerating a trailing '%'.
    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s.trim().trim_end_matches('%')).ok()
    }

    fn encode(symbol: &CanonicalSymbol) -> Result<String, MarketDataError> {
        symbol.encode(SymbolGrammar::AlphaVantage)
    }

    fn to_search_results(matches: Vec<SymbolMatch>) -> Vec<SearchResult> {
        matches
            .into_iter()
            .map(|m| {
                let symbol = CanonicalSymbol::decode(SymbolGrammar::AlphaVantage, &m.symbol);
                let (exchange, listing_currency) = describe_listing(&symbol);
                let mut result = SearchResult::new(
                    symbol.to_string(),
                    m.name,
                    exchange,
                    normalize_asset_type(&m.asset_type),
                );
                result.currency = m.currency.filter(|c| !c.is_empty()).or(listing_currency);
                result.score = m.match_score.and_then(|s| s.parse::<f64>().ok());
                result.add_source(PROVIDER_ID);
                result
            })
            .collect()
    }

    fn to_quote(symbol: &CanonicalSymbol, quote: GlobalQuote) -> Result<Quote, MarketDataError> {
        let price = quote
            .price
            .as_deref()
            .and_then(Self::parse_decimal)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let timestamp = quote
            .latest_trading_day
            .as_deref()
            .and_then(Self::parse_date)
            .unwrap_or_else(Utc::now);

        Ok(
            Quote::new(symbol.to_string(), price, symbol.currency().unwrap_or("USD"), PROVIDER_ID)
                .with_change(
                    quote.change.as_deref().and_then(Self::parse_decimal),
                    quote.change_percent.as_deref().and_then(Self::parse_decimal),
                )
                .with_timestamp(timestamp),
        )
    }

    fn to_bars(time_series: HashMap<String, DailyQuote>, start: DateTime<Utc>) -> Vec<HistoricalBar> {
        time_series
            .into_iter()
            .filter_map(|(date_str, daily)| {
                let timestamp = Self::parse_date(&date_str)?;
                if timestamp < start {
                    return None;
                }
                Some(HistoricalBar {
                    timestamp,
                    open: Self::parse_decimal(&daily.open),
                    high: Self::parse_decimal(&daily.high),
                    low: Self::parse_decimal(&daily.low),
                    close: Self::parse_decimal(&daily.close)?,
                    volume: Self::parse_decimal(&daily.volume),
                })
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        // Lowest precedence: smallest quota
        3
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: true,
            supports_quotes: true,
            supports_historical: true,
            supports_fundamentals: true, // Via OVERVIEW endpoint
            supports_isin_search: false,
            specialized_regions: &[],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        self.rate_limit.clone()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let text = self
            .fetch(&[("function", "SYMBOL_SEARCH"), ("keywords", query)])
            .await?;
        let response: SymbolSearchResponse = Self::parse(&text)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let results = Self::to_search_results(response.best_matches.unwrap_or_default());
        debug!(
            "Alpha Vantage: {} search results for '{}'",
            results.len(),
            query
        );
        Ok(results)
    }

    async fn get_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;

        let text = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", &provider_symbol)])
            .await?;
        let response: GlobalQuoteResponse = Self::parse(&text)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let quote = response
            .global_quote
            .ok_or_else(|| MarketDataError::SymbolNotFound(provider_symbol.clone()))?;

        Self::to_quote(symbol, quote)
    }

    async fn get_historical_data(
        &self,
        symbol: &CanonicalSymbol,
        period: HistoryPeriod,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", provider_symbol.as_str()),
            ("outputsize", "compact"), // 'full' is premium-only
        ];

        let text = self.fetch(&params).await?;
        let response: TimeSeriesResponse = Self::parse(&text)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let time_series = response.time_series.ok_or_else(|| {
            MarketDataError::SymbolNotFound(format!("No data for symbol: {}", provider_symbol))
        })?;

        let bars = Self::to_bars(time_series, period.start_from(Utc::now()));
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

        debug!(
            "Alpha Vantage: fetched {} daily bars for {}",
            series.bars.len(),
            provider_symbol
        );
        Ok(series)
    }

    async fn get_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;

        let text = self
            .fetch(&[("function", "OVERVIEW"), ("symbol", &provider_symbol)])
            .await?;
        let response: CompanyOverviewResponse = Self::parse(&text)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        // Unknown symbols return an empty object
        if response.symbol.is_none() {
            return Err(MarketDataError::SymbolNotFound(provider_symbol));
        }

        Ok(response.to_fundamentals())
    }
}

/// Map Alpha Vantage asset types ("Equity", "ETF", "Mutual Fund") to the
/// canonical vocabulary.
fn normalize_asset_type(raw: &str) -> String {
    match raw.to_uppercase().as_str() {
        "EQUITY" | "COMMON STOCK" | "" => "EQUITY".to_string(),
        "MUTUAL FUND" => "FUND".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_date() {
        let date = AlphaVantageProvider::parse_date("2024-01-15");
        assert!(date.is_some());
        let dt = date.unwrap();
        assert_eq!(dt.date_naive().to_string(), "2024-01-15");
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(AlphaVantageProvider::parse_date("invalid").is_none());
        assert!(AlphaVantageProvider::parse_date("01-15-2024").is_none());
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(AlphaVantageProvider::parse_decimal("150.25"), Some(dec!(150.25)));
        assert_eq!(AlphaVantageProvider::parse_decimal("-0.4410%"), Some(dec!(-0.4410)));
        assert!(AlphaVantageProvider::parse_decimal("invalid").is_none());
    }

    #[test]
    fn test_provider_identity() {
        let provider = AlphaVantageProvider::new("test_key".to_string());
        assert_eq!(provider.id(), "ALPHA_VANTAGE");
        assert_eq!(provider.priority(), 3);

        let caps = provider.capabilities();
        assert!(caps.supports_search);
        assert!(caps.supports_fundamentals);
        assert!(!caps.supports_isin_search);
    }

    #[test]
    fn test_rate_limit() {
        let provider = AlphaVantageProvider::new("test_key".to_string());
        let limit = provider.rate_limit();
        assert_eq!(limit.requests_per_minute, 5);
        assert_eq!(limit.daily_limit, Some(25));
    }

    #[test]
    fn test_check_api_error() {
        let rate_note = Some("Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute".to_string());
        assert!(matches!(
            AlphaVantageProvider::check_api_error(&None, &rate_note, &None),
            Err(MarketDataError::RateLimited { .. })
        ));

        let invalid = Some("Invalid API call. Please retry or visit the documentation".to_string());
        assert!(matches!(
            AlphaVantageProvider::check_api_error(&invalid, &None, &None),
            Err(MarketDataError::SymbolNotFound(_))
        ));

        assert!(AlphaVantageProvider::check_api_error(&None, &None, &None).is_ok());
    }

    #[test]
    fn test_symbol_search_parsing() {
        let json = r#"{
            "bestMatches": [
                {
                    "1. symbol": "TSCO.LON",
                    "2. name": "Tesco PLC",
                    "3. type": "Equity",
                    "4. region": "United Kingdom",
                    "5. marketOpen": "08:00",
                    "6. marketClose": "16:30",
                    "7. timezone": "UTC+01",
                    "8. currency": "GBX",
                    "9. matchScore": "0.7273"
                },
                {
                    "1. symbol": "TSCDF",
                    "2. name": "Tesco plc",
                    "3. type": "Equity",
                    "4. region": "United States",
                    "8. currency": "USD",
                    "9. matchScore": "0.7143"
                }
            ]
        }"#;

        let response: SymbolSearchResponse = serde_json::from_str(json).unwrap();
        let results = AlphaVantageProvider::to_search_results(response.best_matches.unwrap());

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].symbol, "TSCO.L");
        assert_eq!(results[0].currency.as_deref(), Some("GBX"));
        assert_eq!(results[0].score, Some(0.7273));
        assert_eq!(results[0].provenance, vec!["ALPHA_VANTAGE"]);
        assert_eq!(results[1].symbol, "TSCDF");
    }

    #[test]
    fn test_global_quote_parsing() {
        let json = r#"{
            "Global Quote": {
                "01. symbol": "IBM",
                "02. open": "186.9900",
                "05. price": "185.9200",
                "07. latest trading day": "2024-01-15",
                "08. previous close": "186.7500",
                "09. change": "-0.8300",
                "10. change percent": "-0.4444%"
            }
        }"#;

        let response: GlobalQuoteResponse = serde_json::from_str(json).unwrap();
        let symbol = CanonicalSymbol::parse("IBM");
        let quote = AlphaVantageProvider::to_quote(&symbol, response.global_quote.unwrap()).unwrap();

        assert_eq!(quote.price, dec!(185.92));
        assert_eq!(quote.change, Some(dec!(-0.83)));
        assert_eq!(quote.change_percent, Some(dec!(-0.4444)));
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.timestamp.date_naive().to_string(), "2024-01-15");
    }

    #[test]
    fn test_empty_global_quote_is_not_found() {
        let response: GlobalQuoteResponse = serde_json::from_str(r#"{"Global Quote": {}}"#).unwrap();
        let symbol = CanonicalSymbol::parse("NOPE");
        let err = AlphaVantageProvider::to_quote(&symbol, response.global_quote.unwrap()).unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    }

    #[test]
    fn test_daily_bars_are_filtered_by_start() {
        let json = r#"{
            "Time Series (Daily)": {
                "2024-01-10": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "100"},
                "2024-01-02": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.2", "5. volume": "100"}
            }
        }"#;

        let response: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        let start = AlphaVantageProvider::parse_date("2024-01-05").unwrap();
        let bars = AlphaVantageProvider::to_bars(response.time_series.unwrap(), start);

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, dec!(1.5));
        assert_eq!(bars[0].volume, Some(dec!(100)));
    }

    #[test]
    fn test_company_overview_parsing() {
        let json = r#"{
            "Symbol": "IBM",
            "AssetType": "Common Stock",
            "Name": "International Business Machines Corporation",
            "MarketCapitalization": "191234567890",
            "PERatio": "22.5",
            "DividendYield": "0.0455",
            "52WeekHigh": "199.18",
            "52WeekLow": "128.06"
        }"#;

        let response: CompanyOverviewResponse = serde_json::from_str(json).unwrap();
        let fundamentals = response.to_fundamentals();

        assert_eq!(fundamentals.market_cap, Some(191234567890.0));
        assert_eq!(fundamentals.pe_ratio, Some(22.5));
        assert_eq!(fundamentals.dividend_yield, Some(0.0455));
        assert_eq!(fundamentals.week_52_high, Some(199.18));
        assert_eq!(fundamentals.week_52_low, Some(128.06));
    }

    #[test]
    fn test_company_overview_with_none_values() {
        let json = r#"{
            "Symbol": "TEST",
            "PERatio": "None",
            "TrailingPE": "18.2",
            "DividendYield": "0"
        }"#;

        let response: CompanyOverviewResponse = serde_json::from_str(json).unwrap();
        let fundamentals = response.to_fundamentals();

        // "None" falls through to TrailingPE; "0" is treated as absent
        assert_eq!(fundamentals.pe_ratio, Some(18.2));
        assert_eq!(fundamentals.dividend_yield, None);
    }

    #[test]
    fn test_company_overview_parse_f64() {
        assert_eq!(CompanyOverviewResponse::parse_f64(&Some("123.45".to_string())), Some(123.45));
        assert_eq!(CompanyOverviewResponse::parse_f64(&Some("None".to_string())), None);
        assert_eq!(CompanyOverviewResponse::parse_f64(&Some("-".to_string())), None);
        assert_eq!(CompanyOverviewResponse::parse_f64(&Some("0".to_string())), None);
        assert_eq!(CompanyOverviewResponse::parse_f64(&Some("".to_string())), None);
        assert_eq!(CompanyOverviewResponse::parse_f64(&None), None);
    }

    #[tokio::test]
    async fn test_symbol_without_alpha_vantage_suffix_fails_resolution() {
        let provider = AlphaVantageProvider::new("test_key".to_string());
        let err = provider
            .get_quote(&CanonicalSymbol::parse("ENEL.MI"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::ResolutionFailed { .. }));
    }
}
