//! Yahoo Finance market data provider.
//!
//! This provider uses the Yahoo Finance API to fetch:
//! - Search results for tickers, names and ISINs
//! - Latest quotes with change versus previous close
//! - Historical bars for any look-back period
//! - Valuation figures through quoteSummary
//!
//! Yahoo lists nearly every exchange under its own suffix grammar
//! (ENEL.MI, VOD.L, 7203.T), which makes it the regional specialist.

mod models;

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use num_traits::FromPrimitive;
use reqwest::header;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, warn};
use urlencoding::encode;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{
    Fundamentals, HistoricalBar, HistoricalSeries, HistoryPeriod, Quote, SearchResult,
};
use crate::provider::{describe_listing, MarketDataProvider, ProviderCapabilities, RateLimit};
use crate::registry::RateLimiter;
use crate::resolver::{mic_for_exchange_code, CanonicalSymbol, Region, SymbolGrammar};

use models::{YahooQuoteSummaryResponse, YahooQuoteSummaryResult};

const PROVIDER_ID: &str = "YAHOO";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Cached Yahoo authentication data
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

lazy_static! {
    /// Global cache for Yahoo authentication crumb
    static ref YAHOO_CRUMB: RwLock<Option<CrumbData>> = RwLock::default();
}

fn provider_error(message: impl Into<String>) -> MarketDataError {
    MarketDataError::provider(PROVIDER_ID, message)
}

fn map_yahoo_error(symbol: &str, e: yahoo::YahooError) -> MarketDataError {
    if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
        MarketDataError::SymbolNotFound(symbol.to_string())
    } else {
        provider_error(e.to_string())
    }
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    client: reqwest::Client,
    rate_limit: RateLimit,
    limiter: RateLimiter,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub async fn new() -> Result<Self, MarketDataError> {
        Self::with_rate_limit(Self::default_rate_limit()).await
    }

    pub async fn with_rate_limit(rate_limit: RateLimit) -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| provider_error(format!("Failed to initialize Yahoo connector: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(rate_limit.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            connector,
            client,
            limiter: RateLimiter::new(PROVIDER_ID, &rate_limit),
            rate_limit,
        })
    }

    pub fn default_rate_limit() -> RateLimit {
        RateLimit {
            requests_per_minute: 2000,
            daily_limit: None,
            timeout: Duration::from_secs(10),
        }
    }

    fn encode(symbol: &CanonicalSymbol) -> Result<String, MarketDataError> {
        symbol.encode(SymbolGrammar::Yahoo)
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    /// Ensure we have a valid Yahoo authentication crumb.
    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        {
            let guard = YAHOO_CRUMB.read().unwrap_or_else(|poisoned| {
                warn!("Yahoo crumb lock poisoned, recovering");
                poisoned.into_inner()
            });
            if let Some(crumb) = guard.as_ref() {
                return Ok(crumb.clone());
            }
        }

        self.fetch_crumb().await
    }

    /// Fetch a new Yahoo authentication crumb.
    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self
            .client
            .get("https://fc.yahoo.com")
            .send()
            .await
            .map_err(|e| provider_error(format!("Failed to get cookie: {}", e)))?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| provider_error("Failed to parse Yahoo cookie"))?;

        // Step 2: Get crumb using cookie
        let crumb = self
            .client
            .get("https://query1.finance.yahoo.com/v1/test/getcrumb")
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| provider_error(format!("Failed to get crumb: {}", e)))?
            .text()
            .await
            .map_err(|e| provider_error(format!("Failed to read crumb: {}", e)))?;

        let crumb_data = CrumbData { cookie, crumb };

        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    /// Clear the cached crumb (used when authentication fails)
    fn clear_crumb(&self) {
        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }

    /// Fetch quoteSummary modules for a symbol.
    async fn fetch_quote_summary(
        &self,
        symbol: &str,
        modules: &str,
    ) -> Result<YahooQuoteSummaryResult, MarketDataError> {
        let crumb = self.ensure_crumb().await?;

        let url = format!(
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}?modules={}&crumb={}",
            encode(symbol),
            modules,
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    provider_error(format!("quoteSummary request failed: {}", e))
                }
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_crumb();
            return Err(provider_error("Yahoo authentication expired"));
        }
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        let data: YahooQuoteSummaryResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("Failed to parse quoteSummary response: {}", e)))?;

        data.quote_summary
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// Convert chrono DateTime<Utc> to time::OffsetDateTime for the Yahoo API.
    fn chrono_to_offset_datetime(dt: DateTime<Utc>) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(dt.timestamp())
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    fn to_bar(yahoo_quote: &yahoo::Quote) -> Option<HistoricalBar> {
        let timestamp = Utc.timestamp_opt(yahoo_quote.timestamp as i64, 0).single()?;
        let close = Decimal::from_f64_retain(yahoo_quote.close)?;

        Some(HistoricalBar {
            timestamp,
            open: Decimal::from_f64_retain(yahoo_quote.open),
            high: Decimal::from_f64_retain(yahoo_quote.high),
            low: Decimal::from_f64_retain(yahoo_quote.low),
            close,
            volume: Decimal::from_u64(yahoo_quote.volume),
        })
    }

    /// Latest quote from daily bars: the last close against the one before.
    fn quote_from_bars(
        symbol: &CanonicalSymbol,
        bars: &[HistoricalBar],
    ) -> Result<Quote, MarketDataError> {
        let last = bars
            .last()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let (change, change_percent) = match bars.len().checked_sub(2).map(|i| &bars[i]) {
            Some(previous) if !previous.close.is_zero() => {
                let change = last.close - previous.close;
                let pct = change / previous.close * Decimal::ONE_HUNDRED;
                (Some(change.round_dp(4)), Some(pct.round_dp(4)))
            }
            _ => (None, None),
        };

        Ok(
            Quote::new(symbol.to_string(), last.close, currency_of(symbol), PROVIDER_ID)
                .with_change(change, change_percent)
                .with_timestamp(last.timestamp),
        )
    }

    fn to_search_result(item: &yahoo::YQuoteItem) -> SearchResult {
        let mut symbol = CanonicalSymbol::decode(SymbolGrammar::Yahoo, &item.symbol);
        if symbol.mic.is_none() {
            if let Some(mic) = mic_for_exchange_code(&item.exchange) {
                symbol = symbol.with_mic(mic);
            }
        }
        let (exchange, currency) = describe_listing(&symbol);

        let mut result = SearchResult::new(
            symbol.to_string(),
            format_name(
                Some(&item.long_name),
                &item.quote_type,
                Some(&item.short_name),
                &item.symbol,
            ),
            exchange,
            map_quote_type(&item.quote_type),
        )
        .with_score(item.score);
        result.currency = currency;
        result.add_source(PROVIDER_ID);
        result
    }

    /// Primary quote path: the last five daily bars.
    async fn fetch_quote_from_chart(
        &self,
        symbol: &CanonicalSymbol,
        provider_symbol: &str,
    ) -> Result<Quote, MarketDataError> {
        let response = self
            .connector
            .get_quote_range(provider_symbol, "1d", "5d")
            .await
            .map_err(|e| map_yahoo_error(provider_symbol, e))?;

        let quotes = response
            .quotes()
            .map_err(|e| map_yahoo_error(provider_symbol, e))?;
        let bars: Vec<HistoricalBar> = quotes.iter().filter_map(Self::to_bar).collect();

        Self::quote_from_bars(symbol, &bars)
    }

    /// Backup quote path: quoteSummary price module.
    async fn fetch_quote_from_summary(
        &self,
        symbol: &CanonicalSymbol,
        provider_symbol: &str,
    ) -> Result<Quote, MarketDataError> {
        let result = self.fetch_quote_summary(provider_symbol, "price").await?;
        let price = result
            .price
            .ok_or_else(|| MarketDataError::SymbolNotFound(provider_symbol.to_string()))?;

        let close = price
            .price()
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| provider_error("No valid price in quoteSummary response"))?;

        let timestamp = price
            .regular_market_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        // The listing MIC decides the currency; the response is a fallback
        let currency = symbol
            .currency()
            .map(str::to_string)
            .or(price.currency.clone())
            .unwrap_or_else(|| "USD".to_string());

        Ok(Quote::new(symbol.to_string(), close, currency, PROVIDER_ID)
            .with_change(
                price.change().and_then(Decimal::from_f64_retain),
                price.change_percent().and_then(Decimal::from_f64_retain),
            )
            .with_timestamp(timestamp))
    }
}

fn currency_of(symbol: &CanonicalSymbol) -> &'static str {
    symbol.currency().unwrap_or("USD")
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: true,
            supports_quotes: true,
            supports_historical: true,
            supports_fundamentals: true,
            // search_ticker accepts ISINs
            supports_isin_search: true,
            specialized_regions: &Region::ALL,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        self.rate_limit.clone()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        self.limiter.try_acquire()?;
        debug!("Searching Yahoo for '{}'", query);

        let result = self
            .connector
            .search_ticker(&encode(query))
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        Ok(result.quotes.iter().map(Self::to_search_result).collect())
    }

    async fn get_quote(&self, symbol: &CanonicalSymbol) -> Result<Quote, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;
        self.limiter.try_acquire()?;

        debug!("Fetching latest quote for {} from Yahoo", provider_symbol);

        match self.fetch_quote_from_chart(symbol, &provider_symbol).await {
            Ok(quote) => return Ok(quote),
            Err(e) => {
                debug!(
                    "Chart quote fetch failed for {}: {}, trying quoteSummary",
                    provider_symbol, e
                );
            }
        }

        self.fetch_quote_from_summary(symbol, &provider_symbol).await
    }

    async fn get_historical_data(
        &self,
        symbol: &CanonicalSymbol,
        period: HistoryPeriod,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;
        self.limiter.try_acquire()?;

        let end = Utc::now();
        let start = period.start_from(end);

        debug!(
            "Fetching {} history for {} from {} from Yahoo",
            period,
            provider_symbol,
            start.format("%Y-%m-%d")
        );

        let response = self
            .connector
            .get_quote_history_interval(
                &provider_symbol,
                Self::chrono_to_offset_datetime(start),
                Self::chrono_to_offset_datetime(end),
                period.interval(),
            )
            .await
            .map_err(|e| map_yahoo_error(&provider_symbol, e))?;

        let bars: Vec<HistoricalBar> = match response.quotes() {
            Ok(yahoo_quotes) => yahoo_quotes.iter().filter_map(Self::to_bar).collect(),
            Err(yahoo::YahooError::NoQuotes) => {
                warn!(
                    "No historical quotes returned for '{}' over {}",
                    provider_symbol, period
                );
                return Err(MarketDataError::NoDataForRange);
            }
            Err(e) => return Err(provider_error(e.to_string())),
        };

        if bars.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }

        let mut series = HistoricalSeries {
            symbol: symbol.to_string(),
            period,
            currency: currency_of(symbol).to_string(),
            bars,
            source: PROVIDER_ID.to_string(),
        };
        series.normalize();
        Ok(series)
    }

    async fn search_by_isin(&self, isin: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let results = self.search(isin).await?;
        Ok(results
            .into_iter()
            .map(|r| r.with_isin(isin.to_uppercase()))
            .collect())
    }

    async fn get_fundamentals(
        &self,
        symbol: &CanonicalSymbol,
    ) -> Result<Fundamentals, MarketDataError> {
        let provider_symbol = Self::encode(symbol)?;
        self.limiter.try_acquire()?;

        debug!("Fetching fundamentals for {} from Yahoo", provider_symbol);

        let result = self
            .fetch_quote_summary(&provider_symbol, "summaryDetail")
            .await?;
        let fundamentals = result
            .summary_detail
            .map(|d| d.to_fundamentals())
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

/// Clean up fund names by removing common prefixes.
fn format_name(
    long_name: Option<&str>,
    quote_type: &str,
    short_name: Option<&str>,
    symbol: &str,
) -> String {
    let mut name = long_name.unwrap_or("").to_string();

    if !name.is_empty() {
        let replacements = [
            ("&amp;", "&"),
            ("Amundi Index Solutions - ", ""),
            ("iShares III Public Limited Company - ", ""),
            ("iShares V PLC - ", ""),
            ("iShares VII PLC - ", ""),
            ("Vanguard Funds Public Limited Company - ", ""),
            ("Xtrackers (IE) Plc - ", ""),
        ];

        for (from, to) in &replacements {
            name = name.replace(from, to);
        }
    }

    // Futures carry a date suffix in the short name
    if quote_type.eq_ignore_ascii_case("FUTURE") {
        let stem = short_name
            .and_then(|sn| sn.char_indices().rev().nth(6).map(|(i, _)| &sn[..i]));
        if let Some(stem) = stem {
            return stem.to_string();
        }
    }

    if name.is_empty() {
        short_name
            .filter(|s| !s.is_empty())
            .unwrap_or(symbol)
            .to_string()
    } else {
        name
    }
}

fn map_quote_type(quote_type: &str) -> String {
    match quote_type.to_uppercase().as_str() {
        "MUTUALFUND" => "FUND".to_string(),
        "" => "EQUITY".to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: Decimal) -> HistoricalBar {
        HistoricalBar::new(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(), close)
    }

    #[test]
    fn test_format_name() {
        assert_eq!(
            format_name(
                Some("iShares VII PLC - iShares Core S&P 500"),
                "ETF",
                None,
                "CSPX.L"
            ),
            "iShares Core S&P 500"
        );
        assert_eq!(
            format_name(Some("Procter &amp; Gamble"), "EQUITY", None, "PG"),
            "Procter & Gamble"
        );
        assert_eq!(format_name(None, "EQUITY", Some(""), "ENEL.MI"), "ENEL.MI");
        assert_eq!(
            format_name(None, "FUTURE", Some("Gold Jun 24"), "GC=F"),
            "Gold"
        );
    }

    #[test]
    fn test_format_name_future_multibyte() {
        assert_eq!(
            format_name(None, "FUTURE", Some("Café Dec 24"), "KC=F"),
            "Café"
        );
        assert_eq!(
            format_name(None, "FUTURE", Some("Goldé un 24"), "BZ=F"),
            "Gold"
        );
        assert_eq!(format_name(None, "FUTURE", Some("Gé"), "BZ=F"), "Gé");
    }

    #[test]
    fn test_map_quote_type() {
        assert_eq!(map_quote_type("equity"), "EQUITY");
        assert_eq!(map_quote_type("MUTUALFUND"), "FUND");
        assert_eq!(map_quote_type("ETF"), "ETF");
    }

    #[test]
    fn test_quote_from_bars_computes_change() {
        let symbol = CanonicalSymbol::parse("ENEL.MI");
        let bars = vec![bar(2, dec!(6.40)), bar(3, dec!(6.50))];

        let quote = YahooProvider::quote_from_bars(&symbol, &bars).unwrap();
        assert_eq!(quote.symbol, "ENEL.MI");
        assert_eq!(quote.price, dec!(6.50));
        assert_eq!(quote.change, Some(dec!(0.10)));
        assert_eq!(quote.change_percent, Some(dec!(1.5625)));
        assert_eq!(quote.currency, "EUR");
        assert_eq!(quote.source, "YAHOO");
    }

    #[test]
    fn test_quote_from_single_bar_has_no_change() {
        let symbol = CanonicalSymbol::parse("AAPL");
        let quote = YahooProvider::quote_from_bars(&symbol, &[bar(3, dec!(190))]).unwrap();
        assert_eq!(quote.currency, "USD");
        assert!(quote.change.is_none());
    }

    #[test]
    fn test_quote_from_no_bars_is_not_found() {
        let symbol = CanonicalSymbol::parse("NOPE");
        let err = YahooProvider::quote_from_bars(&symbol, &[]).unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    }

    #[tokio::test]
    async fn test_capabilities() {
        let provider = YahooProvider::new().await.unwrap();
        assert_eq!(provider.id(), "YAHOO");
        assert_eq!(provider.priority(), 1);

        let caps = provider.capabilities();
        assert!(caps.supports_search);
        assert!(caps.supports_isin_search);
        assert!(caps.specializes_in(Region::Europe));
        assert!(caps.specializes_in(Region::AsiaPacific));
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let provider = YahooProvider::new().await.unwrap();
        let limit = provider.rate_limit();
        assert_eq!(limit.requests_per_minute, 2000);
        assert!(limit.daily_limit.is_none());
    }
}
