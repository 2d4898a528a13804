//! Yahoo Finance quoteSummary response models.
//!
//! The chart endpoints used through `yahoo_finance_api` carry prices only;
//! quoteSummary adds the previous-close figures and valuation metrics.

use serde::Deserialize;

use crate::models::Fundamentals;

/// Main response wrapper for quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

/// Quote summary container
#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    #[serde(default)]
    pub result: Vec<YahooQuoteSummaryResult>,
}

/// Individual result from quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResult {
    pub price: Option<YahooPriceData>,
    pub summary_detail: Option<YahooSummaryDetail>,
}

/// Price module
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooPriceData {
    pub currency: Option<String>,
    pub regular_market_price: Option<YahooPriceDetail>,
    pub regular_market_change: Option<YahooPriceDetail>,
    /// Fraction, 0.0123 = +1.23%
    pub regular_market_change_percent: Option<YahooPriceDetail>,
    pub regular_market_time: Option<i64>,
}

/// Value with raw and formatted forms; only `raw` is used.
/// Yahoo sends `{}` when a figure is unavailable.
#[derive(Debug, Deserialize, Clone)]
pub struct YahooPriceDetail {
    pub raw: Option<f64>,
}

/// Summary detail module (valuation metrics)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSummaryDetail {
    pub market_cap: Option<YahooPriceDetail>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<YahooPriceDetail>,
    pub dividend_yield: Option<YahooPriceDetail>,
    pub fifty_two_week_high: Option<YahooPriceDetail>,
    pub fifty_two_week_low: Option<YahooPriceDetail>,
}

fn raw(detail: &Option<YahooPriceDetail>) -> Option<f64> {
    detail.as_ref().and_then(|d| d.raw)
}

impl YahooSummaryDetail {
    pub fn to_fundamentals(&self) -> Fundamentals {
        Fundamentals {
            market_cap: raw(&self.market_cap),
            pe_ratio: raw(&self.trailing_pe),
            dividend_yield: raw(&self.dividend_yield),
            week_52_high: raw(&self.fifty_two_week_high),
            week_52_low: raw(&self.fifty_two_week_low),
        }
    }
}

impl YahooPriceData {
    pub fn price(&self) -> Option<f64> {
        raw(&self.regular_market_price)
    }

    pub fn change(&self) -> Option<f64> {
        raw(&self.regular_market_change)
    }

    /// Change in percent points (1.23 = +1.23%).
    pub fn change_percent(&self) -> Option<f64> {
        raw(&self.regular_market_change_percent).map(|f| f * 100.0)
    }
}
