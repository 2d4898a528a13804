use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Valuation and range figures for an instrument.
///
/// Every field is optional: providers disagree on which ones they publish.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,

    /// Dividend yield as a fraction (0.035 = 3.5%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,

    #[serde(rename = "week52High", skip_serializing_if = "Option::is_none")]
    pub week_52_high: Option<f64>,

    #[serde(rename = "week52Low", skip_serializing_if = "Option::is_none")]
    pub week_52_low: Option<f64>,
}

impl Fundamentals {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.market_cap.is_none()
            && self.pe_ratio.is_none()
            && self.dividend_yield.is_none()
            && self.week_52_high.is_none()
            && self.week_52_low.is_none()
    }

    /// Fill absent fields from `other`. Present fields are never replaced.
    pub fn fill_from(&mut self, other: &Fundamentals) {
        self.market_cap = self.market_cap.or(other.market_cap);
        self.pe_ratio = self.pe_ratio.or(other.pe_ratio);
        self.dividend_yield = self.dividend_yield.or(other.dividend_yield);
        self.week_52_high = self.week_52_high.or(other.week_52_high);
        self.week_52_low = self.week_52_low.or(other.week_52_low);
    }
}

/// Latest market quote in the canonical schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Canonical symbol (e.g., "AAPL", "ENEL.MI")
    pub symbol: String,

    /// Last traded / closing price
    pub price: Decimal,

    /// Absolute change versus previous close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,

    /// Percentage change versus previous close (1.5 = +1.5%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<Decimal>,

    /// Quote currency
    pub currency: String,

    #[serde(flatten)]
    pub fundamentals: Fundamentals,

    /// Timestamp of the quote
    pub timestamp: DateTime<Utc>,

    /// Provider that produced the price (YAHOO, FINNHUB, ...)
    pub source: String,
}

impl Quote {
    /// Create a new quote with minimal required fields
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        currency: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: None,
            change_percent: None,
            currency: currency.into(),
            fundamentals: Fundamentals::default(),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    /// Set change and percent change.
    pub fn with_change(mut self, change: Option<Decimal>, change_percent: Option<Decimal>) -> Self {
        self.change = change;
        self.change_percent = change_percent;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_fundamentals(&self) -> bool {
        !self.fundamentals.is_empty()
    }

    /// Combine a fundamentals-only payload into this quote, field by field.
    pub fn merge_fundamentals(&mut self, other: &Fundamentals) {
        self.fundamentals.fill_from(other);
    }
}
