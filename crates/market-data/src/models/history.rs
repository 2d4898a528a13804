use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Look-back window for historical data requests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "max")]
    Max,
}

impl HistoryPeriod {
    /// Range string in the `1d`/`1mo`/`max` grammar.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::Max => "max",
        }
    }

    /// Length of the window in days. `Max` is capped at 30 years.
    pub fn days(&self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::FiveDays => 5,
            Self::OneMonth => 31,
            Self::ThreeMonths => 92,
            Self::SixMonths => 183,
            Self::OneYear => 366,
            Self::TwoYears => 731,
            Self::FiveYears => 1827,
            Self::Max => 365 * 30,
        }
    }

    /// Start of the window ending at `end`.
    pub fn start_from(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        end - Duration::days(self.days())
    }

    /// Bar interval suited to the window (intraday for one day).
    pub fn interval(&self) -> &'static str {
        match self {
            Self::OneDay => "5m",
            Self::FiveDays => "1h",
            Self::FiveYears | Self::Max => "1wk",
            _ => "1d",
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryPeriod {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(Self::OneDay),
            "5d" => Ok(Self::FiveDays),
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            "5y" => Ok(Self::FiveYears),
            "max" => Ok(Self::Max),
            other => Err(MarketDataError::InvalidQuery(format!(
                "unknown history period '{}'",
                other
            ))),
        }
    }
}

/// One OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    /// Closing price (required)
    pub close: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl HistoricalBar {
    pub fn new(timestamp: DateTime<Utc>, close: Decimal) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }
}

/// Bars for one symbol over one period, ordered by timestamp ascending.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub symbol: String,
    pub period: HistoryPeriod,
    pub currency: String,
    pub bars: Vec<HistoricalBar>,
    pub source: String,
}

impl HistoricalSeries {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Sort bars ascending and drop duplicate timestamps.
    pub fn normalize(&mut self) {
        self.bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        self.bars.dedup_by(|a, b| a.timestamp == b.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_period_round_trip_through_str() {
        for period in [
            HistoryPeriod::OneDay,
            HistoryPeriod::OneMonth,
            HistoryPeriod::FiveYears,
            HistoryPeriod::Max,
        ] {
            assert_eq!(period.as_str().parse::<HistoryPeriod>().unwrap(), period);
        }
        assert!("7w".parse::<HistoryPeriod>().is_err());
        assert_eq!("1Y".parse::<HistoryPeriod>().unwrap(), HistoryPeriod::OneYear);
    }

    #[test]
    fn test_period_serde_uses_short_form() {
        let json = serde_json::to_string(&HistoryPeriod::SixMonths).unwrap();
        assert_eq!(json, "\"6mo\"");
    }

    #[test]
    fn test_start_from() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let start = HistoryPeriod::FiveDays.start_from(end);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 25, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let mut series = HistoricalSeries {
            symbol: "AAPL".to_string(),
            period: HistoryPeriod::FiveDays,
            currency: "USD".to_string(),
            bars: vec![
                HistoricalBar::new(t2, dec!(2)),
                HistoricalBar::new(t1, dec!(1)),
                HistoricalBar::new(t2, dec!(2)),
            ],
            source: "FINNHUB".to_string(),
        };
        series.normalize();
        assert_eq!(series.bars.len(), 2);
        assert_eq!(series.bars[0].timestamp, t1);
    }
}
