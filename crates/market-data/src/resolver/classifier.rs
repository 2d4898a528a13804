//! Domestic vs regional classification of queries.

use std::collections::HashMap;

use crate::models::{Query, QueryKind};

use super::exchange_registry::{exchange, known_ticker_mic, Region};
use super::symbol::CanonicalSymbol;

/// Where a query most likely trades.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MarketClass {
    /// US listing or no market signal at all.
    Domestic,
    /// A non-US listing, with the venue the signal pointed at.
    Regional {
        mic: String,
        region: Region,
        symbol: CanonicalSymbol,
    },
}

impl MarketClass {
    /// True when a region specialist should be tried before fanning out.
    pub fn is_region_specialized(&self) -> bool {
        matches!(self, Self::Regional { .. })
    }

    pub fn region(&self) -> Option<Region> {
        match self {
            Self::Domestic => None,
            Self::Regional { region, .. } => Some(*region),
        }
    }
}

/// Decides whether a query targets a non-US market.
///
/// Two signals are used: an explicit exchange suffix (`ENEL.MI`,
/// `ENEL:MIL`) and the table of well-known non-US tickers from the
/// exchange catalog. Extra tickers can be layered on from configuration.
#[derive(Clone, Debug, Default)]
pub struct MarketClassifier {
    extra_tickers: HashMap<String, String>,
}

impl MarketClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add ticker → MIC pairs on top of the built-in table.
    pub fn with_extra_tickers<I, K, V>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (ticker, mic) in tickers {
            self.extra_tickers
                .insert(ticker.into().to_uppercase(), mic.into().to_uppercase());
        }
        self
    }

    fn ticker_mic(&self, ticker: &str) -> Option<String> {
        self.extra_tickers
            .get(ticker)
            .cloned()
            .or_else(|| known_ticker_mic(ticker).map(str::to_string))
    }

    pub fn classify(&self, query: &Query) -> MarketClass {
        let symbol = match query.kind() {
            QueryKind::Isin => return MarketClass::Domestic,
            QueryKind::Symbol => CanonicalSymbol::parse(query.as_str()),
            // A single word may still be a well-known ticker typed in mixed case
            QueryKind::Name => {
                let text = query.as_str();
                if text.contains(char::is_whitespace) {
                    return MarketClass::Domestic;
                }
                CanonicalSymbol::parse(text)
            }
        };

        let symbol = match symbol.mic {
            Some(_) => symbol,
            None => match self.ticker_mic(&symbol.ticker) {
                Some(mic) => symbol.with_mic(mic),
                None => return MarketClass::Domestic,
            },
        };

        let Some(mic) = symbol.mic.clone() else {
            return MarketClass::Domestic;
        };
        match exchange(&mic) {
            Some(entry) if !entry.is_us() => MarketClass::Regional {
                mic,
                region: entry.region,
                symbol,
            },
            _ => MarketClass::Domestic,
        }
    }
}
