//! Canonical symbol form and per-provider encodings.
//!
//! Internally every listing is a ticker plus an optional MIC. Each adapter
//! speaks its own suffix grammar; conversions happen here and nowhere else.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

use super::exchange_registry::{
    exchange, mic_for_alpha_vantage_suffix, mic_for_exchange_code, mic_for_suffix,
};

/// Suffix grammar spoken by a provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolGrammar {
    /// `TICKER.SUFFIX` with the canonical suffixes (".MI", ".L", ".DE").
    Yahoo,
    /// Same suffixes as Yahoo for the venues it covers.
    Finnhub,
    /// `TICKER.SUFFIX` with Alpha Vantage's own suffixes (".LON", ".DEX").
    AlphaVantage,
}

impl SymbolGrammar {
    fn provider_id(&self) -> &'static str {
        match self {
            Self::Yahoo => "YAHOO",
            Self::Finnhub => "FINNHUB",
            Self::AlphaVantage => "ALPHA_VANTAGE",
        }
    }
}

/// A listing identified by ticker and (optionally) exchange.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CanonicalSymbol {
    pub ticker: String,
    /// `None` for US listings typed without a venue.
    pub mic: Option<String>,
}

impl CanonicalSymbol {
    pub fn new(ticker: impl Into<String>, mic: Option<String>) -> Self {
        Self {
            ticker: ticker.into().trim().to_uppercase(),
            mic,
        }
    }

    /// Parse user or provider input.
    ///
    /// Accepts `ENEL`, `ENEL.MI` and `ENEL:MIL`. A dot suffix that is not a
    /// known exchange stays part of the ticker, so `BRK.B` is a US share
    /// class rather than an unknown venue.
    pub fn parse(input: &str) -> Self {
        let upper = input.trim().to_uppercase();

        if let Some((ticker, venue)) = upper.split_once(':') {
            let mic = mic_for_suffix(venue)
                .or_else(|| mic_for_exchange_code(venue))
                .map(str::to_string);
            return Self::new(ticker, mic);
        }

        if let Some(pos) = upper.rfind('.') {
            let (ticker, suffix) = (&upper[..pos], &upper[pos + 1..]);
            if !ticker.is_empty() {
                if let Some(mic) = mic_for_suffix(suffix) {
                    return Self::new(ticker, Some(mic.to_string()));
                }
            }
        }

        Self::new(upper, None)
    }

    pub fn with_mic(mut self, mic: impl Into<String>) -> Self {
        self.mic = Some(mic.into());
        self
    }

    /// True for symbols without a venue or listed on a US venue.
    pub fn is_domestic(&self) -> bool {
        match self.mic.as_deref() {
            None => true,
            Some(mic) => exchange(mic).map_or(false, |e| e.is_us()),
        }
    }

    /// Trading currency of the listing, when the venue is known.
    pub fn currency(&self) -> Option<&'static str> {
        self.mic.as_deref().and_then(super::mic_to_currency)
    }

    /// Render the symbol in a provider's grammar.
    pub fn encode(&self, grammar: SymbolGrammar) -> Result<String, MarketDataError> {
        let Some(entry) = self.mic.as_deref().and_then(exchange) else {
            return Ok(self.ticker.clone());
        };
        if entry.is_us() {
            return Ok(self.ticker.clone());
        }

        match grammar {
            SymbolGrammar::Yahoo | SymbolGrammar::Finnhub => {
                Ok(format!("{}{}", self.ticker, entry.suffix))
            }
            SymbolGrammar::AlphaVantage => match entry.alpha_vantage.as_deref() {
                Some(suffix) if !suffix.is_empty() => Ok(format!("{}{}", self.ticker, suffix)),
                _ => Err(MarketDataError::ResolutionFailed {
                    provider: grammar.provider_id().to_string(),
                    symbol: self.to_string(),
                }),
            },
        }
    }

    /// Parse a symbol reported by a provider back into canonical form.
    pub fn decode(grammar: SymbolGrammar, raw: &str) -> Self {
        match grammar {
            SymbolGrammar::AlphaVantage => {
                let upper = raw.trim().to_uppercase();
                if let Some((ticker, suffix)) = upper.rsplit_once('.') {
                    if let Some(mic) = mic_for_alpha_vantage_suffix(suffix) {
                        return Self::new(ticker, Some(mic.to_string()));
                    }
                }
                Self::parse(&upper)
            }
            SymbolGrammar::Yahoo | SymbolGrammar::Finnhub => Self::parse(raw),
        }
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = self
            .mic
            .as_deref()
            .and_then(exchange)
            .map(|e| e.suffix.as_str())
            .unwrap_or("");
        write!(f, "{}{}", self.ticker, suffix)
    }
}
