//! Exchange knowledge and symbol normalization.
//!
//! Canonical form is a ticker plus an optional MIC:
//!
//! ```text
//!   user / provider input          canonical              provider grammar
//!   ─────────────────────          ─────────              ────────────────
//!   ENEL.MI, ENEL:MIL, ENEL   →    (ENEL, XMIL)    →      Yahoo:  ENEL.MI
//!   VOD.LON (Alpha Vantage)   →    (VOD, XLON)     →      Yahoo:  VOD.L
//!   AAPL, AAPL:NASDAQ         →    (AAPL, XNAS?)   →      all:    AAPL
//! ```
//!
//! Exchange metadata, well-known tickers and major-market preferences are
//! data in `exchanges.json`, not code.

mod classifier;
mod exchange_registry;
mod symbol;

pub use classifier::{MarketClass, MarketClassifier};
pub use exchange_registry::{
    exchange, figi_code_to_mic, home_mic_for_isin, known_ticker_mic, major_market_rank,
    mic_for_alpha_vantage_suffix, mic_for_exchange_code, mic_for_suffix, mic_to_country,
    mic_to_currency, mic_to_exchange_name, ExchangeEntry, Region,
};
pub use symbol::{CanonicalSymbol, SymbolGrammar};
