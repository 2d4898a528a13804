//! JSON-driven exchange metadata registry.
//!
//! Loads `exchanges.json` at compile time via `include_str!` and builds
//! reverse-lookup indexes once via `lazy_static`. Adding an exchange, a
//! provider code or a well-known ticker is a data change only.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

// ── JSON schema ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeCatalog {
    pub exchanges: Vec<ExchangeEntry>,
    /// Well-known non-US tickers typed without a suffix → home MIC
    #[serde(default)]
    pub known_tickers: HashMap<String, String>,
    /// MICs preferred when an instrument has several listings, best first
    #[serde(default)]
    pub major_markets: Vec<String>,
}

/// Broad market region. Adapters declare specializations in these terms.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    NorthAmerica,
    Europe,
    AsiaPacific,
    LatinAmerica,
    MiddleEastAfrica,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::NorthAmerica,
        Region::Europe,
        Region::AsiaPacific,
        Region::LatinAmerica,
        Region::MiddleEastAfrica,
    ];
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeEntry {
    pub mic: String,
    pub name: String,
    /// ISO 3166 alpha-2 country code
    pub country: String,
    pub region: Region,
    pub currency: String,
    /// Canonical suffix including the dot (".MI"); empty for US venues
    #[serde(default)]
    pub suffix: String,
    /// Alternative suffixes accepted after `:` or `.` ("MIL", "BIT")
    #[serde(default)]
    pub aliases: Vec<String>,
    /// OpenFIGI `exchCode` values
    #[serde(default)]
    pub figi_codes: Vec<String>,
    /// Exchange codes reported by search endpoints ("NMS", "MIL")
    #[serde(default)]
    pub exchange_codes: Vec<String>,
    /// Alpha Vantage suffix; `None` when the venue is not covered
    #[serde(default)]
    pub alpha_vantage: Option<String>,
    /// Primary venue for issuers of this country
    #[serde(default)]
    pub home: bool,
}

impl ExchangeEntry {
    pub fn is_us(&self) -> bool {
        self.country == "US"
    }
}

// ── Registry with pre-built indexes ──────────────────────────────────────────

pub(crate) struct ExchangeRegistry {
    /// MIC → entry
    pub by_mic: HashMap<String, ExchangeEntry>,
    /// Suffix or alias without dot (upper, e.g. "MI", "MIL") → MIC
    pub suffix_to_mic: HashMap<String, String>,
    /// Provider exchange code (upper) → MIC
    pub code_to_mic: HashMap<String, String>,
    /// OpenFIGI exchCode → MIC
    pub figi_to_mic: HashMap<String, String>,
    /// Alpha Vantage suffix without dot (upper) → MIC
    pub alpha_vantage_to_mic: HashMap<String, String>,
    /// Country code → home MIC
    pub home_by_country: HashMap<String, String>,
    pub known_tickers: HashMap<String, String>,
    pub major_markets: Vec<String>,
}

lazy_static! {
    pub(crate) static ref REGISTRY: ExchangeRegistry = ExchangeRegistry::load();
}

fn strip_dot(suffix: &str) -> String {
    suffix.trim_start_matches('.').to_uppercase()
}

impl ExchangeRegistry {
    fn load() -> Self {
        let json = include_str!("exchanges.json");
        let catalog: ExchangeCatalog =
            serde_json::from_str(json).expect("exchanges.json must be valid");

        let mut by_mic = HashMap::new();
        let mut suffix_to_mic = HashMap::new();
        let mut code_to_mic = HashMap::new();
        let mut figi_to_mic = HashMap::new();
        let mut alpha_vantage_to_mic = HashMap::new();
        let mut home_by_country = HashMap::new();

        for entry in &catalog.exchanges {
            if !entry.suffix.is_empty() {
                suffix_to_mic.insert(strip_dot(&entry.suffix), entry.mic.clone());
            }
            // Aliases never shadow a canonical suffix
            for alias in &entry.aliases {
                suffix_to_mic
                    .entry(strip_dot(alias))
                    .or_insert_with(|| entry.mic.clone());
            }
            for code in &entry.exchange_codes {
                code_to_mic
                    .entry(code.to_uppercase())
                    .or_insert_with(|| entry.mic.clone());
            }
            for code in &entry.figi_codes {
                figi_to_mic.insert(code.to_uppercase(), entry.mic.clone());
            }
            if let Some(av) = entry.alpha_vantage.as_deref().filter(|s| !s.is_empty()) {
                alpha_vantage_to_mic.insert(strip_dot(av), entry.mic.clone());
            }
            if entry.home {
                home_by_country.insert(entry.country.clone(), entry.mic.clone());
            }
            by_mic.insert(entry.mic.clone(), entry.clone());
        }

        let known_tickers = catalog
            .known_tickers
            .into_iter()
            .map(|(ticker, mic)| (ticker.to_uppercase(), mic))
            .collect();

        ExchangeRegistry {
            by_mic,
            suffix_to_mic,
            code_to_mic,
            figi_to_mic,
            alpha_vantage_to_mic,
            home_by_country,
            known_tickers,
            major_markets: catalog.major_markets,
        }
    }
}

// ── Lookups ──────────────────────────────────────────────────────────────────

/// Exchange entry for a MIC.
pub fn exchange(mic: &str) -> Option<&'static ExchangeEntry> {
    REGISTRY.by_mic.get(&mic.to_uppercase())
}

/// MIC for a suffix or alias, with or without the leading dot.
pub fn mic_for_suffix(suffix: &str) -> Option<&'static str> {
    REGISTRY.suffix_to_mic.get(&strip_dot(suffix)).map(String::as_str)
}

/// MIC for an exchange code reported by a provider's search endpoint.
///
/// Falls back to treating the code as a MIC, then as a suffix alias.
pub fn mic_for_exchange_code(code: &str) -> Option<&'static str> {
    let upper = code.trim().to_uppercase();
    if let Some(mic) = REGISTRY.code_to_mic.get(&upper) {
        return Some(mic.as_str());
    }
    if let Some(entry) = REGISTRY.by_mic.get(&upper) {
        return Some(entry.mic.as_str());
    }
    mic_for_suffix(&upper)
}

/// MIC for an OpenFIGI `exchCode`.
pub fn figi_code_to_mic(code: &str) -> Option<&'static str> {
    REGISTRY.figi_to_mic.get(&code.to_uppercase()).map(String::as_str)
}

/// MIC for an Alpha Vantage suffix.
pub fn mic_for_alpha_vantage_suffix(suffix: &str) -> Option<&'static str> {
    REGISTRY
        .alpha_vantage_to_mic
        .get(&strip_dot(suffix))
        .map(String::as_str)
}

/// Home exchange of an issuer, from the ISIN country prefix.
pub fn home_mic_for_isin(isin: &str) -> Option<&'static str> {
    let country = isin.trim().get(..2)?.to_uppercase();
    REGISTRY.home_by_country.get(&country).map(String::as_str)
}

/// Home MIC of a well-known non-US ticker typed without a suffix.
pub fn known_ticker_mic(ticker: &str) -> Option<&'static str> {
    REGISTRY
        .known_tickers
        .get(&ticker.trim().to_uppercase())
        .map(String::as_str)
}

/// Position of a MIC in the major-market preference list.
pub fn major_market_rank(mic: &str) -> Option<usize> {
    REGISTRY.major_markets.iter().position(|m| m == mic)
}

/// Trading currency of a MIC.
pub fn mic_to_currency(mic: &str) -> Option<&'static str> {
    exchange(mic).map(|e| e.currency.as_str())
}

/// Display name of a MIC.
pub fn mic_to_exchange_name(mic: &str) -> Option<&'static str> {
    exchange(mic).map(|e| e.name.as_str())
}

/// Country of a MIC.
pub fn mic_to_country(mic: &str) -> Option<&'static str> {
    exchange(mic).map(|e| e.country.as_str())
}
