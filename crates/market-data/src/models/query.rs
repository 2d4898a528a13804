//! Query classification.
//!
//! A raw user query is one of three shapes. Classification is purely
//! lexical; market knowledge (exchanges, well-known tickers) lives in the
//! resolver module.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref ISIN_RE: Regex = Regex::new(r"^[A-Z]{2}[A-Z0-9]{10}$").unwrap();
    static ref SYMBOL_RE: Regex = Regex::new(r"^[A-Z]{1,5}([.:][A-Z]{1,4})?$").unwrap();
}

/// The lexical shape of a query.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    /// 2 letters followed by 10 alphanumerics.
    Isin,
    /// 1-5 upper-case letters, optionally with an exchange suffix.
    Symbol,
    /// Anything else, treated as a (partial) instrument name.
    Name,
}

/// A trimmed query together with its classification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    raw: String,
    kind: QueryKind,
}

impl Query {
    /// Classify a raw query. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            raw: trimmed.to_string(),
            kind: classify(trimmed),
        })
    }

    /// The trimmed query text as entered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn is_isin(&self) -> bool {
        self.kind == QueryKind::Isin
    }

    /// Identifier form used for cache keys and ISIN comparison.
    pub fn normalized(&self) -> String {
        if self.is_isin() {
            self.raw.to_uppercase()
        } else {
            self.raw.to_lowercase()
        }
    }
}

/// Classify a trimmed query string.
///
/// ISINs are matched case-insensitively since they are never ambiguous with
/// names. Symbols must be typed in upper case: "AAPL" is a symbol, "Apple" is
/// a name.
pub fn classify(query: &str) -> QueryKind {
    let trimmed = query.trim();
    if is_isin(trimmed) {
        QueryKind::Isin
    } else if SYMBOL_RE.is_match(trimmed) {
        QueryKind::Symbol
    } else {
        QueryKind::Name
    }
}

/// True if the string has the shape of an ISIN.
pub fn is_isin(value: &str) -> bool {
    ISIN_RE.is_match(&value.trim().to_uppercase())
}
