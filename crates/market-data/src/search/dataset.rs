//! Local instrument snapshot.
//!
//! The snapshot is produced outside this crate and loaded from a JSON file
//! of the form `{"generatedAt": "...", "instruments": [...]}`. Readers hold
//! an `Arc` to the snapshot they started with; a reload swaps in a new one
//! without blocking them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::errors::MarketDataError;
use crate::models::{Query, SearchResult};

pub const LOCAL_SOURCE: &str = "LOCAL";
pub const EXACT_ISIN_SCORE: f64 = 100.0;
pub const SUBSTRING_SCORE: f64 = 50.0;

/// One row of the local dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalInstrument {
    pub isin: String,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl LocalInstrument {
    fn to_result(&self, score: f64) -> SearchResult {
        let mut result = SearchResult::new(
            self.symbol.clone(),
            self.name.clone(),
            self.exchange.clone().unwrap_or_default(),
            self.asset_type.clone(),
        )
        .with_isin(self.isin.clone())
        .with_score(score);
        result.currency = self.currency.clone();
        result.price = self.price;
        result.add_source(LOCAL_SOURCE);
        result
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSnapshot {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub instruments: Vec<LocalInstrument>,
}

/// In-memory instrument dataset with atomic reload.
pub struct LocalDataset {
    path: Option<PathBuf>,
    snapshot: RwLock<Arc<DatasetSnapshot>>,
}

impl LocalDataset {
    /// A dataset with no rows and no backing file.
    pub fn empty() -> Self {
        Self::from_instruments(Vec::new())
    }

    pub fn from_instruments(instruments: Vec<LocalInstrument>) -> Self {
        Self {
            path: None,
            snapshot: RwLock::new(Arc::new(DatasetSnapshot {
                generated_at: None,
                instruments,
            })),
        }
    }

    /// Load the snapshot at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MarketDataError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_snapshot(&path).await?;
        info!(
            "Loaded {} instruments from {}",
            snapshot.instruments.len(),
            path.display()
        );

        Ok(Self {
            path: Some(path),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Re-read the backing file and swap it in. On failure the current
    /// snapshot stays in place.
    pub async fn reload(&self) -> Result<usize, MarketDataError> {
        let Some(path) = &self.path else {
            return Ok(self.len());
        };

        let snapshot = read_snapshot(path).await?;
        let count = snapshot.instruments.len();
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(snapshot);

        debug!("Dataset reloaded: {} instruments", count);
        Ok(count)
    }

    /// Reload the snapshot every `every`. The task lives until aborted.
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let dataset = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick fires immediately; the snapshot is already fresh
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = dataset.reload().await {
                    warn!("Dataset refresh failed, keeping previous snapshot: {}", e);
                }
            }
        })
    }

    pub fn snapshot(&self) -> Arc<DatasetSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.snapshot().instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows matching the query.
    ///
    /// An ISIN equal to the query scores 100; a case-insensitive substring
    /// of the symbol, name or ISIN scores 50. Each row appears once.
    pub fn search(&self, query: &Query) -> Vec<SearchResult> {
        let snapshot = self.snapshot();
        let needle = query.as_str().to_lowercase();
        let isin = query.is_isin().then(|| query.normalized());

        snapshot
            .instruments
            .iter()
            .filter_map(|row| {
                if isin.as_deref() == Some(row.isin.to_uppercase().as_str()) {
                    return Some(row.to_result(EXACT_ISIN_SCORE));
                }
                let hit = row.symbol.to_lowercase().contains(&needle)
                    || row.name.to_lowercase().contains(&needle)
                    || row.isin.to_lowercase().contains(&needle);
                hit.then(|| row.to_result(SUBSTRING_SCORE))
            })
            .collect()
    }
}

async fn read_snapshot(path: &Path) -> Result<DatasetSnapshot, MarketDataError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MarketDataError::Dataset(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| MarketDataError::Dataset(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "generatedAt": "2024-05-01T00:00:00Z",
        "instruments": [
            {"isin": "IT0003128367", "symbol": "ENEL.MI", "name": "Enel SpA", "type": "EQUITY", "exchange": "Borsa Italiana", "currency": "EUR", "price": 6.52},
            {"isin": "IE00B4L5Y983", "symbol": "SWDA.MI", "name": "iShares Core MSCI World", "type": "ETF", "currency": "EUR"}
        ]
    }"#;

    fn write_snapshot(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_exact_isin_scores_highest() {
        let file = write_snapshot(SNAPSHOT);
        let dataset = LocalDataset::load(file.path()).await.unwrap();

        let results = dataset.search(&Query::parse("it0003128367").unwrap());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, Some(EXACT_ISIN_SCORE));
        assert_eq!(results[0].price, Some(dec!(6.52)));
        assert_eq!(results[0].provenance, vec![LOCAL_SOURCE]);
    }

    #[tokio::test]
    async fn test_substring_match() {
        let file = write_snapshot(SNAPSHOT);
        let dataset = LocalDataset::load(file.path()).await.unwrap();

        let results = dataset.search(&Query::parse("msci").unwrap());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "SWDA.MI");
        assert_eq!(results[0].score, Some(SUBSTRING_SCORE));
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let file = write_snapshot(SNAPSHOT);
        let dataset = LocalDataset::load(file.path()).await.unwrap();
        let before = dataset.snapshot();

        std::fs::write(file.path(), r#"{"instruments": []}"#).unwrap();
        assert_eq!(dataset.reload().await.unwrap(), 0);

        // Readers holding the old snapshot keep it
        assert_eq!(before.instruments.len(), 2);
        assert!(dataset.is_empty());
    }

    #[tokio::test]
    async fn test_broken_reload_keeps_previous() {
        let file = write_snapshot(SNAPSHOT);
        let dataset = LocalDataset::load(file.path()).await.unwrap();

        std::fs::write(file.path(), "not json").unwrap();
        assert!(matches!(dataset.reload().await, Err(MarketDataError::Dataset(_))));
        assert_eq!(dataset.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = LocalDataset::load("/nonexistent/instruments.json").await;
        assert!(matches!(result, Err(MarketDataError::Dataset(_))));
    }
}
