//! Out-of-process live lookup.
//!
//! The lookup program receives the identifier as its last argument and
//! prints one JSON object on stdout: either
//! `{"isin", "name", "type", "price"?, "currency"?, "source"}` or
//! `{"error"}`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::process::Command;

use crate::errors::MarketDataError;
use crate::models::SearchResult;

pub const DEFAULT_LIVE_TIMEOUT: Duration = Duration::from_secs(20);
pub const LIVE_SOURCE: &str = "LIVE";

/// A lookup that resolves one ISIN outside the provider network.
#[async_trait]
pub trait LiveLookup: Send + Sync {
    async fn lookup(&self, isin: &str) -> Result<SearchResult, MarketDataError>;
}

/// Runs an external command per lookup.
pub struct CommandLiveLookup {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandLiveLookup {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_LIVE_TIMEOUT,
        }
    }

    /// Fixed arguments passed before the identifier.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl LiveLookup for CommandLiveLookup {
    async fn lookup(&self, isin: &str) -> Result<SearchResult, MarketDataError> {
        debug!("Live lookup: {} {:?} {}", self.program, self.args, isin);

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(isin)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        // Dropping the pending output future kills the child
        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                warn!("Live lookup for {} timed out after {:?}", isin, self.timeout);
                MarketDataError::LiveLookup(format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| MarketDataError::LiveLookup(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MarketDataError::LiveLookup(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_output(isin, &String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
struct LiveOutput {
    #[serde(default)]
    isin: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    asset_type: Option<String>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn parse_output(isin: &str, stdout: &str) -> Result<SearchResult, MarketDataError> {
    let output: LiveOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| MarketDataError::LiveLookup(format!("unreadable output: {}", e)))?;

    if let Some(error) = output.error {
        return Err(MarketDataError::LiveLookup(error));
    }
    let name = output
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| MarketDataError::LiveLookup("output has no name".to_string()))?;

    let isin = output.isin.unwrap_or_else(|| isin.to_string()).to_uppercase();
    // Live hits are identified by ISIN; there is no exchange symbol
    let mut result = SearchResult::new(
        isin.clone(),
        name,
        "",
        output.asset_type.unwrap_or_else(|| "FUND".to_string()),
    )
    .with_isin(isin);
    result.price = output.price;
    result.currency = output.currency;
    result.add_source(output.source.as_deref().unwrap_or(LIVE_SOURCE));
    result.live = true;
    Ok(result)
}
