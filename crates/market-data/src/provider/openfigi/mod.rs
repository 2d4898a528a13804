//! OpenFIGI identifier mapping.
//!
//! Maps an ISIN to every listing OpenFIGI knows for it, translating each
//! `exchCode` to a MIC through the exchange registry.
//! API documentation: https://www.openfigi.com/api

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::provider::{IdentifierMapper, ListingCandidate, RateLimit};
use crate::registry::RateLimiter;
use crate::resolver::{figi_code_to_mic, CanonicalSymbol};

const DEFAULT_BASE_URL: &str = "https://api.openfigi.com/v3";
const PROVIDER_ID: &str = "OPENFIGI";

/// OpenFIGI mapping client. The API key is optional; without one the
/// service allows 25 mapping requests per minute.
pub struct OpenFigiMapper {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    limiter: RateLimiter,
}

impl OpenFigiMapper {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        let rate_limit = RateLimit {
            requests_per_minute: if api_key.is_some() { 250 } else { 25 },
            daily_limit: None,
            timeout: Duration::from_secs(10),
        };
        let client = Client::builder()
            .timeout(rate_limit.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        OpenFigiMapper {
            client,
            api_key,
            base_url: base_url.into(),
            limiter: RateLimiter::new(PROVIDER_ID, &rate_limit),
        }
    }

    /// Convert one mapping job's results into listings, dropping entries
    /// without a ticker or with an exchange the registry does not know.
    fn to_candidates(isin: &str, response: MappingResponse) -> Result<Vec<ListingCandidate>, MarketDataError> {
        if let Some(error) = response.error {
            // Unknown identifiers are reported as an error string
            if error.contains("No identifier found") {
                debug!("OpenFIGI: no mapping for {}", isin);
                return Ok(Vec::new());
            }
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("OpenFIGI error: {}", error),
            ));
        }

        let candidates = response
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|figi| {
                let ticker = figi.ticker?;
                let code = figi.exch_code.as_deref()?;
                let Some(mic) = figi_code_to_mic(code) else {
                    debug!("OpenFIGI: unknown exchange code '{}' for {}", code, ticker);
                    return None;
                };
                Some(ListingCandidate {
                    symbol: CanonicalSymbol::new(ticker.clone(), Some(mic.to_string())),
                    name: figi.name.unwrap_or(ticker),
                    security_type: figi.security_type,
                    exchange_code: figi.exch_code,
                })
            })
            .collect();

        Ok(candidates)
    }
}

#[async_trait]
impl IdentifierMapper for OpenFigiMapper {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn map_isin(&self, isin: &str) -> Result<Vec<ListingCandidate>, MarketDataError> {
        self.limiter.try_acquire()?;

        let url = format!("{}/mapping", self.base_url);
        let request_body = vec![MappingJob {
            id_type: "ID_ISIN".to_string(),
            id_value: isin.to_string(),
        }];

        let mut request_builder = self.client.post(&url).json(&request_body);
        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.header("X-OPENFIGI-APIKEY", api_key);
        }

        debug!("OpenFIGI: mapping ISIN {}", isin);

        let response = request_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER_ID, format!("OpenFIGI request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("OpenFIGI API error {}: {}", status, error_text),
            ));
        }

        let results: Vec<MappingResponse> = response.json().await.map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to parse OpenFIGI response: {}", e))
        })?;

        // One job in, one response out
        match results.into_iter().next() {
            Some(first) => Self::to_candidates(isin, first),
            None => Ok(Vec::new()),
        }
    }
}

// API Request/Response structures (OpenFIGI v3)

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MappingJob {
    id_type: String,
    id_value: String,
}

#[derive(Debug, Deserialize)]
struct MappingResponse {
    #[serde(default)]
    data: Option<Vec<FigiResult>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FigiResult {
    #[serde(default)]
    security_type: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exch_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_job_serialization() {
        let body = vec![MappingJob {
            id_type: "ID_ISIN".to_string(),
            id_value: "IT0003128367".to_string(),
        }];
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"[{"idType":"ID_ISIN","idValue":"IT0003128367"}]"#);
    }

    #[test]
    fn test_mapping_response_to_candidates() {
        let json = r#"[{
            "data": [
                {"figi": "BBG000BK43F5", "ticker": "ENEL", "name": "ENEL SPA", "exchCode": "IM", "securityType": "Common Stock"},
                {"figi": "BBG000BK4GX9", "ticker": "ENL", "name": "ENEL SPA", "exchCode": "GY", "securityType": "Common Stock"},
                {"figi": "BBG000BK4HM8", "ticker": "ENEL", "name": "ENEL SPA", "exchCode": "ZZ"},
                {"figi": "BBG000BK4J12", "name": "ENEL SPA", "exchCode": "IM"}
            ]
        }]"#;

        let responses: Vec<MappingResponse> = serde_json::from_str(json).unwrap();
        let first = responses.into_iter().next().unwrap();
        let candidates = OpenFigiMapper::to_candidates("IT0003128367", first).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].symbol.to_string(), "ENEL.MI");
        assert_eq!(candidates[0].security_type.as_deref(), Some("Common Stock"));
        assert_eq!(candidates[1].symbol.mic.as_deref(), Some("XETR"));
    }

    #[test]
    fn test_unknown_identifier_is_empty() {
        let json = r#"[{"warning": "No identifier found.", "error": "No identifier found."}]"#;
        let responses: Vec<MappingResponse> = serde_json::from_str(json).unwrap();
        let first = responses.into_iter().next().unwrap();

        let candidates = OpenFigiMapper::to_candidates("XX0000000000", first).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_other_errors_propagate() {
        let response = MappingResponse {
            data: None,
            error: Some("Invalid idValue format".to_string()),
        };
        let err = OpenFigiMapper::to_candidates("BAD", response).unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderError { .. }));
    }
}
