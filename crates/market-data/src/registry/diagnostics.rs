//! Attempt tracking for fallback chains.
//!
//! Every tier or provider consulted while answering a request leaves one
//! [`ProviderAttempt`]. When the chain is exhausted the attempts travel
//! inside [`MarketDataError::NotFound`].

use std::fmt;

use crate::errors::{LimitScope, MarketDataError};
use crate::models::ProviderId;

/// Why a source was passed over without producing an error of its own.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// The source does not implement the operation.
    NotSupported,

    /// The source's own budget is spent; no request was sent.
    RateLimited(LimitScope),

    /// The symbol has no encoding in the source's grammar.
    ResolutionFailed,

    /// The caller's call budget ran out before this source was reached.
    BudgetSpent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => write!(f, "not supported"),
            Self::RateLimited(scope) => write!(f, "{} rate limit", scope),
            Self::ResolutionFailed => write!(f, "symbol not expressible"),
            Self::BudgetSpent => write!(f, "call budget spent"),
        }
    }
}

/// Record of a single source attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderAttempt {
    pub source: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub success: bool,
}

impl ProviderAttempt {
    pub fn succeeded(source: ProviderId) -> Self {
        Self {
            source,
            skipped: None,
            error: None,
            success: true,
        }
    }

    pub fn failed(source: ProviderId, error: impl Into<String>) -> Self {
        Self {
            source,
            skipped: None,
            error: Some(error.into()),
            success: false,
        }
    }

    pub fn skipped(source: ProviderId, reason: SkipReason) -> Self {
        Self {
            source,
            skipped: Some(reason),
            error: None,
            success: false,
        }
    }

    /// Classify an error: local refusals become skips, the rest errors.
    pub fn from_error(source: ProviderId, error: &MarketDataError) -> Self {
        match error {
            MarketDataError::RateLimitExceeded { scope, .. } => {
                Self::skipped(source, SkipReason::RateLimited(*scope))
            }
            MarketDataError::NotSupported { .. } => Self::skipped(source, SkipReason::NotSupported),
            MarketDataError::ResolutionFailed { .. } => {
                Self::skipped(source, SkipReason::ResolutionFailed)
            }
            other => Self::failed(source, other.to_string()),
        }
    }
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "{}: SUCCESS", self.source)
        } else if let Some(skip) = &self.skipped {
            write!(f, "{}: SKIPPED ({})", self.source, skip)
        } else if let Some(err) = &self.error {
            write!(f, "{}: ERROR ({})", self.source, err)
        } else {
            write!(f, "{}: UNKNOWN", self.source)
        }
    }
}

/// Ordered attempts of one request.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_success(&mut self, source: impl Into<ProviderId>) {
        self.attempts.push(ProviderAttempt::succeeded(source.into()));
    }

    pub fn record_error(&mut self, source: impl Into<ProviderId>, error: impl Into<String>) {
        self.attempts.push(ProviderAttempt::failed(source.into(), error));
    }

    pub fn record_skip(&mut self, source: impl Into<ProviderId>, reason: SkipReason) {
        self.attempts
            .push(ProviderAttempt::skipped(source.into(), reason));
    }

    /// Record a failed call, classifying local refusals as skips.
    pub fn record_failure(&mut self, source: impl Into<ProviderId>, error: &MarketDataError) {
        self.attempts
            .push(ProviderAttempt::from_error(source.into(), error));
    }

    /// Append attempts gathered by a nested chain.
    pub fn extend(&mut self, attempts: impl IntoIterator<Item = ProviderAttempt>) {
        self.attempts.extend(attempts);
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Turn an exhausted chain into the caller-visible error.
    pub fn into_not_found(self, query: impl Into<String>) -> MarketDataError {
        MarketDataError::NotFound {
            query: query.into(),
            attempts: self.attempts,
        }
    }
}
