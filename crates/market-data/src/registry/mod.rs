//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Provider registration and priority ordering
//! - Rate limiting per provider
//! - Region-aware search routing and result merging
//! - Quote resolution and enrichment
//! - Attempt diagnostics for exhausted fallback chains

mod diagnostics;
mod enricher;
mod merge;
mod provider_registry;
mod quote_resolver;
mod rate_limiter;
mod router;

pub use diagnostics::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use enricher::{QuoteEnricher, DEFAULT_ENRICH_DELAY, DEFAULT_ENRICH_LIMIT};
pub use merge::{merge_reports, ProviderReport};
pub use provider_registry::ProviderRegistry;
pub(crate) use provider_registry::bounded;
pub use quote_resolver::{CallBudget, QuoteResolver};
pub use rate_limiter::{RateLimitStatus, RateLimiter};
pub use router::{SearchRouter, DEFAULT_FAN_OUT_TIMEOUT};
