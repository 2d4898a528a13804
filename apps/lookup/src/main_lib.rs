use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tickerlens_market_data::{HistoryPeriod, MarketDataService};

#[derive(Debug, Parser)]
#[command(name = "tickerlens-lookup", version, about = "Instrument search, quotes and ISIN resolution")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search by ticker, name or ISIN
    Search { query: String },
    /// Latest quote for a symbol (e.g. AAPL, ENEL.MI)
    Quote { symbol: String },
    /// Historical bars for a symbol
    History {
        symbol: String,
        #[arg(long, default_value = "1y")]
        period: HistoryPeriod,
    },
    /// Valuation figures for a symbol
    Fundamentals { symbol: String },
    /// Every listing of an ISIN
    Isin { isin: String },
    /// Cache backend and provider status
    Health,
    /// Drop every cached entry
    ClearCache,
}

/// Logs go to stderr so stdout carries only the JSON answer.
pub fn init_tracing() {
    let log_format = std::env::var("TL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub async fn run(service: &MarketDataService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search { query } => print_json(&service.search(&query).await?),
        Command::Quote { symbol } => print_json(&service.quote(&symbol).await?),
        Command::History { symbol, period } => print_json(&service.history(&symbol, period).await?),
        Command::Fundamentals { symbol } => print_json(&service.fundamentals(&symbol).await?),
        Command::Isin { isin } => print_json(&service.resolve_isin(&isin).await?),
        Command::Health => print_json(&service.cache_health().await),
        Command::ClearCache => print_json(&serde_json::json!({ "removed": service.clear_cache().await })),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
