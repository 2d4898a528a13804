mod config;
mod main_lib;

use clap::Parser;
use config::Config;
use main_lib::{init_tracing, run, Cli};
use tickerlens_market_data::MarketDataService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env();
    let service = MarketDataService::from_config(&config.market_data).await?;

    tracing::debug!("Running {:?}", cli.command);
    run(&service, cli.command).await
}
