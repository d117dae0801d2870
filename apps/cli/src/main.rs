//! MarketBrief CLI: scheduled crypto market-summary ingestion.
//!
//! Triggers hourly and daily ingestion runs against the generation provider
//! and reads back the persisted assets, summaries and runs as JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
