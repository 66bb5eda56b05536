mod cli;
mod client;
mod config;
mod cost;
mod error;
mod models;
mod pipeline;
mod retest;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting prcost - PR CI cost estimator");
    cli.execute().await?;

    Ok(())
}
