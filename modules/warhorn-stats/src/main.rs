use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use warhorn_client::WarhornClient;
use warhorn_stats::{discover_events, Cli, Config, SessionAggregator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries only CSV lines.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warhorn=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env(cli)?;
    config.log_settings();

    let client = WarhornClient::builder(config.token.as_str())
        .endpoint(config.endpoint.as_str())
        .retry_policy(config.retry)
        .build()
        .context("Failed to build Warhorn client")?;

    info!(endpoint = client.endpoint(), "Discovering events");
    let mut aggregator = SessionAggregator::new(&client, config.page_size, std::io::stdout());
    let report = discover_events(&client, config.page_size, &mut aggregator).await?;

    info!(
        events = report.events,
        summarized = aggregator.summaries(),
        "Warhorn stats complete"
    );
    Ok(())
}
