use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dashboard::{
    Data,
    command::{self, Command},
    config::Config,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trading::{FileCredentialStore, TradingClient};

/// Terminal dashboard for the paper-trading backend.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let origin = FileCredentialStore::origin_of(&config.client.base_url)?;
    let store = Arc::new(FileCredentialStore::open(&config.credentials_path, origin)?);
    let client = TradingClient::new(&config.client, store)?;

    info!(
        version = %config.version,
        api = %config.client.base_url,
        "dashboard starting"
    );

    let data = Data { client, config };
    command::run(&data, cli.command).await
}
