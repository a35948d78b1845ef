// crates/quarry/src/main.rs
// Quarry - hybrid document + SQL question answering

use anyhow::Result;
use clap::Parser;
use quarry::cli::{self, Cli};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env files (global first, then project - project overrides)
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".quarry/.env"));
    }
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    // Logs go to stderr; stdout carries command output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    cli::dispatch(cli).await
}
