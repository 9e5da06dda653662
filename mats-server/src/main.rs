use std::sync::Arc;

use clap::Parser;
use mats_core::MatsConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use mats_server::{http, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "In-memory MatsLogic API server", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "mats.toml")]
    config: String,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mut config = match MatsConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(AppState::new());
    http::start_http_server(config.server, state, tx.subscribe()).await?;

    Ok(())
}
