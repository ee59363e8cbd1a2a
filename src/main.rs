//! Example client: serves `exampleTest1`/`exampleTest2` to the daemon and
//! runs until SIGTERM or SIGINT.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sockrpc_client::{demo, ClientBuilder, ClientConfig};

#[derive(Parser, Debug)]
#[command(name = "sockrpc-example")]
#[command(about = "Example RPC client for a local daemon socket")]
struct Args {
    /// Path of the daemon's Unix socket (overrides the config file)
    #[arg(long)]
    socket_path: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(path) = args.socket_path {
        config.socket_path = path;
    }

    let client = demo::register_examples(ClientBuilder::from_config(config)).build();
    client.start()?;

    info!("Startup complete.");

    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let signal_number = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for SIGINT")?;
            2
        }
        _ = terminate.recv() => 15,
    };

    info!("Shutting down (Signal: {})", signal_number);
    client.stop().await;
    info!("Shutdown complete.");

    Ok(())
}
