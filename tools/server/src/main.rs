//! CipherKeep server - stores sealed vault records for the CLI client.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cipherkeep_server::{serve, AppState, ServerConfig};

#[derive(Parser)]
#[command(name = "cipherkeep-server")]
#[command(about = "CipherKeep - Encrypted vault server")]
#[command(version)]
struct Cli {
    /// Enable verbose logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    /// Listen address.
    #[arg(long, env = "CIPHERKEEP_ADDRESS", default_value = "127.0.0.1:8080")]
    address: String,

    /// SQLite database file, or ":memory:" for a throwaway store.
    #[arg(long, env = "CIPHERKEEP_DATABASE", default_value = "cipherkeep.db")]
    database: String,

    /// Root directory for uploaded files.
    #[arg(long, env = "CIPHERKEEP_STORAGE", default_value = "storage")]
    storage: PathBuf,

    /// Session lifetime in seconds.
    #[arg(long, env = "CIPHERKEEP_SESSION_TTL", default_value = "3600")]
    session_ttl_secs: u64,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            address: self.address,
            database: self.database,
            storage: self.storage,
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = cli.into_config();
    let state = AppState::from_config(&config).context("Failed to open server storage")?;

    let listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.address))?;

    serve(listener, Arc::new(state), shutdown_signal())
        .await
        .context("Server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
