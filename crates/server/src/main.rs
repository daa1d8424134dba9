use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vaultsync_server::{router, Config, State};

#[derive(Debug, Parser)]
#[command(name = "vaultsync-server", version, about = "Vaultsync sync server")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "VAULTSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override the SQLite path (defaults to in-memory without a config).
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Override the root API key.
    #[arg(long, env = "VAULTSYNC_API_KEY")]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).context("loading config")?,
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(sqlite) = cli.sqlite {
        config.sqlite_path = Some(sqlite);
    }
    if let Some(api_key) = cli.api_key {
        config.api_key = Some(api_key);
    }

    let state = State::from_config(&config)
        .await
        .context("initializing state")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!("listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("serving")?;

    Ok(())
}
