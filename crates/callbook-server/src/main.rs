//! callbook server binary.
//!
//! Reads `callbook.toml` (or the path given with `--config`) layered under
//! `CALLBOOK_*` environment variables, opens the SQLite store, starts the
//! refresh scheduler and serves the JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use callbook_mirror::Mirror;
use callbook_server::ServerConfig;
use callbook_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Amateur licence mirror")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "callbook.toml")]
  config: PathBuf,

  /// Queue a refresh as soon as the server is up.
  #[arg(long)]
  refresh_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
  server_cfg.store_path = expand_tilde(&server_cfg.store_path);
  server_cfg.mirror.definitions_path = expand_tilde(&server_cfg.mirror.definitions_path);

  let store = SqliteStore::open_with(&server_cfg.store_path, server_cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  let mirror = Arc::new(
    Mirror::start(Arc::new(store), &server_cfg.mirror)
      .await
      .context("failed to start mirror")?,
  );
  if cli.refresh_now {
    let state = mirror.refresh();
    tracing::info!(status = %state.status.as_str(), "refresh requested");
  }

  let app = callbook_server::router(mirror.clone());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  mirror.shutdown().await;
  tracing::info!("stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
