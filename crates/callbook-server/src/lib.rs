//! Server wiring for the callbook mirror: configuration and the top-level
//! router.

pub mod error;

pub use error::{Error, Result};

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use callbook_core::store::LicenseStore;
use callbook_mirror::{Mirror, MirrorConfig};
use callbook_store_sqlite::SqliteOptions;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Prefix for environment overrides, e.g. `CALLBOOK_PORT=9000` or
/// `CALLBOOK_MIRROR__SOURCE_URL=file:///srv/l_amat.zip`.
pub const ENV_PREFIX: &str = "CALLBOOK";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `callbook.toml` and the
/// environment.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Rows per staging transaction.
  pub batch_size:       usize,
  pub reader_pool_size: usize,
  pub mirror:           MirrorConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let store = SqliteOptions::default();
    Self {
      host:             "127.0.0.1".to_owned(),
      port:             8080,
      store_path:       PathBuf::from("callbook.sqlite3"),
      batch_size:       store.batch_size,
      reader_pool_size: store.reader_pool_size,
      mirror:           MirrorConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Layer `CALLBOOK_*` variables over the TOML file at `path`, if it
  /// exists, and validate the result.
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?;
    let cfg: Self = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<()> {
    if self.batch_size == 0 {
      return Err(Error::Invalid("batch_size must be at least 1".into()));
    }
    if self.reader_pool_size == 0 {
      return Err(Error::Invalid("reader_pool_size must be at least 1".into()));
    }
    if self.store_path.as_os_str().is_empty() {
      return Err(Error::Invalid("store_path must not be empty".into()));
    }
    if self.host.trim().is_empty() {
      return Err(Error::Invalid("host must not be empty".into()));
    }
    self.mirror.validate()?;
    Ok(())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> SqliteOptions {
    SqliteOptions {
      batch_size:       self.batch_size,
      reader_pool_size: self.reader_pool_size,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The JSON API with request tracing.
pub fn router<S>(mirror: Arc<Mirror<S>>) -> Router
where
  S: LicenseStore + 'static,
{
  callbook_api::api_router(mirror).layer(TraceLayer::new_for_http())
}
