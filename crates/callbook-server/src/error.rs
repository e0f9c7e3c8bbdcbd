//! Startup errors for the server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("config: {0}")]
  Config(#[from] config::ConfigError),

  #[error("invalid configuration: {0}")]
  Invalid(String),

  #[error(transparent)]
  Mirror(#[from] callbook_mirror::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
