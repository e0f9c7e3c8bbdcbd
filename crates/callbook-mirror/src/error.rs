//! Error types for `callbook-mirror`.

use callbook_core::record::RecordKind;
use thiserror::Error;

/// Why a refresh cycle failed. The live generation is untouched in every
/// case.
#[derive(Debug, Error)]
pub enum RefreshError {
  #[error("download failed: {0}")]
  Download(String),

  /// The archive is empty, unreadable, missing a member file, or a member
  /// holds no valid records.
  #[error("archive integrity: {0}")]
  Integrity(String),

  #[error("loading {kind}: {message}")]
  Load { kind: RecordKind, message: String },

  #[error("promotion failed: {0}")]
  Swap(String),

  #[error("store error: {0}")]
  Store(String),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] callbook_core::Error),

  #[error("store error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
