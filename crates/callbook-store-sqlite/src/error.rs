//! Error type for `callbook-store-sqlite`.

use callbook_core::{record::RecordKind, store::Generation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Writing a staging relation failed; the live generation is untouched.
  #[error("loading {kind} staging relation: {source}")]
  Load {
    kind:   RecordKind,
    source: tokio_rusqlite::Error,
  },

  /// Promotion was rolled back; the live generation is untouched.
  #[error("promotion failed: {0}")]
  Swap(#[source] tokio_rusqlite::Error),

  #[error("generation {0} is live")]
  LiveGeneration(Generation),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt stored value: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
