//! Error types for `callbook-core`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A filter map or pagination value was rejected by the query translator.
  #[error("invalid query: {0}")]
  Validation(String),

  #[error("code definitions file {path:?}: {reason}")]
  DefinitionFile { path: PathBuf, reason: String },

  #[error("unknown code space: {0:?}")]
  UnknownCodeSpace(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A per-line failure while reading an upstream flat file.
///
/// Everything except [`ParseError::Io`] describes a single malformed line,
/// which the loader skips and counts.
#[derive(Debug, Error)]
pub enum ParseError {
  #[error("line {line}: expected {expected} columns, found {found}")]
  ColumnCount {
    line:     u64,
    expected: usize,
    found:    usize,
  },

  #[error("line {line}: expected record type {expected}, found {found:?}")]
  RecordType {
    line:     u64,
    expected: &'static str,
    found:    String,
  },

  #[error("line {line}: invalid subject key {value:?}")]
  SubjectKey { line: u64, value: String },

  #[error("line {line}: invalid date in {column}: {value:?}")]
  Date {
    line:   u64,
    column: &'static str,
    value:  String,
  },

  #[error("read error: {0}")]
  Io(#[from] std::io::Error),
}

impl ParseError {
  /// Whether the error ends the file rather than just the current line.
  pub fn is_fatal(&self) -> bool { matches!(self, Self::Io(_)) }
}
