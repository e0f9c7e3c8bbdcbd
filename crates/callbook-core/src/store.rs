//! The `LicenseStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `callbook-store-sqlite`).
//! Higher layers (`callbook-mirror`, `callbook-api`) depend on this
//! abstraction, not on any concrete backend.
//!
//! A store keeps one *live* generation of the four record relations that all
//! reads go through, and at most one *staging* generation being written by a
//! refresh. Promotion replaces the live generation atomically.

use std::{collections::BTreeMap, fmt, future::Future};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  ParseError,
  query::LicenseQuery,
  record::{
    AmateurRecord, EntityRecord, HeaderRecord, HistoryRecord, RecordKind,
    SubjectKey,
  },
  refresh::RefreshLogEntry,
};

// ─── Generations ─────────────────────────────────────────────────────────────

/// Identifier of one complete set of the four relations.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "g{}", self.0)
  }
}

/// A lazily parsed stream of rows for one record type.
pub type RowStream<T> = Box<dyn Iterator<Item = Result<T, ParseError>> + Send>;

/// Rows destined for one staging relation.
pub enum StagingRows {
  Amateur(RowStream<AmateurRecord>),
  Entity(RowStream<EntityRecord>),
  Header(RowStream<HeaderRecord>),
  History(RowStream<HistoryRecord>),
}

impl StagingRows {
  pub fn kind(&self) -> RecordKind {
    match self {
      Self::Amateur(_) => RecordKind::Amateur,
      Self::Entity(_) => RecordKind::Entity,
      Self::Header(_) => RecordKind::Header,
      Self::History(_) => RecordKind::History,
    }
  }
}

impl fmt::Debug for StagingRows {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("StagingRows").field(&self.kind()).finish()
  }
}

/// Outcome of loading one staging relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
  pub kind:    RecordKind,
  pub loaded:  u64,
  /// Malformed lines skipped.
  pub skipped: u64,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// One row of the combined entity/amateur/header view, before enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRow {
  pub subject_key:        SubjectKey,
  pub call_sign:          Option<String>,
  pub entity_name:        Option<String>,
  pub first_name:         Option<String>,
  pub middle_initial:     Option<String>,
  pub last_name:          Option<String>,
  pub suffix:             Option<String>,
  pub street_address:     Option<String>,
  pub city:               Option<String>,
  pub state:              Option<String>,
  pub zip_code:           Option<String>,
  pub registrant_key:     Option<String>,
  pub operator_class:     Option<String>,
  pub trustee_call_sign:  Option<String>,
  pub previous_call_sign: Option<String>,
  pub license_status:     Option<String>,
  pub grant_date:         Option<NaiveDate>,
  pub expired_date:       Option<NaiveDate>,
}

/// A page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
  /// Number of matching rows, independent of pagination.
  pub total: u64,
  pub rows:  Vec<LicenseRow>,
}

/// Every live record for one subject key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRecords {
  pub subject_key: SubjectKey,
  pub amateur:     Option<AmateurRecord>,
  pub entity:      Option<EntityRecord>,
  pub header:      Option<HeaderRecord>,
}

/// History of every licence held by one registrant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrantHistory {
  /// Sorted ascending.
  pub subject_keys: Vec<SubjectKey>,
  /// Newest event first.
  pub records:      Vec<HistoryRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
  pub amateur: u64,
  pub entity:  u64,
  pub header:  u64,
  pub history: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCount {
  pub state: String,
  pub count: u64,
}

/// Aggregate figures over the live generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStats {
  pub generation:       Generation,
  pub records:          RecordCounts,
  /// Distinct call signs with licence status `A`.
  pub active_licenses:  u64,
  /// Header rows per licence-status code.
  pub license_statuses: BTreeMap<String, u64>,
  /// Amateur rows per operator-class code.
  pub operator_classes: BTreeMap<String, u64>,
  /// Ten states with the most licensees, largest first.
  pub top_states:       Vec<StateCount>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a callbook storage backend.
///
/// Reads always observe exactly one live generation, even while a staging
/// generation is being loaded or promoted.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LicenseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Run a compiled search against the live generation. `total` and the
  /// page come from the same snapshot.
  fn search<'a>(
    &'a self,
    query: &'a LicenseQuery,
  ) -> impl Future<Output = Result<SearchPage, Self::Error>> + Send + 'a;

  /// All live records for one subject key, or `None` if it has none.
  fn license(
    &self,
    subject_key: SubjectKey,
  ) -> impl Future<Output = Result<Option<LicenseRecords>, Self::Error>> + Send + '_;

  /// History rows for one subject key, newest event first.
  fn history(
    &self,
    subject_key: SubjectKey,
  ) -> impl Future<Output = Result<Vec<HistoryRecord>, Self::Error>> + Send + '_;

  /// Subject keys sharing `registrant_key` and the union of their history.
  fn registrant_history<'a>(
    &'a self,
    registrant_key: &'a str,
  ) -> impl Future<Output = Result<RegistrantHistory, Self::Error>> + Send + 'a;

  fn stats(&self) -> impl Future<Output = Result<LiveStats, Self::Error>> + Send + '_;

  /// Cheap round trip proving the backend is reachable.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Refresh ───────────────────────────────────────────────────────────

  /// Allocate a fresh staging generation, discarding any abandoned one.
  fn begin_staging(
    &self,
  ) -> impl Future<Output = Result<Generation, Self::Error>> + Send + '_;

  /// Replace the staging relation of `rows.kind()` with the given rows,
  /// skipping and counting malformed lines.
  fn load_staging(
    &self,
    generation: Generation,
    rows: StagingRows,
  ) -> impl Future<Output = Result<LoadReport, Self::Error>> + Send + '_;

  /// Atomically make `generation` the live generation for all four record
  /// types, then reclaim the previous one.
  fn promote(
    &self,
    generation: Generation,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Drop a staging generation that will not be promoted.
  fn discard_staging(
    &self,
    generation: Generation,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn live_generation(
    &self,
  ) -> impl Future<Output = Result<Generation, Self::Error>> + Send + '_;

  // ── Refresh log ───────────────────────────────────────────────────────

  /// Append a finished cycle to the refresh-attempt log.
  fn append_refresh_log(
    &self,
    entry: RefreshLogEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Most recent log entry, optionally only among successful cycles.
  fn last_refresh(
    &self,
    successful_only: bool,
  ) -> impl Future<Output = Result<Option<RefreshLogEntry>, Self::Error>> + Send + '_;
}
