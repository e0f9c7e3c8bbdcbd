//! SQL schema for the callbook SQLite store.
//!
//! [`SCHEMA`] holds the generation-independent tables and runs at every
//! connection startup. Record tables are created per generation; the live
//! relations are views named after [`RecordKind::as_str`] that select from
//! exactly one generation's tables.

use callbook_core::{query::WildcardPattern, record::RecordKind, store::Generation};
use rusqlite::{Connection, functions::FunctionFlags};

/// Generation-independent DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous  = NORMAL;

CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

-- Append-only; one row per finished refresh cycle.
CREATE TABLE IF NOT EXISTS refresh_log (
    id              INTEGER PRIMARY KEY,
    started_at      TEXT NOT NULL,   -- RFC 3339 UTC
    finished_at     TEXT NOT NULL,
    status          TEXT NOT NULL,   -- 'success' | 'failed'
    records_loaded  INTEGER NOT NULL,
    records_skipped INTEGER NOT NULL,
    error_message   TEXT
);

PRAGMA user_version = 1;
";

/// `wildcard(pattern, value)`: 1 when `value` matches the search pattern,
/// folding case over all of Unicode. SQLite's own `LIKE` folds ASCII only.
pub const WILDCARD_FN: &str = "wildcard";

/// Register the store's scalar functions. Needed on every connection that
/// runs searches.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    WILDCARD_FN,
    2,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let pattern = WildcardPattern::new(ctx.get::<String>(0)?);
      let value = ctx.get::<Option<String>>(1)?;
      Ok(value.is_some_and(|v| pattern.matches(&v)))
    },
  )
}

pub const META_LIVE: &str = "live_generation";
pub const META_NEXT: &str = "next_generation";

/// Stored columns of each record type, in insert order. `subject_key` is the
/// only integer column; dates are ISO 8601 text.
pub fn columns(kind: RecordKind) -> &'static [&'static str] {
  match kind {
    RecordKind::Amateur => &[
      "subject_key",
      "call_sign",
      "operator_class",
      "group_code",
      "region_code",
      "trustee_call_sign",
      "trustee_indicator",
      "previous_call_sign",
      "previous_operator_class",
      "trustee_name",
    ],
    RecordKind::Entity => &[
      "subject_key",
      "call_sign",
      "entity_type",
      "entity_name",
      "first_name",
      "middle_initial",
      "last_name",
      "suffix",
      "phone",
      "email",
      "street_address",
      "city",
      "state",
      "zip_code",
      "po_box",
      "registrant_key",
      "applicant_type",
    ],
    RecordKind::Header => &[
      "subject_key",
      "call_sign",
      "license_status",
      "radio_service",
      "grant_date",
      "expired_date",
      "cancellation_date",
      "effective_date",
      "last_action_date",
    ],
    RecordKind::History => &["subject_key", "call_sign", "event_date", "code"],
  }
}

/// Columns indexed after a bulk load.
fn indexed(kind: RecordKind) -> &'static [&'static str] {
  match kind {
    RecordKind::Amateur => &["subject_key", "call_sign"],
    RecordKind::Entity => &[
      "subject_key",
      "call_sign",
      "registrant_key",
      "last_name",
      "state",
    ],
    RecordKind::Header => &["subject_key", "call_sign", "license_status"],
    RecordKind::History => &["subject_key"],
  }
}

pub fn table_name(kind: RecordKind, generation: Generation) -> String {
  format!("{}_{generation}", kind.as_str())
}

/// Parse a physical table name back into its record type and generation.
pub fn parse_table_name(name: &str) -> Option<(RecordKind, Generation)> {
  RecordKind::ALL.into_iter().find_map(|kind| {
    let n = name.strip_prefix(kind.as_str())?.strip_prefix("_g")?;
    n.parse().ok().map(|n| (kind, Generation(n)))
  })
}

pub fn create_table(kind: RecordKind, generation: Generation) -> String {
  let table = table_name(kind, generation);
  let cols = columns(kind)
    .iter()
    .map(|c| {
      if *c == "subject_key" {
        format!("{c} INTEGER NOT NULL")
      } else {
        format!("{c} TEXT")
      }
    })
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "DROP TABLE IF EXISTS {table};
     CREATE TABLE {table} (id INTEGER PRIMARY KEY, {cols});"
  )
}

pub fn create_indexes(kind: RecordKind, generation: Generation) -> String {
  let table = table_name(kind, generation);
  indexed(kind)
    .iter()
    .map(|c| format!("CREATE INDEX IF NOT EXISTS {table}_{c}_idx ON {table}({c});"))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn insert_row(kind: RecordKind, generation: Generation) -> String {
  let cols = columns(kind);
  let params = (1..=cols.len())
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "INSERT INTO {} ({}) VALUES ({params})",
    table_name(kind, generation),
    cols.join(", "),
  )
}

/// Re-point every live view at `generation`.
pub fn point_views(generation: Generation) -> String {
  RecordKind::ALL
    .iter()
    .map(|kind| {
      let view = kind.as_str();
      let table = table_name(*kind, generation);
      format!(
        "DROP VIEW IF EXISTS {view};
         CREATE VIEW {view} AS SELECT * FROM {table};"
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}
