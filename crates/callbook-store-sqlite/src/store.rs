//! [`SqliteStore`]: the SQLite implementation of [`LicenseStore`].

use std::{
  collections::BTreeMap,
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use callbook_core::{
  query::{LicenseQuery, Predicate},
  record::{HistoryRecord, RecordKind, SubjectKey},
  refresh::{RefreshLogEntry, RefreshStatus},
  store::{
    Generation, LicenseRecords, LicenseStore, LiveStats, LoadReport, RecordCounts,
    RegistrantHistory, SearchPage, StagingRows, StateCount,
  },
};
use rusqlite::{OptionalExtension as _, types::Value};

use crate::{
  Error, Result,
  encode::{
    AMATEUR_COLUMNS, ENTITY_COLUMNS, HEADER_COLUMNS, HISTORY_COLUMNS, RawHeader,
    RawHistory, RawLicenseRow, RawLogEntry, encode_dt, read_amateur, read_entity,
  },
  schema::{self, SCHEMA, WILDCARD_FN},
  stage,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Options ─────────────────────────────────────────────────────────────────

/// Tuning knobs for [`SqliteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
  /// Rows inserted per staging transaction.
  pub batch_size:       usize,
  /// Reader connections for queries. File-backed stores only.
  pub reader_pool_size: usize,
}

impl Default for SqliteOptions {
  fn default() -> Self {
    Self {
      batch_size:       50_000,
      reader_pool_size: 4,
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A licence store backed by a single SQLite file.
///
/// Cloning is cheap: connections are reference-counted handles.
#[derive(Clone)]
pub struct SqliteStore {
  writer:     tokio_rusqlite::Connection,
  readers:    Arc<[tokio_rusqlite::Connection]>,
  next:       Arc<AtomicUsize>,
  batch_size: usize,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, SqliteOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self> {
    let path = path.as_ref();
    let writer = tokio_rusqlite::Connection::open(path).await?;
    init_writer(&writer).await?;

    let mut readers = Vec::with_capacity(options.reader_pool_size.max(1));
    for _ in 0..options.reader_pool_size.max(1) {
      let conn = tokio_rusqlite::Connection::open(path).await?;
      conn
        .call(|conn| {
          conn.busy_timeout(BUSY_TIMEOUT)?;
          conn.execute_batch("PRAGMA query_only = ON;")?;
          schema::register_functions(conn)?;
          Ok(())
        })
        .await?;
      readers.push(conn);
    }

    tracing::info!(path = %path.display(), readers = readers.len(), "opened licence store");
    Ok(Self {
      writer,
      readers: readers.into(),
      next: Arc::new(AtomicUsize::new(0)),
      batch_size: options.batch_size,
    })
  }

  /// Open an in-memory store, useful for testing. Reads and writes share
  /// one connection.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(SqliteOptions::default()).await
  }

  pub async fn open_in_memory_with(options: SqliteOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    init_writer(&conn).await?;
    Ok(Self {
      writer:     conn.clone(),
      readers:    Arc::from(vec![conn]),
      next:       Arc::new(AtomicUsize::new(0)),
      batch_size: options.batch_size,
    })
  }

  fn reader(&self) -> &tokio_rusqlite::Connection {
    let i = self.next.fetch_add(1, Ordering::Relaxed) % self.readers.len();
    &self.readers[i]
  }
}

async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
  conn
    .call(|conn| {
      conn.busy_timeout(BUSY_TIMEOUT)?;
      conn.execute_batch(SCHEMA)?;
      schema::register_functions(conn)?;
      stage::bootstrap(conn)?;
      Ok(())
    })
    .await?;
  Ok(())
}

// ─── Search SQL ──────────────────────────────────────────────────────────────

/// Licensee entity rows joined with their amateur and header rows.
const SEARCH_FROM: &str = "
  FROM entity e
  LEFT JOIN amateur a ON a.subject_key = e.subject_key
  LEFT JOIN header  h ON h.subject_key = e.subject_key
  WHERE e.entity_type = 'L'";

const SEARCH_COLUMNS: &str = "
  e.subject_key, e.call_sign, e.entity_name, e.first_name, e.middle_initial,
  e.last_name, e.suffix, e.street_address, e.city, e.state, e.zip_code,
  e.registrant_key, a.operator_class, a.trustee_call_sign,
  a.previous_call_sign, h.license_status, h.grant_date, h.expired_date";

fn alias(relation: RecordKind) -> &'static str {
  match relation {
    RecordKind::Amateur => "a",
    RecordKind::Entity => "e",
    RecordKind::Header => "h",
    RecordKind::History => "hs",
  }
}

/// `AND`-joined `wildcard(pattern, column)` conditions with one text
/// parameter each.
fn search_filter(predicates: &[Predicate]) -> (String, Vec<Value>) {
  let mut sql = String::new();
  let mut params = Vec::with_capacity(predicates.len() + 2);
  for p in predicates {
    let column = p.field.column();
    sql.push_str(&format!(
      " AND {WILDCARD_FN}(?, {}.{})",
      alias(column.relation),
      column.column
    ));
    params.push(Value::Text(p.pattern.as_str().to_owned()));
  }
  (sql, params)
}

const HISTORY_ORDER: &str = "ORDER BY event_date DESC, subject_key, id";

// ─── LicenseStore impl ───────────────────────────────────────────────────────

impl LicenseStore for SqliteStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn search(&self, query: &LicenseQuery) -> Result<SearchPage> {
    let (filter, mut params) = search_filter(&query.predicates);
    let count_sql = format!("SELECT COUNT(*) {SEARCH_FROM}{filter}");
    let page_sql = format!(
      "SELECT {SEARCH_COLUMNS} {SEARCH_FROM}{filter}
       ORDER BY e.subject_key, e.id
       LIMIT ? OFFSET ?"
    );
    let count_params = params.clone();
    params.push(Value::Integer(i64::from(query.page.limit)));
    params.push(Value::Integer(
      i64::try_from(query.page.offset).unwrap_or(i64::MAX),
    ));

    let (total, raws): (i64, Vec<RawLicenseRow>) = self
      .reader()
      .call(move |conn| {
        let tx = conn.transaction()?;
        let total = tx.query_row(
          &count_sql,
          rusqlite::params_from_iter(count_params),
          |r| r.get(0),
        )?;
        let rows = {
          let mut stmt = tx.prepare(&page_sql)?;
          stmt
            .query_map(rusqlite::params_from_iter(params), RawLicenseRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok((total, rows))
      })
      .await?;

    Ok(SearchPage {
      total: total.max(0) as u64,
      rows:  raws
        .into_iter()
        .map(RawLicenseRow::into_row)
        .collect::<Result<_>>()?,
    })
  }

  async fn license(&self, subject_key: SubjectKey) -> Result<Option<LicenseRecords>> {
    let (amateur, entity, header) = self
      .reader()
      .call(move |conn| {
        let tx = conn.transaction()?;
        let amateur = tx
          .query_row(
            &format!(
              "SELECT {AMATEUR_COLUMNS} FROM amateur WHERE subject_key = ?1
               ORDER BY id LIMIT 1"
            ),
            [subject_key],
            read_amateur,
          )
          .optional()?;
        // Prefer the licensee row over contacts and owners.
        let entity = tx
          .query_row(
            &format!(
              "SELECT {ENTITY_COLUMNS} FROM entity WHERE subject_key = ?1
               ORDER BY entity_type = 'L' DESC, id LIMIT 1"
            ),
            [subject_key],
            read_entity,
          )
          .optional()?;
        let header = tx
          .query_row(
            &format!(
              "SELECT {HEADER_COLUMNS} FROM header WHERE subject_key = ?1
               ORDER BY id LIMIT 1"
            ),
            [subject_key],
            RawHeader::read,
          )
          .optional()?;
        tx.commit()?;
        Ok((amateur, entity, header))
      })
      .await?;

    if amateur.is_none() && entity.is_none() && header.is_none() {
      return Ok(None);
    }
    Ok(Some(LicenseRecords {
      subject_key,
      amateur,
      entity,
      header: header.map(RawHeader::into_record).transpose()?,
    }))
  }

  async fn history(&self, subject_key: SubjectKey) -> Result<Vec<HistoryRecord>> {
    let raws: Vec<RawHistory> = self
      .reader()
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HISTORY_COLUMNS} FROM history WHERE subject_key = ?1 {HISTORY_ORDER}"
        ))?;
        let rows = stmt
          .query_map([subject_key], RawHistory::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistory::into_record).collect()
  }

  async fn registrant_history(&self, registrant_key: &str) -> Result<RegistrantHistory> {
    let registrant_key = registrant_key.to_owned();

    let (subject_keys, raws): (Vec<SubjectKey>, Vec<RawHistory>) = self
      .reader()
      .call(move |conn| {
        let tx = conn.transaction()?;
        let keys = {
          let mut stmt = tx.prepare(
            "SELECT DISTINCT subject_key FROM entity
             WHERE registrant_key = ?1
             ORDER BY subject_key",
          )?;
          stmt
            .query_map([&registrant_key], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history
             WHERE subject_key IN (
               SELECT subject_key FROM entity WHERE registrant_key = ?1
             )
             {HISTORY_ORDER}"
          ))?;
          stmt
            .query_map([&registrant_key], RawHistory::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok((keys, rows))
      })
      .await?;

    Ok(RegistrantHistory {
      subject_keys,
      records: raws
        .into_iter()
        .map(RawHistory::into_record)
        .collect::<Result<_>>()?,
    })
  }

  async fn stats(&self) -> Result<LiveStats> {
    let stats = self
      .reader()
      .call(|conn| {
        let tx = conn.transaction()?;
        let generation = stage::live_generation(&tx)?;
        let count = |view: &str| -> rusqlite::Result<u64> {
          let n: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM {view}"), [], |r| r.get(0))?;
          Ok(n.max(0) as u64)
        };
        let records = RecordCounts {
          amateur: count("amateur")?,
          entity:  count("entity")?,
          header:  count("header")?,
          history: count("history")?,
        };
        let active: i64 = tx.query_row(
          "SELECT COUNT(DISTINCT call_sign) FROM header WHERE license_status = 'A'",
          [],
          |r| r.get(0),
        )?;
        let breakdown = |sql: &str| -> rusqlite::Result<Vec<(String, i64)>> {
          let mut stmt = tx.prepare(sql)?;
          let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        };
        let statuses = breakdown(
          "SELECT license_status, COUNT(*) FROM header
           WHERE license_status IS NOT NULL
           GROUP BY license_status",
        )?;
        let classes = breakdown(
          "SELECT operator_class, COUNT(*) FROM amateur
           WHERE operator_class IS NOT NULL
           GROUP BY operator_class",
        )?;
        let states = breakdown(
          "SELECT state, COUNT(*) AS n FROM entity
           WHERE entity_type = 'L' AND state IS NOT NULL
           GROUP BY state
           ORDER BY n DESC, state
           LIMIT 10",
        )?;
        tx.commit()?;

        let to_map = |rows: Vec<(String, i64)>| -> BTreeMap<String, u64> {
          rows.into_iter().map(|(k, n)| (k, n.max(0) as u64)).collect()
        };
        Ok(LiveStats {
          generation,
          records,
          active_licenses: active.max(0) as u64,
          license_statuses: to_map(statuses),
          operator_classes: to_map(classes),
          top_states: states
            .into_iter()
            .map(|(state, n)| StateCount {
              state,
              count: n.max(0) as u64,
            })
            .collect(),
        })
      })
      .await?;
    Ok(stats)
  }

  async fn ping(&self) -> Result<()> {
    self
      .reader()
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Refresh ───────────────────────────────────────────────────────────────

  async fn begin_staging(&self) -> Result<Generation> {
    let generation = self
      .writer
      .call(|conn| Ok(stage::begin(conn)?))
      .await?;
    tracing::info!(%generation, "allocated staging generation");
    Ok(generation)
  }

  async fn load_staging(&self, generation: Generation, rows: StagingRows) -> Result<LoadReport> {
    let kind = rows.kind();
    if generation == self.live_generation().await? {
      return Err(Error::LiveGeneration(generation));
    }
    let batch_size = self.batch_size;

    let report = self
      .writer
      .call(move |conn| stage::load_staging(conn, generation, rows, batch_size))
      .await
      .map_err(|source| Error::Load { kind, source })?;

    tracing::info!(
      %kind,
      %generation,
      loaded = report.loaded,
      skipped = report.skipped,
      "loaded staging relation"
    );
    Ok(report)
  }

  async fn promote(&self, generation: Generation) -> Result<()> {
    let previous = self
      .writer
      .call(move |conn| stage::promote(conn, generation))
      .await
      .map_err(Error::Swap)?;
    tracing::info!(%previous, %generation, "promoted generation");

    // Reclaiming is not part of the swap; a failure here leaves tables the
    // next `begin_staging` drops.
    if let Err(e) = self
      .writer
      .call(move |conn| Ok(stage::drop_generation(conn, previous)?))
      .await
    {
      tracing::warn!(%previous, error = %e, "failed to reclaim previous generation");
    }
    Ok(())
  }

  async fn discard_staging(&self, generation: Generation) -> Result<()> {
    if generation == self.live_generation().await? {
      return Err(Error::LiveGeneration(generation));
    }
    self
      .writer
      .call(move |conn| Ok(stage::drop_generation(conn, generation)?))
      .await?;
    tracing::info!(%generation, "discarded staging generation");
    Ok(())
  }

  async fn live_generation(&self) -> Result<Generation> {
    Ok(
      self
        .writer
        .call(|conn| Ok(stage::live_generation(conn)?))
        .await?,
    )
  }

  // ── Refresh log ───────────────────────────────────────────────────────────

  async fn append_refresh_log(&self, entry: RefreshLogEntry) -> Result<()> {
    let started_at = encode_dt(entry.started_at);
    let finished_at = encode_dt(entry.finished_at);
    let status = entry.status.as_str();
    let loaded = i64::try_from(entry.records_loaded).unwrap_or(i64::MAX);
    let skipped = i64::try_from(entry.records_skipped).unwrap_or(i64::MAX);
    let error = entry.error_message;

    self
      .writer
      .call(move |conn| {
        conn.execute(
          "INSERT INTO refresh_log (
             started_at, finished_at, status,
             records_loaded, records_skipped, error_message
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![started_at, finished_at, status, loaded, skipped, error],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn last_refresh(&self, successful_only: bool) -> Result<Option<RefreshLogEntry>> {
    let filter = if successful_only {
      format!("WHERE status = '{}'", RefreshStatus::Success.as_str())
    } else {
      String::new()
    };

    let raw: Option<RawLogEntry> = self
      .reader()
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT started_at, finished_at, status,
                        records_loaded, records_skipped, error_message
                 FROM refresh_log {filter}
                 ORDER BY id DESC LIMIT 1"
              ),
              [],
              |row| {
                Ok(RawLogEntry {
                  started_at:      row.get(0)?,
                  finished_at:     row.get(1)?,
                  status:          row.get(2)?,
                  records_loaded:  row.get(3)?,
                  records_skipped: row.get(4)?,
                  error_message:   row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLogEntry::into_entry).transpose()
  }
}
