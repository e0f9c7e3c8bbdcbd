//! Generation bookkeeping on the writer connection: bootstrap, staging
//! allocation, bulk load, promotion and reclamation.
//!
//! Every function here is synchronous and runs inside a single
//! `tokio_rusqlite::Connection::call` on the writer thread.

use callbook_core::{
  record::RecordKind,
  store::{Generation, LoadReport, RowStream, StagingRows},
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};

use crate::{
  encode::StageRow,
  schema::{self, META_LIVE, META_NEXT},
};

pub fn live_generation(conn: &Connection) -> rusqlite::Result<Generation> {
  let n: i64 = conn.query_row(
    "SELECT value FROM meta WHERE key = ?1",
    [META_LIVE],
    |r| r.get(0),
  )?;
  Ok(Generation(n as u64))
}

/// Create the empty generation 0 and point the views at it, once.
pub fn bootstrap(conn: &mut Connection) -> rusqlite::Result<()> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let live: Option<i64> = tx
    .query_row("SELECT value FROM meta WHERE key = ?1", [META_LIVE], |r| {
      r.get(0)
    })
    .optional()?;

  if live.is_none() {
    let g0 = Generation(0);
    for kind in RecordKind::ALL {
      tx.execute_batch(&schema::create_table(kind, g0))?;
    }
    tx.execute_batch(&schema::point_views(g0))?;
    tx.execute(
      "INSERT INTO meta (key, value) VALUES (?1, 0), (?2, 1)",
      [META_LIVE, META_NEXT],
    )?;
  }
  tx.commit()
}

/// Every physical generation table present in the database.
fn generation_tables(
  conn: &Connection,
) -> rusqlite::Result<Vec<(RecordKind, Generation, String)>> {
  let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
  let names = stmt
    .query_map([], |r| r.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(
    names
      .into_iter()
      .filter_map(|name| {
        schema::parse_table_name(&name).map(|(kind, generation)| (kind, generation, name))
      })
      .collect(),
  )
}

/// Drop every non-live generation and allocate the next generation number.
pub fn begin(conn: &mut Connection) -> rusqlite::Result<Generation> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let live = live_generation(&tx)?;

  let mut dropped = 0usize;
  for (_, generation, name) in generation_tables(&tx)? {
    if generation != live {
      tx.execute_batch(&format!("DROP TABLE {name};"))?;
      dropped += 1;
    }
  }

  let next: i64 = tx.query_row(
    "SELECT value FROM meta WHERE key = ?1",
    [META_NEXT],
    |r| r.get(0),
  )?;
  let generation = Generation((next.max(0) as u64).max(live.0 + 1));
  tx.execute(
    "UPDATE meta SET value = ?1 WHERE key = ?2",
    rusqlite::params![(generation.0 + 1) as i64, META_NEXT],
  )?;
  tx.commit()?;

  if dropped > 0 {
    tracing::info!(dropped, "dropped abandoned staging tables");
  }
  Ok(generation)
}

/// Create the staging table for `rows.kind()` and bulk-insert into it.
pub fn load_staging(
  conn: &mut Connection,
  generation: Generation,
  rows: StagingRows,
  batch_size: usize,
) -> tokio_rusqlite::Result<LoadReport> {
  match rows {
    StagingRows::Amateur(rows) => load(conn, generation, rows, batch_size),
    StagingRows::Entity(rows) => load(conn, generation, rows, batch_size),
    StagingRows::Header(rows) => load(conn, generation, rows, batch_size),
    StagingRows::History(rows) => load(conn, generation, rows, batch_size),
  }
}

fn load<T: StageRow>(
  conn: &mut Connection,
  generation: Generation,
  mut rows: RowStream<T>,
  batch_size: usize,
) -> tokio_rusqlite::Result<LoadReport> {
  let kind = T::KIND;
  let batch_size = batch_size.max(1);
  conn.execute_batch(&schema::create_table(kind, generation))?;
  let sql = schema::insert_row(kind, generation);

  let mut loaded = 0u64;
  let mut skipped = 0u64;
  let mut exhausted = false;
  while !exhausted {
    let tx = conn.transaction()?;
    let mut in_batch = 0usize;
    {
      let mut stmt = tx.prepare(&sql)?;
      while in_batch < batch_size {
        match rows.next() {
          None => {
            exhausted = true;
            break;
          }
          Some(Ok(record)) => {
            record.insert(&mut stmt)?;
            in_batch += 1;
          }
          Some(Err(e)) if e.is_fatal() => {
            return Err(tokio_rusqlite::Error::Other(Box::new(e)));
          }
          Some(Err(e)) => {
            skipped += 1;
            tracing::trace!(%kind, error = %e, "skipping malformed line");
          }
        }
      }
    }
    tx.commit()?;
    loaded += in_batch as u64;
    tracing::debug!(%kind, %generation, loaded, skipped, "committed staging batch");
  }

  conn.execute_batch(&schema::create_indexes(kind, generation))?;
  Ok(LoadReport { kind, loaded, skipped })
}

/// Re-point all four live views at `generation` in one transaction.
///
/// Returns the previously live generation, whose tables are still present.
pub fn promote(
  conn: &mut Connection,
  generation: Generation,
) -> tokio_rusqlite::Result<Generation> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let previous = live_generation(&tx)?;
  if generation == previous {
    return Err(tokio_rusqlite::Error::Other(
      format!("generation {generation} is already live").into(),
    ));
  }

  let present = generation_tables(&tx)?;
  for kind in RecordKind::ALL {
    if !present.iter().any(|(k, g, _)| *k == kind && *g == generation) {
      return Err(tokio_rusqlite::Error::Other(
        format!(
          "missing staging table {}",
          schema::table_name(kind, generation)
        )
        .into(),
      ));
    }
  }

  tx.execute_batch(&schema::point_views(generation))?;
  tx.execute(
    "UPDATE meta SET value = ?1 WHERE key = ?2",
    rusqlite::params![generation.0 as i64, META_LIVE],
  )?;
  tx.commit()?;
  Ok(previous)
}

pub fn drop_generation(conn: &Connection, generation: Generation) -> rusqlite::Result<()> {
  for kind in RecordKind::ALL {
    conn.execute_batch(&format!(
      "DROP TABLE IF EXISTS {};",
      schema::table_name(kind, generation)
    ))?;
  }
  Ok(())
}
