//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use std::collections::BTreeSet;

use callbook_core::{
  ParseError,
  query::{LicenseQuery, QueryTranslator},
  record::{AmateurRecord, EntityRecord, HeaderRecord, HistoryRecord, RecordKind},
  refresh::{RefreshLogEntry, RefreshStatus},
  store::{Generation, LicenseStore, RowStream, StagingRows},
};
use chrono::{NaiveDate, TimeZone, Utc};

use crate::{Error, SqliteOptions, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stream<T: Send + 'static>(rows: Vec<T>) -> RowStream<T> {
  Box::new(rows.into_iter().map(Ok))
}

fn query(pairs: &[(&str, &str)]) -> LicenseQuery {
  QueryTranslator::default()
    .translate(pairs.iter().copied())
    .expect("valid query")
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// One refresh cycle's worth of records.
#[derive(Default)]
struct Dump {
  amateur: Vec<AmateurRecord>,
  entity:  Vec<EntityRecord>,
  header:  Vec<HeaderRecord>,
  history: Vec<HistoryRecord>,
}

impl Dump {
  /// A licensee with matching amateur, entity and header rows.
  fn licence(mut self, key: i64, call: &str, status: &str, class: &str) -> Self {
    self.amateur.push(AmateurRecord {
      subject_key: key,
      call_sign: Some(call.into()),
      operator_class: Some(class.into()),
      ..AmateurRecord::default()
    });
    self.entity.push(EntityRecord {
      subject_key: key,
      call_sign: Some(call.into()),
      entity_type: Some("L".into()),
      first_name: Some("Pat".into()),
      last_name: Some(format!("Operator{key}")),
      state: Some("CT".into()),
      registrant_key: Some(format!("{key:010}")),
      ..EntityRecord::default()
    });
    self.header.push(HeaderRecord {
      subject_key: key,
      call_sign: Some(call.into()),
      license_status: Some(status.into()),
      radio_service: Some("HA".into()),
      grant_date: Some(date(2020, 1, 15)),
      expired_date: Some(date(2030, 1, 15)),
      ..HeaderRecord::default()
    });
    self
  }

  fn event(mut self, key: i64, on: Option<NaiveDate>, code: &str) -> Self {
    self.history.push(HistoryRecord {
      subject_key: key,
      call_sign:   None,
      event_date:  on,
      code:        Some(code.into()),
    });
    self
  }

  fn entity_mut(&mut self, key: i64) -> &mut EntityRecord {
    self
      .entity
      .iter_mut()
      .find(|e| e.subject_key == key)
      .expect("fixture entity")
  }

  fn into_rows(self) -> Vec<StagingRows> {
    vec![
      StagingRows::Amateur(stream(self.amateur)),
      StagingRows::Entity(stream(self.entity)),
      StagingRows::Header(stream(self.header)),
      StagingRows::History(stream(self.history)),
    ]
  }
}

/// `n` licences numbered from 1, each with one history event.
fn sized(n: i64) -> Dump {
  (1..=n).fold(Dump::default(), |d, key| {
    d.licence(key, &format!("N{key}X"), "A", "T")
      .event(key, Some(date(2021, 1, 1)), "LIISS")
  })
}

/// The three-licence scenario used throughout.
fn scenario() -> Dump {
  Dump::default()
    .licence(100, "W1AW", "A", "E")
    .licence(200, "W1XYZ", "E", "G")
    .licence(300, "K2ABC", "A", "T")
}

async fn publish(s: &SqliteStore, dump: Dump) -> Generation {
  let generation = s.begin_staging().await.unwrap();
  for rows in dump.into_rows() {
    s.load_staging(generation, rows).await.unwrap();
  }
  s.promote(generation).await.unwrap();
  generation
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_answers_with_nothing() {
  let s = store().await;
  assert_eq!(s.live_generation().await.unwrap(), Generation(0));
  s.ping().await.unwrap();

  let page = s.search(&query(&[("call_sign", "*")])).await.unwrap();
  assert_eq!(page.total, 0);
  assert!(page.rows.is_empty());

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.records.amateur, 0);
  assert_eq!(stats.active_licenses, 0);
  assert!(stats.top_states.is_empty());
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_scenario() {
  let s = store().await;
  publish(&s, scenario()).await;

  let page = s.search(&query(&[("call_sign", "W1*")])).await.unwrap();
  assert_eq!(page.total, 2);
  let keys: Vec<_> = page.rows.iter().map(|r| r.subject_key).collect();
  assert_eq!(keys, vec![100, 200]);

  let page = s
    .search(&query(&[("call_sign", "W1*"), ("license_status", "A")]))
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  let row = &page.rows[0];
  assert_eq!(row.call_sign.as_deref(), Some("W1AW"));
  assert_eq!(row.operator_class.as_deref(), Some("E"));
  assert_eq!(row.license_status.as_deref(), Some("A"));
  assert_eq!(row.grant_date, Some(date(2020, 1, 15)));
}

#[tokio::test]
async fn wildcards_are_case_insensitive() {
  let s = store().await;
  publish(&s, scenario()).await;

  let page = s.search(&query(&[("callsign", "w?aw")])).await.unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.rows[0].subject_key, 100);

  let page = s.search(&query(&[("last_name", "operator*")])).await.unwrap();
  assert_eq!(page.total, 3);

  let page = s.search(&query(&[("call_sign", "W1")])).await.unwrap();
  assert_eq!(page.total, 0);
}

#[tokio::test]
async fn question_mark_is_exactly_one_character() {
  let s = store().await;
  let dump = scenario().licence(400, "W12AW", "A", "G");
  publish(&s, dump).await;

  let page = s.search(&query(&[("call_sign", "W?AW")])).await.unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.rows[0].call_sign.as_deref(), Some("W1AW"));

  let page = s.search(&query(&[("call_sign", "W*AW")])).await.unwrap();
  assert_eq!(page.total, 2);
}

#[tokio::test]
async fn case_folding_covers_latin1_letters() {
  let s = store().await;
  let mut dump = scenario();
  dump.entity_mut(100).last_name = Some("MÜLLER".into());
  publish(&s, dump).await;

  for pattern in ["MÜLLER", "müller", "Mü*", "m?ller"] {
    let page = s.search(&query(&[("last_name", pattern)])).await.unwrap();
    assert_eq!(page.total, 1, "{pattern}");
    assert_eq!(page.rows[0].subject_key, 100, "{pattern}");
  }
}

#[tokio::test]
async fn sql_metacharacters_are_literal() {
  let s = store().await;
  let mut dump = scenario();
  dump.entity_mut(100).entity_name = Some("ARRL_HQ".into());
  dump.entity_mut(200).entity_name = Some("ARRLXHQ".into());
  dump.entity_mut(300).entity_name = Some("100% Radio".into());
  publish(&s, dump).await;

  let page = s.search(&query(&[("entity_name", "ARRL_HQ")])).await.unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.rows[0].subject_key, 100);

  let page = s.search(&query(&[("entity_name", "100%*")])).await.unwrap();
  assert_eq!(page.total, 1);
  let page = s.search(&query(&[("entity_name", "1%")])).await.unwrap();
  assert_eq!(page.total, 0);
}

#[tokio::test]
async fn only_licensee_entities_are_searched() {
  let s = store().await;
  let mut dump = scenario();
  dump.entity.push(EntityRecord {
    subject_key: 100,
    call_sign: Some("W1AW".into()),
    entity_type: Some("CL".into()),
    ..EntityRecord::default()
  });
  publish(&s, dump).await;

  let page = s.search(&query(&[("call_sign", "W1AW")])).await.unwrap();
  assert_eq!(page.total, 1);
}

#[tokio::test]
async fn pagination_is_consistent_with_total() {
  let s = store().await;
  publish(&s, sized(7)).await;

  let mut seen = Vec::new();
  for offset in [0, 3, 6, 9] {
    let page = s
      .search(&query(&[
        ("call_sign", "N*"),
        ("limit", "3"),
        ("offset", &offset.to_string()),
      ]))
      .await
      .unwrap();
    assert_eq!(page.total, 7);
    assert!(page.rows.len() <= 3);
    seen.extend(page.rows.into_iter().map(|r| r.subject_key));
  }
  assert_eq!(seen, (1..=7).collect::<Vec<_>>());
}

// ─── Single licence ──────────────────────────────────────────────────────────

#[tokio::test]
async fn license_returns_all_relations() {
  let s = store().await;
  let mut dump = scenario();
  dump.entity.insert(0, EntityRecord {
    subject_key: 300,
    entity_type: Some("CE".into()),
    entity_name: Some("Contact".into()),
    ..EntityRecord::default()
  });
  publish(&s, dump).await;

  let records = s.license(300).await.unwrap().expect("licence 300");
  assert_eq!(records.subject_key, 300);
  assert_eq!(
    records.amateur.unwrap().operator_class.as_deref(),
    Some("T")
  );
  let entity = records.entity.unwrap();
  assert_eq!(entity.entity_type.as_deref(), Some("L"));
  assert_eq!(entity.registrant_key.as_deref(), Some("0000000300"));
  let header = records.header.unwrap();
  assert_eq!(header.expired_date, Some(date(2030, 1, 15)));
  assert_eq!(header.cancellation_date, None);

  assert!(s.license(999).await.unwrap().is_none());
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_is_newest_first_with_undated_last() {
  let s = store().await;
  let dump = scenario()
    .event(100, Some(date(2020, 3, 1)), "LIISS")
    .event(100, None, "LIMOD")
    .event(100, Some(date(2023, 6, 9)), "LIREN")
    .event(100, Some(date(2021, 11, 2)), "LIEXP")
    .event(200, Some(date(2024, 1, 1)), "LIISS");
  publish(&s, dump).await;

  let history = s.history(100).await.unwrap();
  let codes: Vec<_> = history.iter().map(|h| h.code.as_deref().unwrap()).collect();
  assert_eq!(codes, vec!["LIREN", "LIEXP", "LIISS", "LIMOD"]);
  assert!(history.iter().all(|h| h.subject_key == 100));

  assert!(s.history(999).await.unwrap().is_empty());
}

#[tokio::test]
async fn registrant_history_is_the_union_of_its_licences() {
  let s = store().await;
  let mut dump = scenario()
    .event(100, Some(date(2019, 1, 1)), "LIISS")
    .event(300, Some(date(2022, 1, 1)), "LIREN")
    .event(200, Some(date(2023, 1, 1)), "LIEXP");
  dump.entity_mut(300).registrant_key = Some("0000000100".into());
  publish(&s, dump).await;

  let history = s.registrant_history("0000000100").await.unwrap();
  assert_eq!(history.subject_keys, vec![100, 300]);
  let events: Vec<_> = history
    .records
    .iter()
    .map(|h| (h.subject_key, h.code.as_deref().unwrap()))
    .collect();
  assert_eq!(events, vec![(300, "LIREN"), (100, "LIISS")]);

  let unknown = s.registrant_history("9999999999").await.unwrap();
  assert!(unknown.subject_keys.is_empty());
  assert!(unknown.records.is_empty());
}

// ─── Staging & promotion ─────────────────────────────────────────────────────

#[tokio::test]
async fn promotion_replaces_every_relation() {
  let s = store().await;
  let first = publish(&s, scenario().event(100, None, "LIISS")).await;
  let second = publish(&s, sized(2)).await;
  assert!(second > first);
  assert_eq!(s.live_generation().await.unwrap(), second);

  assert_eq!(s.search(&query(&[("call_sign", "W1*")])).await.unwrap().total, 0);
  let stats = s.stats().await.unwrap();
  assert_eq!(stats.generation, second);
  assert_eq!(stats.records.amateur, 2);
  assert_eq!(stats.records.entity, 2);
  assert_eq!(stats.records.header, 2);
  assert_eq!(stats.records.history, 2);
}

#[tokio::test]
async fn failed_promotion_leaves_live_intact() {
  let s = store().await;
  let live = publish(&s, scenario()).await;

  let staging = s.begin_staging().await.unwrap();
  s.load_staging(staging, StagingRows::Amateur(stream(sized(5).amateur)))
    .await
    .unwrap();
  let err = s.promote(staging).await.unwrap_err();
  assert!(matches!(err, Error::Swap(_)), "got {err:?}");

  assert_eq!(s.live_generation().await.unwrap(), live);
  let page = s.search(&query(&[("call_sign", "W1*")])).await.unwrap();
  assert_eq!(page.total, 2);
  assert_eq!(s.stats().await.unwrap().records.amateur, 3);
}

#[tokio::test]
async fn abandoned_staging_is_dropped_by_the_next_cycle() {
  let s = store().await;
  publish(&s, scenario()).await;

  let abandoned = s.begin_staging().await.unwrap();
  for rows in sized(4).into_rows() {
    s.load_staging(abandoned, rows).await.unwrap();
  }

  let next = s.begin_staging().await.unwrap();
  assert!(next > abandoned);
  // The abandoned tables are gone, so they can no longer be promoted.
  assert!(matches!(
    s.promote(abandoned).await,
    Err(Error::Swap(_))
  ));
  assert_eq!(s.stats().await.unwrap().records.amateur, 3);
}

#[tokio::test]
async fn discard_drops_staging_but_never_live() {
  let s = store().await;
  let live = publish(&s, scenario()).await;

  let staging = s.begin_staging().await.unwrap();
  for rows in sized(2).into_rows() {
    s.load_staging(staging, rows).await.unwrap();
  }
  s.discard_staging(staging).await.unwrap();
  assert!(s.promote(staging).await.is_err());

  assert!(matches!(
    s.discard_staging(live).await,
    Err(Error::LiveGeneration(g)) if g == live
  ));
  assert!(matches!(
    s.load_staging(live, StagingRows::History(stream(Vec::new()))).await,
    Err(Error::LiveGeneration(_))
  ));
  assert_eq!(s.stats().await.unwrap().records.entity, 3);
}

#[tokio::test]
async fn malformed_rows_are_skipped_and_counted() {
  let s = SqliteStore::open_in_memory_with(SqliteOptions {
    batch_size:       2,
    reader_pool_size: 1,
  })
  .await
  .unwrap();

  let mut rows: Vec<Result<AmateurRecord, ParseError>> = sized(5)
    .amateur
    .into_iter()
    .map(Ok)
    .collect();
  rows.insert(2, Err(ParseError::ColumnCount {
    line:     3,
    expected: 18,
    found:    4,
  }));
  rows.push(Err(ParseError::SubjectKey {
    line:  8,
    value: "x".into(),
  }));

  let staging = s.begin_staging().await.unwrap();
  let report = s
    .load_staging(staging, StagingRows::Amateur(Box::new(rows.into_iter())))
    .await
    .unwrap();
  assert_eq!(report.kind, RecordKind::Amateur);
  assert_eq!(report.loaded, 5);
  assert_eq!(report.skipped, 2);
}

#[tokio::test]
async fn read_errors_fail_the_load() {
  let s = store().await;
  let rows: Vec<Result<HistoryRecord, ParseError>> = vec![
    Ok(HistoryRecord::default()),
    Err(ParseError::Io(std::io::Error::other("disk gone"))),
  ];

  let staging = s.begin_staging().await.unwrap();
  let err = s
    .load_staging(staging, StagingRows::History(Box::new(rows.into_iter())))
    .await
    .unwrap_err();
  assert!(
    matches!(err, Error::Load { kind: RecordKind::History, .. }),
    "got {err:?}"
  );
}

// ─── Stats ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stats_break_down_the_live_generation() {
  let s = store().await;
  let mut dump = scenario();
  dump.entity_mut(300).state = Some("NY".into());
  // A second active header for an already-counted call sign.
  dump.header.push(HeaderRecord {
    subject_key: 301,
    call_sign: Some("K2ABC".into()),
    license_status: Some("A".into()),
    ..HeaderRecord::default()
  });
  publish(&s, dump).await;

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.records.header, 4);
  assert_eq!(stats.active_licenses, 2);
  assert_eq!(stats.license_statuses.get("A"), Some(&3));
  assert_eq!(stats.license_statuses.get("E"), Some(&1));
  assert_eq!(stats.operator_classes.get("E"), Some(&1));
  assert_eq!(stats.operator_classes.len(), 3);
  assert_eq!(stats.top_states[0].state, "CT");
  assert_eq!(stats.top_states[0].count, 2);
  assert_eq!(stats.top_states[1].state, "NY");
}

// ─── Refresh log ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_log_returns_latest_entries() {
  let s = store().await;
  assert!(s.last_refresh(false).await.unwrap().is_none());

  let t = |h| Utc.with_ymd_and_hms(2024, 7, 1, h, 0, 0).unwrap();
  let ok = RefreshLogEntry {
    started_at:      t(1),
    finished_at:     t(2),
    status:          RefreshStatus::Success,
    records_loaded:  1_500_000,
    records_skipped: 3,
    error_message:   None,
  };
  let failed = RefreshLogEntry {
    started_at:      t(3),
    finished_at:     t(4),
    status:          RefreshStatus::Failed,
    records_loaded:  0,
    records_skipped: 0,
    error_message:   Some("download failed".into()),
  };
  s.append_refresh_log(ok.clone()).await.unwrap();
  s.append_refresh_log(failed.clone()).await.unwrap();

  assert_eq!(s.last_refresh(false).await.unwrap(), Some(failed));
  assert_eq!(s.last_refresh(true).await.unwrap(), Some(ok));
}

// ─── On disk ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_generation_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("callbook.db");

  let generation = {
    let s = SqliteStore::open(&path).await.unwrap();
    publish(&s, scenario()).await
  };

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.live_generation().await.unwrap(), generation);
  assert_eq!(s.search(&query(&[("state", "CT")])).await.unwrap().total, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_mixed_generation() {
  let dir = tempfile::tempdir().unwrap();
  let s = SqliteStore::open_with(dir.path().join("callbook.db"), SqliteOptions {
    batch_size:       16,
    reader_pool_size: 3,
  })
  .await
  .unwrap();
  publish(&s, sized(3)).await;

  let reader = {
    let s = s.clone();
    tokio::spawn(async move {
      let mut seen = BTreeSet::new();
      for _ in 0..200 {
        let records = s.stats().await.unwrap().records;
        assert_eq!(records.amateur, records.entity);
        assert_eq!(records.entity, records.header);
        assert_eq!(records.header, records.history);
        assert!(records.amateur == 3 || records.amateur == 120);
        seen.insert(records.amateur);
        tokio::task::yield_now().await;
      }
      seen
    })
  };

  publish(&s, sized(120)).await;
  let seen = reader.await.unwrap();
  assert!(!seen.is_empty());
  assert_eq!(s.stats().await.unwrap().records.amateur, 120);
}
