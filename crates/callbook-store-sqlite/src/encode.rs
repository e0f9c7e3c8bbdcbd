//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as ISO 8601
//! (`YYYY-MM-DD`), so dates sort correctly as text.

use callbook_core::{
  record::{AmateurRecord, EntityRecord, HeaderRecord, HistoryRecord, RecordKind},
  refresh::{RefreshLogEntry, RefreshStatus},
  store::LicenseRow,
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: Option<NaiveDate>) -> Option<String> {
  d.map(|d| d.format(DATE_FORMAT).to_string())
}

pub fn decode_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
  s.map(|s| {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
      .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
  })
  .transpose()
}

// ─── Staging rows ────────────────────────────────────────────────────────────

/// A record that can be bound to the insert statement of its staging table.
///
/// Parameters follow [`crate::schema::columns`] order.
pub trait StageRow: Send + 'static {
  const KIND: RecordKind;

  fn insert(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<usize>;
}

impl StageRow for AmateurRecord {
  const KIND: RecordKind = RecordKind::Amateur;

  fn insert(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<usize> {
    stmt.execute(rusqlite::params![
      self.subject_key,
      self.call_sign,
      self.operator_class,
      self.group_code,
      self.region_code,
      self.trustee_call_sign,
      self.trustee_indicator,
      self.previous_call_sign,
      self.previous_operator_class,
      self.trustee_name,
    ])
  }
}

impl StageRow for EntityRecord {
  const KIND: RecordKind = RecordKind::Entity;

  fn insert(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<usize> {
    stmt.execute(rusqlite::params![
      self.subject_key,
      self.call_sign,
      self.entity_type,
      self.entity_name,
      self.first_name,
      self.middle_initial,
      self.last_name,
      self.suffix,
      self.phone,
      self.email,
      self.street_address,
      self.city,
      self.state,
      self.zip_code,
      self.po_box,
      self.registrant_key,
      self.applicant_type,
    ])
  }
}

impl StageRow for HeaderRecord {
  const KIND: RecordKind = RecordKind::Header;

  fn insert(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<usize> {
    stmt.execute(rusqlite::params![
      self.subject_key,
      self.call_sign,
      self.license_status,
      self.radio_service,
      encode_date(self.grant_date),
      encode_date(self.expired_date),
      encode_date(self.cancellation_date),
      encode_date(self.effective_date),
      encode_date(self.last_action_date),
    ])
  }
}

impl StageRow for HistoryRecord {
  const KIND: RecordKind = RecordKind::History;

  fn insert(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<usize> {
    stmt.execute(rusqlite::params![
      self.subject_key,
      self.call_sign,
      encode_date(self.event_date),
      self.code,
    ])
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`read_amateur`].
pub const AMATEUR_COLUMNS: &str = "subject_key, call_sign, operator_class, \
  group_code, region_code, trustee_call_sign, trustee_indicator, \
  previous_call_sign, previous_operator_class, trustee_name";

pub fn read_amateur(row: &rusqlite::Row<'_>) -> rusqlite::Result<AmateurRecord> {
  Ok(AmateurRecord {
    subject_key:             row.get(0)?,
    call_sign:               row.get(1)?,
    operator_class:          row.get(2)?,
    group_code:              row.get(3)?,
    region_code:             row.get(4)?,
    trustee_call_sign:       row.get(5)?,
    trustee_indicator:       row.get(6)?,
    previous_call_sign:      row.get(7)?,
    previous_operator_class: row.get(8)?,
    trustee_name:            row.get(9)?,
  })
}

/// Column list matching [`read_entity`].
pub const ENTITY_COLUMNS: &str = "subject_key, call_sign, entity_type, \
  entity_name, first_name, middle_initial, last_name, suffix, phone, email, \
  street_address, city, state, zip_code, po_box, registrant_key, \
  applicant_type";

pub fn read_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRecord> {
  Ok(EntityRecord {
    subject_key:    row.get(0)?,
    call_sign:      row.get(1)?,
    entity_type:    row.get(2)?,
    entity_name:    row.get(3)?,
    first_name:     row.get(4)?,
    middle_initial: row.get(5)?,
    last_name:      row.get(6)?,
    suffix:         row.get(7)?,
    phone:          row.get(8)?,
    email:          row.get(9)?,
    street_address: row.get(10)?,
    city:           row.get(11)?,
    state:          row.get(12)?,
    zip_code:       row.get(13)?,
    po_box:         row.get(14)?,
    registrant_key: row.get(15)?,
    applicant_type: row.get(16)?,
  })
}

/// Column list matching [`RawHeader::read`].
pub const HEADER_COLUMNS: &str = "subject_key, call_sign, license_status, \
  radio_service, grant_date, expired_date, cancellation_date, \
  effective_date, last_action_date";

/// Raw values read directly from a `header` row.
pub struct RawHeader {
  pub subject_key:       i64,
  pub call_sign:         Option<String>,
  pub license_status:    Option<String>,
  pub radio_service:     Option<String>,
  pub grant_date:        Option<String>,
  pub expired_date:      Option<String>,
  pub cancellation_date: Option<String>,
  pub effective_date:    Option<String>,
  pub last_action_date:  Option<String>,
}

impl RawHeader {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_key:       row.get(0)?,
      call_sign:         row.get(1)?,
      license_status:    row.get(2)?,
      radio_service:     row.get(3)?,
      grant_date:        row.get(4)?,
      expired_date:      row.get(5)?,
      cancellation_date: row.get(6)?,
      effective_date:    row.get(7)?,
      last_action_date:  row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<HeaderRecord> {
    Ok(HeaderRecord {
      subject_key:       self.subject_key,
      call_sign:         self.call_sign,
      license_status:    self.license_status,
      radio_service:     self.radio_service,
      grant_date:        decode_date(self.grant_date.as_deref())?,
      expired_date:      decode_date(self.expired_date.as_deref())?,
      cancellation_date: decode_date(self.cancellation_date.as_deref())?,
      effective_date:    decode_date(self.effective_date.as_deref())?,
      last_action_date:  decode_date(self.last_action_date.as_deref())?,
    })
  }
}

/// Column list matching [`RawHistory::read`].
pub const HISTORY_COLUMNS: &str = "subject_key, call_sign, event_date, code";

/// Raw values read directly from a `history` row.
pub struct RawHistory {
  pub subject_key: i64,
  pub call_sign:   Option<String>,
  pub event_date:  Option<String>,
  pub code:        Option<String>,
}

impl RawHistory {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_key: row.get(0)?,
      call_sign:   row.get(1)?,
      event_date:  row.get(2)?,
      code:        row.get(3)?,
    })
  }

  pub fn into_record(self) -> Result<HistoryRecord> {
    Ok(HistoryRecord {
      subject_key: self.subject_key,
      call_sign:   self.call_sign,
      event_date:  decode_date(self.event_date.as_deref())?,
      code:        self.code,
    })
  }
}

/// Raw values of one row of the combined search view.
pub struct RawLicenseRow {
  pub subject_key:        i64,
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
  pub grant_date:         Option<String>,
  pub expired_date:       Option<String>,
}

impl RawLicenseRow {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_key:        row.get(0)?,
      call_sign:          row.get(1)?,
      entity_name:        row.get(2)?,
      first_name:         row.get(3)?,
      middle_initial:     row.get(4)?,
      last_name:          row.get(5)?,
      suffix:             row.get(6)?,
      street_address:     row.get(7)?,
      city:               row.get(8)?,
      state:              row.get(9)?,
      zip_code:           row.get(10)?,
      registrant_key:     row.get(11)?,
      operator_class:     row.get(12)?,
      trustee_call_sign:  row.get(13)?,
      previous_call_sign: row.get(14)?,
      license_status:     row.get(15)?,
      grant_date:         row.get(16)?,
      expired_date:       row.get(17)?,
    })
  }

  pub fn into_row(self) -> Result<LicenseRow> {
    Ok(LicenseRow {
      subject_key:        self.subject_key,
      call_sign:          self.call_sign,
      entity_name:        self.entity_name,
      first_name:         self.first_name,
      middle_initial:     self.middle_initial,
      last_name:          self.last_name,
      suffix:             self.suffix,
      street_address:     self.street_address,
      city:               self.city,
      state:              self.state,
      zip_code:           self.zip_code,
      registrant_key:     self.registrant_key,
      operator_class:     self.operator_class,
      trustee_call_sign:  self.trustee_call_sign,
      previous_call_sign: self.previous_call_sign,
      license_status:     self.license_status,
      grant_date:         decode_date(self.grant_date.as_deref())?,
      expired_date:       decode_date(self.expired_date.as_deref())?,
    })
  }
}

/// Raw values read directly from a `refresh_log` row.
pub struct RawLogEntry {
  pub started_at:      String,
  pub finished_at:     String,
  pub status:          String,
  pub records_loaded:  i64,
  pub records_skipped: i64,
  pub error_message:   Option<String>,
}

impl RawLogEntry {
  pub fn into_entry(self) -> Result<RefreshLogEntry> {
    Ok(RefreshLogEntry {
      started_at:      decode_dt(&self.started_at)?,
      finished_at:     decode_dt(&self.finished_at)?,
      status:          RefreshStatus::parse(&self.status).ok_or_else(|| {
        Error::Decode(format!("unknown refresh status: {:?}", self.status))
      })?,
      records_loaded:  self.records_loaded.max(0) as u64,
      records_skipped: self.records_skipped.max(0) as u64,
      error_message:   self.error_message,
    })
  }
}
