//! Typed records for the four upstream flat files.
//!
//! Every record carries the subject key (the ULS unique system identifier)
//! that joins one licence's rows across files. Blank upstream values are
//! `None`.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier shared by one licence's amateur, entity, header and history rows.
pub type SubjectKey = i64;

/// The four record types of the upstream dump.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
  Amateur,
  Entity,
  Header,
  History,
}

impl RecordKind {
  pub const ALL: [RecordKind; 4] =
    [Self::Amateur, Self::Entity, Self::Header, Self::History];

  /// Member name inside the upstream archive.
  pub fn file_name(self) -> &'static str {
    match self {
      Self::Amateur => "AM.dat",
      Self::Entity => "EN.dat",
      Self::Header => "HD.dat",
      Self::History => "HS.dat",
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Amateur => "amateur",
      Self::Entity => "entity",
      Self::Header => "header",
      Self::History => "history",
    }
  }
}

impl fmt::Display for RecordKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Amateur licence data (`AM.dat`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmateurRecord {
  pub subject_key:             SubjectKey,
  pub call_sign:               Option<String>,
  pub operator_class:          Option<String>,
  pub group_code:              Option<String>,
  pub region_code:             Option<String>,
  pub trustee_call_sign:       Option<String>,
  pub trustee_indicator:       Option<String>,
  pub previous_call_sign:      Option<String>,
  pub previous_operator_class: Option<String>,
  pub trustee_name:            Option<String>,
}

/// Licensee name and address data (`EN.dat`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
  pub subject_key:    SubjectKey,
  pub call_sign:      Option<String>,
  /// `L` for the licensee row; other values describe contacts and owners.
  pub entity_type:    Option<String>,
  pub entity_name:    Option<String>,
  pub first_name:     Option<String>,
  pub middle_initial: Option<String>,
  pub last_name:      Option<String>,
  pub suffix:         Option<String>,
  pub phone:          Option<String>,
  pub email:          Option<String>,
  pub street_address: Option<String>,
  pub city:           Option<String>,
  pub state:          Option<String>,
  pub zip_code:       Option<String>,
  pub po_box:         Option<String>,
  /// FCC Registration Number; groups every licence held by one registrant.
  pub registrant_key: Option<String>,
  pub applicant_type: Option<String>,
}

/// Licence status and dates (`HD.dat`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
  pub subject_key:       SubjectKey,
  pub call_sign:         Option<String>,
  pub license_status:    Option<String>,
  pub radio_service:     Option<String>,
  pub grant_date:        Option<NaiveDate>,
  pub expired_date:      Option<NaiveDate>,
  pub cancellation_date: Option<NaiveDate>,
  pub effective_date:    Option<NaiveDate>,
  pub last_action_date:  Option<NaiveDate>,
}

/// One licence history event (`HS.dat`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
  pub subject_key: SubjectKey,
  pub call_sign:   Option<String>,
  pub event_date:  Option<NaiveDate>,
  pub code:        Option<String>,
}
