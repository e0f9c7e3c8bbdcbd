//! Enriched read models returned to callers.
//!
//! Store rows carry bare codes; these types pair every code with its
//! description from one [`CodeTables`] snapshot, so a whole response is
//! described by a single consistent set of mappings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  codes::{CodeSpace, CodeTables},
  record::{AmateurRecord, EntityRecord, HeaderRecord, HistoryRecord, SubjectKey},
  store::{LicenseRecords, LicenseRow, RegistrantHistory},
};

/// A code together with its description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coded {
  pub code:        String,
  pub description: String,
}

impl Coded {
  fn describe(space: CodeSpace, code: Option<&str>, codes: &CodeTables) -> Option<Self> {
    code.map(|code| Self {
      code:        code.to_owned(),
      description: codes.describe(space, code).to_owned(),
    })
  }
}

// ─── Search results ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameInfo {
  pub entity_name:    Option<String>,
  pub first_name:     Option<String>,
  pub middle_initial: Option<String>,
  pub last_name:      Option<String>,
  pub suffix:         Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
  pub street:   Option<String>,
  pub city:     Option<String>,
  pub state:    Option<String>,
  pub zip_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
  pub operator_class: Option<Coded>,
  pub status:         Option<Coded>,
  pub grant_date:     Option<NaiveDate>,
  pub expired_date:   Option<NaiveDate>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSummary {
  pub subject_key:        SubjectKey,
  pub call_sign:          Option<String>,
  pub name:               NameInfo,
  pub address:            AddressInfo,
  pub registrant_key:     Option<String>,
  pub license:            LicenseInfo,
  pub trustee_call_sign:  Option<String>,
  pub previous_call_sign: Option<String>,
}

impl LicenseSummary {
  pub fn enrich(row: LicenseRow, codes: &CodeTables) -> Self {
    let license = LicenseInfo {
      operator_class: Coded::describe(
        CodeSpace::OperatorClass,
        row.operator_class.as_deref(),
        codes,
      ),
      status:         Coded::describe(
        CodeSpace::LicenseStatus,
        row.license_status.as_deref(),
        codes,
      ),
      grant_date:     row.grant_date,
      expired_date:   row.expired_date,
    };
    Self {
      subject_key: row.subject_key,
      call_sign: row.call_sign,
      name: NameInfo {
        entity_name:    row.entity_name,
        first_name:     row.first_name,
        middle_initial: row.middle_initial,
        last_name:      row.last_name,
        suffix:         row.suffix,
      },
      address: AddressInfo {
        street:   row.street_address,
        city:     row.city,
        state:    row.state,
        zip_code: row.zip_code,
      },
      registrant_key: row.registrant_key,
      license,
      trustee_call_sign: row.trustee_call_sign,
      previous_call_sign: row.previous_call_sign,
    }
  }
}

/// A page of enriched search hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPage {
  pub total:   u64,
  pub offset:  u64,
  pub limit:   u32,
  pub results: Vec<LicenseSummary>,
}

// ─── Single licence ──────────────────────────────────────────────────────────

/// Every live record for one subject key, with codes described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseDetail {
  pub subject_key:    SubjectKey,
  pub amateur:        Option<AmateurRecord>,
  pub entity:         Option<EntityRecord>,
  pub header:         Option<HeaderRecord>,
  pub operator_class: Option<Coded>,
  pub license_status: Option<Coded>,
}

impl LicenseDetail {
  pub fn enrich(records: LicenseRecords, codes: &CodeTables) -> Self {
    let operator_class = Coded::describe(
      CodeSpace::OperatorClass,
      records
        .amateur
        .as_ref()
        .and_then(|a| a.operator_class.as_deref()),
      codes,
    );
    let license_status = Coded::describe(
      CodeSpace::LicenseStatus,
      records
        .header
        .as_ref()
        .and_then(|h| h.license_status.as_deref()),
      codes,
    );
    Self {
      subject_key: records.subject_key,
      amateur: records.amateur,
      entity: records.entity,
      header: records.header,
      operator_class,
      license_status,
    }
  }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// A history row with its event description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  #[serde(flatten)]
  pub record:      HistoryRecord,
  pub description: Option<String>,
}

impl HistoryEntry {
  pub fn enrich(record: HistoryRecord, codes: &CodeTables) -> Self {
    let description = record
      .code
      .as_deref()
      .map(|c| codes.describe(CodeSpace::History, c).to_owned());
    Self { record, description }
  }

  pub fn enrich_all(records: Vec<HistoryRecord>, codes: &CodeTables) -> Vec<Self> {
    records
      .into_iter()
      .map(|r| Self::enrich(r, codes))
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrantHistoryView {
  pub subject_keys: Vec<SubjectKey>,
  pub records:      Vec<HistoryEntry>,
}

impl RegistrantHistoryView {
  pub fn enrich(history: RegistrantHistory, codes: &CodeTables) -> Self {
    Self {
      subject_keys: history.subject_keys,
      records:      HistoryEntry::enrich_all(history.records, codes),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codes::UNKNOWN_CODE;

  #[test]
  fn summary_describes_codes() {
    let codes = CodeTables::builtin();
    let row = LicenseRow {
      subject_key: 100,
      call_sign: Some("W1AW".into()),
      operator_class: Some("E".into()),
      license_status: Some("Q".into()),
      ..LicenseRow::default()
    };
    let summary = LicenseSummary::enrich(row, &codes);
    let class = summary.license.operator_class.unwrap();
    assert_eq!(class.description, "Amateur Extra");
    let status = summary.license.status.unwrap();
    assert_eq!(status.code, "Q");
    assert_eq!(status.description, UNKNOWN_CODE);
  }

  #[test]
  fn blank_codes_stay_absent() {
    let codes = CodeTables::builtin();
    let summary = LicenseSummary::enrich(LicenseRow::default(), &codes);
    assert!(summary.license.operator_class.is_none());
    assert!(summary.license.status.is_none());

    let entry = HistoryEntry::enrich(HistoryRecord::default(), &codes);
    assert!(entry.description.is_none());
  }
}
