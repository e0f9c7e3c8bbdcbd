//! Column layouts of the four upstream files.
//!
//! Positions are 0-based and follow the published ULS public-access layout.
//! Only the columns the mirror keeps are read; the rest are still counted.

use callbook_core::{
  ParseError,
  record::{AmateurRecord, EntityRecord, HeaderRecord, HistoryRecord, RecordKind},
};

use crate::{DatRecord, Fields};

// Shared by every layout.
const SUBJECT_KEY: usize = 1;

impl DatRecord for AmateurRecord {
  const KIND: RecordKind = RecordKind::Amateur;
  const TAG: &'static str = "AM";
  const COLUMNS: usize = 18;

  fn from_fields(f: &Fields<'_>) -> Result<Self, ParseError> {
    Ok(Self {
      subject_key:             f.key(SUBJECT_KEY)?,
      call_sign:               f.text(4),
      operator_class:          f.text(5),
      group_code:              f.text(6),
      region_code:             f.text(7),
      trustee_call_sign:       f.text(8),
      trustee_indicator:       f.text(9),
      previous_call_sign:      f.text(15),
      previous_operator_class: f.text(16),
      trustee_name:            f.text(17),
    })
  }
}

impl DatRecord for EntityRecord {
  const KIND: RecordKind = RecordKind::Entity;
  const TAG: &'static str = "EN";
  const COLUMNS: usize = 30;

  fn from_fields(f: &Fields<'_>) -> Result<Self, ParseError> {
    Ok(Self {
      subject_key:    f.key(SUBJECT_KEY)?,
      call_sign:      f.text(4),
      entity_type:    f.text(5),
      entity_name:    f.text(7),
      first_name:     f.text(8),
      middle_initial: f.text(9),
      last_name:      f.text(10),
      suffix:         f.text(11),
      phone:          f.text(12),
      email:          f.text(14),
      street_address: f.text(15),
      city:           f.text(16),
      state:          f.text(17),
      zip_code:       f.text(18),
      po_box:         f.text(19),
      registrant_key: f.text(22),
      applicant_type: f.text(23),
    })
  }
}

impl DatRecord for HeaderRecord {
  const KIND: RecordKind = RecordKind::Header;
  const TAG: &'static str = "HD";
  const COLUMNS: usize = 59;

  fn from_fields(f: &Fields<'_>) -> Result<Self, ParseError> {
    Ok(Self {
      subject_key:       f.key(SUBJECT_KEY)?,
      call_sign:         f.text(4),
      license_status:    f.text(5),
      radio_service:     f.text(6),
      grant_date:        f.date(7, "grant_date")?,
      expired_date:      f.date(8, "expired_date")?,
      cancellation_date: f.date(9, "cancellation_date")?,
      effective_date:    f.date(42, "effective_date")?,
      last_action_date:  f.date(43, "last_action_date")?,
    })
  }
}

impl DatRecord for HistoryRecord {
  const KIND: RecordKind = RecordKind::History;
  const TAG: &'static str = "HS";
  const COLUMNS: usize = 6;

  fn from_fields(f: &Fields<'_>) -> Result<Self, ParseError> {
    Ok(Self {
      subject_key: f.key(SUBJECT_KEY)?,
      call_sign:   f.text(3),
      event_date:  f.date(4, "log_date")?,
      code:        f.text(5),
    })
  }
}
