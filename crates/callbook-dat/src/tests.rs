use std::io::{Cursor, Write as _};

use callbook_core::{
  ParseError,
  record::{AmateurRecord, EntityRecord, HeaderRecord, HistoryRecord, RecordKind},
  store::StagingRows,
};
use chrono::NaiveDate;

use super::*;

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Build one pipe-delimited line of `columns` columns with the given values
/// placed at their positions.
fn line(tag: &str, columns: usize, values: &[(usize, &str)]) -> String {
  let mut cols = vec![String::new(); columns];
  cols[0] = tag.to_owned();
  for (idx, v) in values {
    cols[*idx] = (*v).to_owned();
  }
  cols.join("|")
}

fn am(key: &str, call: &str, class: &str) -> String {
  line("AM", 18, &[(1, key), (4, call), (5, class)])
}

fn parse<T: DatRecord>(text: &str) -> Vec<Result<T, ParseError>> {
  DatRows::<_, T>::new(Cursor::new(text.as_bytes().to_vec())).collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ─── Record layouts ──────────────────────────────────────────────────────────

#[test]
fn parses_amateur_line() {
  let text = line("AM", 18, &[
    (1, "100"),
    (4, "W1AW"),
    (5, "E"),
    (8, "W1XX"),
    (15, "KA1AAA"),
    (16, "G"),
    (17, "Hiram Maxim"),
  ]);
  let rows = parse::<AmateurRecord>(&text);
  assert_eq!(rows.len(), 1);
  let am = rows.into_iter().next().unwrap().unwrap();
  assert_eq!(am.subject_key, 100);
  assert_eq!(am.call_sign.as_deref(), Some("W1AW"));
  assert_eq!(am.operator_class.as_deref(), Some("E"));
  assert_eq!(am.trustee_call_sign.as_deref(), Some("W1XX"));
  assert_eq!(am.previous_call_sign.as_deref(), Some("KA1AAA"));
  assert_eq!(am.previous_operator_class.as_deref(), Some("G"));
  assert_eq!(am.trustee_name.as_deref(), Some("Hiram Maxim"));
  assert!(am.group_code.is_none());
}

#[test]
fn parses_entity_line() {
  let text = line("EN", 30, &[
    (1, "200"),
    (4, "W1XYZ"),
    (5, "L"),
    (7, "Jane Q Doe"),
    (8, "Jane"),
    (9, "Q"),
    (10, "Doe"),
    (15, "1 Main St"),
    (16, "Newington"),
    (17, "CT"),
    (18, "06111"),
    (22, "0001234567"),
    (23, "I"),
  ]);
  let en = parse::<EntityRecord>(&text).remove(0).unwrap();
  assert_eq!(en.subject_key, 200);
  assert_eq!(en.entity_type.as_deref(), Some("L"));
  assert_eq!(en.first_name.as_deref(), Some("Jane"));
  assert_eq!(en.middle_initial.as_deref(), Some("Q"));
  assert_eq!(en.last_name.as_deref(), Some("Doe"));
  assert_eq!(en.city.as_deref(), Some("Newington"));
  assert_eq!(en.state.as_deref(), Some("CT"));
  assert_eq!(en.zip_code.as_deref(), Some("06111"));
  assert_eq!(en.registrant_key.as_deref(), Some("0001234567"));
  assert_eq!(en.applicant_type.as_deref(), Some("I"));
  assert!(en.suffix.is_none());
}

#[test]
fn parses_header_dates() {
  let text = line("HD", 59, &[
    (1, "300"),
    (4, "K2ABC"),
    (5, "A"),
    (6, "HA"),
    (7, "03/15/2023"),
    (8, "03/15/2033"),
    (43, "12/01/2024"),
  ]);
  let hd = parse::<HeaderRecord>(&text).remove(0).unwrap();
  assert_eq!(hd.license_status.as_deref(), Some("A"));
  assert_eq!(hd.radio_service.as_deref(), Some("HA"));
  assert_eq!(hd.grant_date, Some(date(2023, 3, 15)));
  assert_eq!(hd.expired_date, Some(date(2033, 3, 15)));
  assert_eq!(hd.cancellation_date, None);
  assert_eq!(hd.effective_date, None);
  assert_eq!(hd.last_action_date, Some(date(2024, 12, 1)));
}

#[test]
fn parses_history_line() {
  let rows = parse::<HistoryRecord>("HS|300||K2ABC|05/02/2021|LIISS\n");
  let hs = rows.into_iter().next().unwrap().unwrap();
  assert_eq!(hs.subject_key, 300);
  assert_eq!(hs.call_sign.as_deref(), Some("K2ABC"));
  assert_eq!(hs.event_date, Some(date(2021, 5, 2)));
  assert_eq!(hs.code.as_deref(), Some("LIISS"));
}

// ─── Malformed lines ─────────────────────────────────────────────────────────

#[test]
fn wrong_column_count_is_skipped_not_fatal() {
  let text = format!(
    "{}\nAM|101|too|few\n{}\n",
    am("100", "W1AW", "E"),
    am("102", "W1BB", "G"),
  );
  let rows = parse::<AmateurRecord>(&text);
  assert_eq!(rows.len(), 3);
  assert!(rows[0].is_ok());
  match &rows[1] {
    Err(ParseError::ColumnCount {
      line,
      expected,
      found,
    }) => {
      assert_eq!(*line, 2);
      assert_eq!(*expected, 18);
      assert_eq!(*found, 4);
    }
    other => panic!("expected column count error, got {other:?}"),
  }
  assert!(!rows[1].as_ref().unwrap_err().is_fatal());
  assert_eq!(rows[2].as_ref().unwrap().call_sign.as_deref(), Some("W1BB"));
}

#[test]
fn wrong_record_type_is_rejected() {
  let text = line("EN", 18, &[(1, "100")]);
  let rows = parse::<AmateurRecord>(&text);
  assert!(matches!(
    &rows[0],
    Err(ParseError::RecordType { expected: "AM", found, .. }) if found == "EN"
  ));
}

#[test]
fn bad_subject_key_is_rejected() {
  let rows = parse::<AmateurRecord>(&am("abc", "W1AW", "E"));
  assert!(matches!(&rows[0], Err(ParseError::SubjectKey { value, .. }) if value == "abc"));
}

#[test]
fn bad_date_is_rejected() {
  let rows = parse::<HistoryRecord>("HS|1||W1AW|2021-05-02|LIISS\nHS|2||W1AW|13/45/2021|LIISS\n");
  assert_eq!(rows.len(), 2);
  for (i, row) in rows.iter().enumerate() {
    match row {
      Err(ParseError::Date { line, column, .. }) => {
        assert_eq!(*line, i as u64 + 1);
        assert_eq!(*column, "log_date");
      }
      other => panic!("expected date error, got {other:?}"),
    }
  }
}

// ─── Text handling ───────────────────────────────────────────────────────────

#[test]
fn blank_and_whitespace_values_are_none() {
  let text = line("AM", 18, &[(1, "100"), (4, "W1AW"), (5, "   ")]);
  let am = parse::<AmateurRecord>(&text).remove(0).unwrap();
  assert!(am.operator_class.is_none());
  assert!(am.region_code.is_none());
}

#[test]
fn values_are_trimmed_and_quotes_dropped() {
  let text = line("EN", 30, &[(1, " 200 "), (7, "\"Big\" Radio Club "), (16, " Hartford")]);
  let en = parse::<EntityRecord>(&text).remove(0).unwrap();
  assert_eq!(en.subject_key, 200);
  assert_eq!(en.entity_name.as_deref(), Some("Big Radio Club"));
  assert_eq!(en.city.as_deref(), Some("Hartford"));
}

#[test]
fn crlf_and_blank_lines() {
  let text = format!(
    "{}\r\n\r\n   \n{}\r\n",
    am("100", "W1AW", "E"),
    am("101", "W1BB", "G"),
  );
  let rows: Vec<_> = parse::<AmateurRecord>(&text)
    .into_iter()
    .map(|r| r.unwrap())
    .collect();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].trustee_name, None);
  assert_eq!(rows[1].call_sign.as_deref(), Some("W1BB"));
}

#[test]
fn latin1_bytes_are_decoded() {
  let mut bytes = line("EN", 30, &[(1, "200"), (16, "X")]).into_bytes();
  // Replace the city with "Peñuelas" encoded as Latin-1.
  let pos = bytes.iter().position(|b| *b == b'X').unwrap();
  bytes.splice(pos..=pos, b"Pe\xF1uelas".iter().copied());
  let rows: Vec<_> = DatRows::<_, EntityRecord>::new(Cursor::new(bytes)).collect();
  let en = rows.into_iter().next().unwrap().unwrap();
  assert_eq!(en.city.as_deref(), Some("Peñuelas"));
}

#[test]
fn last_line_without_newline() {
  let rows = parse::<HistoryRecord>("HS|1||W1AW|01/02/2003|LIISS");
  assert_eq!(rows.len(), 1);
  assert!(rows[0].is_ok());
}

// ─── Files ───────────────────────────────────────────────────────────────────

#[test]
fn dat_file_rows_restart_from_the_top() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  writeln!(file, "{}", am("100", "W1AW", "E")).unwrap();
  writeln!(file, "{}", am("101", "W1BB", "G")).unwrap();
  file.flush().unwrap();

  let dat = DatFile::<AmateurRecord>::new(file.path());
  assert_eq!(dat.path(), file.path());
  let first: Vec<_> = dat.rows().unwrap().map(|r| r.unwrap().subject_key).collect();
  let second: Vec<_> = dat.rows().unwrap().map(|r| r.unwrap().subject_key).collect();
  assert_eq!(first, vec![100, 101]);
  assert_eq!(first, second);
}

#[test]
fn missing_file_is_an_io_error() {
  let dat = DatFile::<AmateurRecord>::new("/nonexistent/AM.dat");
  assert!(dat.rows().is_err());
}

#[test]
fn staging_rows_match_kind() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  writeln!(file, "HS|1||W1AW|01/02/2003|LIISS").unwrap();
  writeln!(file, "HS|bogus").unwrap();
  file.flush().unwrap();

  let rows = staging_rows(RecordKind::History, file.path()).unwrap();
  assert_eq!(rows.kind(), RecordKind::History);
  let StagingRows::History(stream) = rows else {
    panic!("expected history rows");
  };
  let (ok, bad): (Vec<_>, Vec<_>) = stream.partition(|r| r.is_ok());
  assert_eq!(ok.len(), 1);
  assert_eq!(bad.len(), 1);

  for kind in RecordKind::ALL {
    assert_eq!(staging_rows(kind, file.path()).unwrap().kind(), kind);
  }
}
