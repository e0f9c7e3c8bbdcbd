//! Line-level helpers: decoding, splitting and typed column access.

use callbook_core::{ParseError, record::SubjectKey};
use chrono::NaiveDate;

use crate::DatRecord;

/// Upstream date format, e.g. `03/15/2023`.
const DATE_FORMAT: &str = "%m/%d/%Y";

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn trim_line_ending(buf: &[u8]) -> &[u8] {
  let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
  buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Decode one Latin-1 line, dropping `"` characters.
///
/// Upstream quoting is unbalanced and never escapes the delimiter, so quotes
/// carry no meaning and only confuse downstream consumers.
pub(crate) fn decode_line(raw: &[u8]) -> String {
  raw
    .iter()
    .filter(|b| **b != b'"')
    .map(|b| char::from(*b))
    .collect()
}

/// The columns of one line, already checked against the record's layout.
pub struct Fields<'a> {
  line:   u64,
  values: Vec<&'a str>,
}

impl<'a> Fields<'a> {
  pub(crate) fn split<T: DatRecord>(line: u64, text: &'a str) -> Result<Self, ParseError> {
    let values: Vec<&str> = text.split('|').collect();
    if values.len() != T::COLUMNS {
      return Err(ParseError::ColumnCount {
        line,
        expected: T::COLUMNS,
        found: values.len(),
      });
    }
    let tag = values[0].trim();
    if tag != T::TAG {
      return Err(ParseError::RecordType {
        line,
        expected: T::TAG,
        found: tag.to_owned(),
      });
    }
    Ok(Self { line, values })
  }

  /// 1-based physical line number.
  pub fn line(&self) -> u64 { self.line }

  fn raw(&self, idx: usize) -> &'a str { self.values.get(idx).map_or("", |v| v.trim()) }

  /// Trimmed text, or `None` when blank.
  pub fn text(&self, idx: usize) -> Option<String> {
    let v = self.raw(idx);
    (!v.is_empty()).then(|| v.to_owned())
  }

  pub fn key(&self, idx: usize) -> Result<SubjectKey, ParseError> {
    let v = self.raw(idx);
    v.parse().map_err(|_| ParseError::SubjectKey {
      line:  self.line,
      value: v.to_owned(),
    })
  }

  /// A `MM/DD/YYYY` date, or `None` when blank.
  pub fn date(&self, idx: usize, column: &'static str) -> Result<Option<NaiveDate>, ParseError> {
    let v = self.raw(idx);
    if v.is_empty() {
      return Ok(None);
    }
    NaiveDate::parse_from_str(v, DATE_FORMAT)
      .map(Some)
      .map_err(|_| ParseError::Date {
        line: self.line,
        column,
        value: v.to_owned(),
      })
  }
}
