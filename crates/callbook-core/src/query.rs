//! Query translation: filter maps into wildcard predicates plus pagination.
//!
//! The set of searchable fields is fixed. Each entry of the field registry
//! names the storage column it reads, the compiler that turns the raw user
//! string into a [`WildcardPattern`], and the validator that pattern must
//! pass. Storage backends only ever see a [`LicenseQuery`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, record::RecordKind};

/// Longest accepted search pattern, in characters.
pub const MAX_PATTERN_LEN: usize = 100;

// ─── Field registry ──────────────────────────────────────────────────────────

/// A searchable field of the combined licence view.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QueryField {
  CallSign,
  FirstName,
  LastName,
  EntityName,
  City,
  State,
  ZipCode,
  StreetAddress,
  RegistrantKey,
  OperatorClass,
  LicenseStatus,
}

impl QueryField {
  pub fn spec(self) -> &'static FieldSpec { &FIELDS[self as usize] }

  pub fn column(self) -> ColumnRef { self.spec().column }
}

/// Where a field lives in storage: one column of one record type's relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
  pub relation: RecordKind,
  pub column:   &'static str,
}

/// One entry of the static field registry.
#[derive(Debug)]
pub struct FieldSpec {
  pub field:       QueryField,
  pub name:        &'static str,
  pub aliases:     &'static [&'static str],
  pub description: &'static str,
  pub column:      ColumnRef,
  compile:         fn(&str) -> WildcardPattern,
  validate:        fn(&WildcardPattern) -> Result<(), String>,
}

impl FieldSpec {
  /// Resolve a user-facing field name or alias.
  pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    FIELDS
      .iter()
      .find(|spec| spec.name == name || spec.aliases.contains(&name))
  }

  pub fn all() -> &'static [FieldSpec] { &FIELDS }

  pub fn compile(&self, raw: &str) -> Result<WildcardPattern> {
    let pattern = (self.compile)(raw);
    (self.validate)(&pattern)
      .map_err(|reason| Error::Validation(format!("{}: {reason}", self.name)))?;
    Ok(pattern)
  }
}

const fn column(relation: RecordKind, column: &'static str) -> ColumnRef {
  ColumnRef { relation, column }
}

static FIELDS: [FieldSpec; 11] = [
  FieldSpec {
    field:       QueryField::CallSign,
    name:        "call_sign",
    aliases:     &["callsign"],
    description: "Amateur radio call sign",
    column:      column(RecordKind::Entity, "call_sign"),
    compile:     compile_text,
    validate:    any_text,
  },
  FieldSpec {
    field:       QueryField::FirstName,
    name:        "first_name",
    aliases:     &[],
    description: "First name of the licensee",
    column:      column(RecordKind::Entity, "first_name"),
    compile:     compile_text,
    validate:    any_text,
  },
  FieldSpec {
    field:       QueryField::LastName,
    name:        "last_name",
    aliases:     &[],
    description: "Last name of the licensee",
    column:      column(RecordKind::Entity, "last_name"),
    compile:     compile_text,
    validate:    any_text,
  },
  FieldSpec {
    field:       QueryField::EntityName,
    name:        "entity_name",
    aliases:     &[],
    description: "Organization or club name",
    column:      column(RecordKind::Entity, "entity_name"),
    compile:     compile_text,
    validate:    any_text,
  },
  FieldSpec {
    field:       QueryField::City,
    name:        "city",
    aliases:     &[],
    description: "City",
    column:      column(RecordKind::Entity, "city"),
    compile:     compile_text,
    validate:    any_text,
  },
  FieldSpec {
    field:       QueryField::State,
    name:        "state",
    aliases:     &[],
    description: "State (2-letter code, e.g. CA, TX, MA)",
    column:      column(RecordKind::Entity, "state"),
    compile:     compile_text,
    validate:    state_code,
  },
  FieldSpec {
    field:       QueryField::ZipCode,
    name:        "zip_code",
    aliases:     &["zip"],
    description: "ZIP code (5 or 9 digits)",
    column:      column(RecordKind::Entity, "zip_code"),
    compile:     compile_compact,
    validate:    any_text,
  },
  FieldSpec {
    field:       QueryField::StreetAddress,
    name:        "street_address",
    aliases:     &[],
    description: "Street address",
    column:      column(RecordKind::Entity, "street_address"),
    compile:     compile_text,
    validate:    any_text,
  },
  FieldSpec {
    field:       QueryField::RegistrantKey,
    name:        "registrant_key",
    aliases:     &["frn"],
    description: "FCC Registration Number (10 digits)",
    column:      column(RecordKind::Entity, "registrant_key"),
    compile:     compile_compact,
    validate:    digits,
  },
  FieldSpec {
    field:       QueryField::OperatorClass,
    name:        "operator_class",
    aliases:     &[],
    description: "Operator class: E=Extra, G=General, T=Technician, A=Advanced, N=Novice",
    column:      column(RecordKind::Amateur, "operator_class"),
    compile:     compile_text,
    validate:    short_code,
  },
  FieldSpec {
    field:       QueryField::LicenseStatus,
    name:        "license_status",
    aliases:     &["status"],
    description: "License status: A=Active, E=Expired, C=Cancelled, T=Terminated",
    column:      column(RecordKind::Header, "license_status"),
    compile:     compile_text,
    validate:    short_code,
  },
];

// ─── Compilers and validators ────────────────────────────────────────────────

fn compile_text(raw: &str) -> WildcardPattern { WildcardPattern::new(raw.trim()) }

/// ZIP codes and FRNs are stored without separators.
fn compile_compact(raw: &str) -> WildcardPattern {
  WildcardPattern::new(
    raw
      .chars()
      .filter(|c| !c.is_whitespace() && *c != '-')
      .collect::<String>(),
  )
}

fn any_text(_: &WildcardPattern) -> Result<(), String> { Ok(()) }

fn state_code(p: &WildcardPattern) -> Result<(), String> {
  if p.has_wildcards() {
    return Ok(());
  }
  let s = p.as_str();
  if s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()) {
    Ok(())
  } else {
    Err(format!("expected a 2-letter state code, got {s:?}"))
  }
}

fn short_code(p: &WildcardPattern) -> Result<(), String> {
  if p.has_wildcards() {
    return Ok(());
  }
  let s = p.as_str();
  if s.len() <= 2 && s.chars().all(|c| c.is_ascii_alphanumeric()) {
    Ok(())
  } else {
    Err(format!("expected a 1-2 character code, got {s:?}"))
  }
}

fn digits(p: &WildcardPattern) -> Result<(), String> {
  if p.literals().all(|c| c.is_ascii_digit()) {
    Ok(())
  } else {
    Err(format!("expected digits, got {:?}", p.as_str()))
  }
}

// ─── Wildcard patterns ───────────────────────────────────────────────────────

/// A case-insensitive search pattern: `*` matches any run of characters
/// (including none), `?` matches exactly one character, everything else is
/// literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
  raw: String,
}

impl WildcardPattern {
  pub const ANY_RUN: char = '*';
  pub const ANY_ONE: char = '?';

  pub fn new(raw: impl Into<String>) -> Self { Self { raw: raw.into() } }

  pub fn as_str(&self) -> &str { &self.raw }

  pub fn has_wildcards(&self) -> bool {
    self.raw.contains([Self::ANY_RUN, Self::ANY_ONE])
  }

  /// The non-wildcard characters of the pattern.
  pub fn literals(&self) -> impl Iterator<Item = char> + '_ {
    self
      .raw
      .chars()
      .filter(|c| *c != Self::ANY_RUN && *c != Self::ANY_ONE)
  }

  /// Match `candidate` against the pattern, folding case over all of
  /// Unicode.
  pub fn matches(&self, candidate: &str) -> bool {
    let pattern: Vec<char> = self.raw.chars().collect();
    let text: Vec<char> = candidate.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    // Position of the last `*` seen and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
      if p < pattern.len()
        && (pattern[p] == Self::ANY_ONE
          || (pattern[p] != Self::ANY_RUN && chars_eq(pattern[p], text[t])))
      {
        p += 1;
        t += 1;
      } else if p < pattern.len() && pattern[p] == Self::ANY_RUN {
        backtrack = Some((p, t));
        p += 1;
      } else if let Some((star, tried)) = backtrack {
        p = star + 1;
        t = tried + 1;
        backtrack = Some((star, tried + 1));
      } else {
        return false;
      }
    }

    pattern[p..].iter().all(|c| *c == Self::ANY_RUN)
  }
}

fn chars_eq(a: char, b: char) -> bool { a == b || a.to_lowercase().eq(b.to_lowercase()) }

// ─── Compiled query ──────────────────────────────────────────────────────────

/// One compiled search criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
  pub field:   QueryField,
  pub pattern: WildcardPattern,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
  pub limit:  u32,
  pub offset: u64,
}

/// A validated search: predicates combined with AND, plus pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseQuery {
  /// Ordered by [`QueryField`]; never empty.
  pub predicates: Vec<Predicate>,
  pub page:       Page,
}

/// Configured page-size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageBounds {
  pub default_limit: u32,
  pub max_limit:     u32,
}

impl Default for PageBounds {
  fn default() -> Self {
    Self {
      default_limit: 100,
      max_limit:     1000,
    }
  }
}

impl PageBounds {
  pub fn validate(&self) -> Result<()> {
    if self.max_limit == 0 {
      return Err(Error::Validation("max page size must be at least 1".into()));
    }
    if self.default_limit == 0 || self.default_limit > self.max_limit {
      return Err(Error::Validation(format!(
        "default page size {} must be within 1..={}",
        self.default_limit, self.max_limit
      )));
    }
    Ok(())
  }
}

// ─── Translator ──────────────────────────────────────────────────────────────

/// Compiles raw filter maps into [`LicenseQuery`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTranslator {
  bounds: PageBounds,
}

impl QueryTranslator {
  pub fn new(bounds: PageBounds) -> Self { Self { bounds } }

  pub fn bounds(&self) -> PageBounds { self.bounds }

  /// Validate and compile a filter map.
  ///
  /// `limit` and `offset` are pagination keys; every other key must name a
  /// registered field. Blank values are ignored, and at least one search
  /// field must remain.
  pub fn translate<I, K, V>(&self, filter: I) -> Result<LicenseQuery>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let mut patterns: BTreeMap<QueryField, WildcardPattern> = BTreeMap::new();
    let mut limit = None;
    let mut offset = None;

    for (key, value) in filter {
      let name = key.as_ref().trim();
      let value = value.as_ref().trim();
      match name {
        "limit" => limit = parse_int(name, value)?,
        "offset" => offset = parse_int(name, value)?,
        _ => {
          let spec = FieldSpec::lookup(name).ok_or_else(|| {
            Error::Validation(format!("unknown search field {name:?}"))
          })?;
          if value.is_empty() {
            continue;
          }
          if value.chars().count() > MAX_PATTERN_LEN {
            return Err(Error::Validation(format!(
              "{}: pattern longer than {MAX_PATTERN_LEN} characters",
              spec.name
            )));
          }
          let pattern = spec.compile(value)?;
          if let Some(previous) = patterns.insert(spec.field, pattern.clone())
            && previous != pattern
          {
            return Err(Error::Validation(format!(
              "{} given twice with different values",
              spec.name
            )));
          }
        }
      }
    }

    if patterns.is_empty() {
      return Err(Error::Validation(
        "at least one search field is required".into(),
      ));
    }

    let page = Page {
      limit:  limit
        .map(|l: i64| l.clamp(1, i64::from(self.bounds.max_limit)) as u32)
        .unwrap_or(self.bounds.default_limit),
      offset: offset.map(|o: i64| o.max(0) as u64).unwrap_or(0),
    };

    Ok(LicenseQuery {
      predicates: patterns
        .into_iter()
        .map(|(field, pattern)| Predicate { field, pattern })
        .collect(),
      page,
    })
  }
}

fn parse_int(name: &str, value: &str) -> Result<Option<i64>> {
  if value.is_empty() {
    return Ok(None);
  }
  value
    .parse()
    .map(Some)
    .map_err(|_| Error::Validation(format!("{name} must be an integer, got {value:?}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn translate(pairs: &[(&str, &str)]) -> Result<LicenseQuery> {
    QueryTranslator::default().translate(pairs.iter().copied())
  }

  fn pattern(s: &str) -> WildcardPattern { WildcardPattern::new(s) }

  #[test]
  fn registry_order_matches_enum() {
    for (i, spec) in FieldSpec::all().iter().enumerate() {
      assert_eq!(spec.field as usize, i, "{} out of order", spec.name);
    }
  }

  #[test]
  fn star_matches_any_run() {
    let p = pattern("W1*");
    assert!(p.matches("W1AW"));
    assert!(p.matches("W1XYZ"));
    assert!(p.matches("W1"));
    assert!(!p.matches("K1AW"));
  }

  #[test]
  fn question_mark_matches_exactly_one() {
    let p = pattern("W?AW");
    assert!(p.matches("W1AW"));
    assert!(p.matches("WXAW"));
    assert!(!p.matches("W12AW"));
    assert!(!p.matches("WAW"));
  }

  #[test]
  fn literal_match_is_case_insensitive() {
    assert!(pattern("w1aw").matches("W1AW"));
    assert!(pattern("*main st*").matches("225 MAIN ST"));
    assert!(!pattern("w1aw").matches("W1AWX"));
    assert!(pattern("müller").matches("MÜLLER"));
    assert!(pattern("*ñez").matches("NUÑEZ"));
  }

  #[test]
  fn star_backtracks() {
    assert!(pattern("*AW").matches("W1AWAW"));
    assert!(pattern("A*B*C").matches("AxxBxxBxxC"));
    assert!(!pattern("A*B*C").matches("AxxBxx"));
  }

  #[test]
  fn empty_filter_is_rejected() {
    let err = translate(&[]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn pagination_alone_is_rejected() {
    let err = translate(&[("limit", "10"), ("offset", "5")]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn blank_fields_do_not_count() {
    let err = translate(&[("call_sign", "  "), ("city", "")]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn unknown_field_is_rejected() {
    let err = translate(&[("shoe_size", "10")]).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("shoe_size")));
  }

  #[test]
  fn alias_resolves_to_field() {
    let q = translate(&[("callsign", "W1AW")]).unwrap();
    assert_eq!(q.predicates.len(), 1);
    assert_eq!(q.predicates[0].field, QueryField::CallSign);
  }

  #[test]
  fn conflicting_alias_values_are_rejected() {
    let err = translate(&[("callsign", "W1AW"), ("call_sign", "K2ABC")])
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn limit_is_clamped_and_defaulted() {
    let q = translate(&[("city", "Boston")]).unwrap();
    assert_eq!(q.page, Page { limit: 100, offset: 0 });

    let q = translate(&[("city", "Boston"), ("limit", "5000")]).unwrap();
    assert_eq!(q.page.limit, 1000);

    let q = translate(&[("city", "Boston"), ("limit", "0"), ("offset", "-4")])
      .unwrap();
    assert_eq!(q.page, Page { limit: 1, offset: 0 });
  }

  #[test]
  fn non_numeric_pagination_is_rejected() {
    let err = translate(&[("city", "Boston"), ("limit", "ten")]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn field_validators_apply() {
    assert!(translate(&[("state", "CAL")]).is_err());
    assert!(translate(&[("state", "C*")]).is_ok());
    assert!(translate(&[("operator_class", "Extra")]).is_err());
    assert!(translate(&[("registrant_key", "00A1")]).is_err());
    assert!(translate(&[("frn", "0001430385")]).is_ok());
  }

  #[test]
  fn zip_separators_are_stripped() {
    let q = translate(&[("zip_code", "06111-1400")]).unwrap();
    assert_eq!(q.predicates[0].pattern.as_str(), "061111400");
  }

  #[test]
  fn predicates_are_ordered_by_field() {
    let q = translate(&[("license_status", "A"), ("call_sign", "W1*")]).unwrap();
    let fields: Vec<_> = q.predicates.iter().map(|p| p.field).collect();
    assert_eq!(fields, [QueryField::CallSign, QueryField::LicenseStatus]);
  }
}
