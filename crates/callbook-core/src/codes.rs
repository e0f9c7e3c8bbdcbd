//! Code registry: descriptions for history, operator-class and licence-status
//! codes.
//!
//! The definitions file is sectioned plain text. A section starts with a
//! header line `TAG<TAB>Title` at column 0; entries inside it start with a
//! tab and carry the code followed by its description:
//!
//! ```text
//! HS	History Code
//! 	LIISS			License Issued
//! 	LIEXP			License Expired
//! ```
//!
//! All three mappings live in one [`CodeTables`] value that is swapped as a
//! unit on reload, so readers never see a mix of old and new mappings.

use std::{
  collections::BTreeMap,
  fmt,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Arc,
};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Description returned for codes absent from the registry.
pub const UNKNOWN_CODE: &str = "Unknown";

/// Operator classes used when the definitions file has no such section.
const BUILTIN_OPERATOR_CLASSES: [(&str, &str); 6] = [
  ("A", "Advanced"),
  ("E", "Amateur Extra"),
  ("G", "General"),
  ("N", "Novice"),
  ("P", "Technician Plus"),
  ("T", "Technician"),
];

/// Licence statuses used when the definitions file has no such section.
const BUILTIN_LICENSE_STATUSES: [(&str, &str); 4] = [
  ("A", "Active"),
  ("C", "Cancelled"),
  ("E", "Expired"),
  ("T", "Terminated"),
];

// ─── Code spaces ─────────────────────────────────────────────────────────────

/// The three disjoint code spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSpace {
  History,
  OperatorClass,
  LicenseStatus,
}

impl CodeSpace {
  pub const ALL: [CodeSpace; 3] =
    [Self::History, Self::OperatorClass, Self::LicenseStatus];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::History => "history",
      Self::OperatorClass => "operator_class",
      Self::LicenseStatus => "license_status",
    }
  }

  /// Section titles in the definitions file that select this space.
  fn matches_title(self, title: &str) -> bool {
    let prefix = match self {
      Self::History => "History Code",
      Self::OperatorClass => "Operator Class",
      Self::LicenseStatus => "License Status",
    };
    title.starts_with(prefix)
  }
}

impl fmt::Display for CodeSpace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for CodeSpace {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "history" | "history_codes" => Ok(Self::History),
      "operator_class" | "operator_classes" => Ok(Self::OperatorClass),
      "license_status" | "license_statuses" => Ok(Self::LicenseStatus),
      other => Err(Error::UnknownCodeSpace(other.to_owned())),
    }
  }
}

/// One code and its human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDefinition {
  pub code:        String,
  pub description: String,
}

/// Number of definitions per space after a (re)load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCounts {
  pub history_codes:    usize,
  pub operator_classes: usize,
  pub license_statuses: usize,
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// An immutable set of all three code mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTables {
  history:          BTreeMap<String, String>,
  operator_classes: BTreeMap<String, String>,
  license_statuses: BTreeMap<String, String>,
}

impl CodeTables {
  /// Tables holding only the built-in operator classes and licence statuses.
  pub fn builtin() -> Self {
    Self {
      history:          BTreeMap::new(),
      operator_classes: builtin_map(&BUILTIN_OPERATOR_CLASSES),
      license_statuses: builtin_map(&BUILTIN_LICENSE_STATUSES),
    }
  }

  /// Parse definitions text. Fails when no recognised section is present.
  pub fn parse(text: &str) -> Result<Self, String> {
    let mut tables = Self::default();
    let mut seen = [false; 3];
    let mut current: Option<CodeSpace> = None;

    for line in text.lines() {
      let line = line.strip_suffix('\r').unwrap_or(line);

      if let Some(title) = section_title(line) {
        current = CodeSpace::ALL
          .into_iter()
          .find(|space| space.matches_title(title));
        if let Some(space) = current {
          seen[space as usize] = true;
        }
        continue;
      }

      let Some(space) = current else { continue };
      if !line.starts_with('\t') {
        continue;
      }
      let mut parts = line.trim().split('\t');
      let code = parts.next().unwrap_or_default().trim();
      let description = parts.map(str::trim).find(|p| !p.is_empty());
      if let Some(description) = description
        && !code.is_empty()
      {
        tables
          .map_mut(space)
          .insert(code.to_owned(), description.to_owned());
      }
    }

    if !seen.iter().any(|s| *s) {
      return Err("no recognised code sections".into());
    }
    if !seen[CodeSpace::OperatorClass as usize] {
      tables.operator_classes = builtin_map(&BUILTIN_OPERATOR_CLASSES);
    }
    if !seen[CodeSpace::LicenseStatus as usize] {
      tables.license_statuses = builtin_map(&BUILTIN_LICENSE_STATUSES);
    }
    Ok(tables)
  }

  fn map(&self, space: CodeSpace) -> &BTreeMap<String, String> {
    match space {
      CodeSpace::History => &self.history,
      CodeSpace::OperatorClass => &self.operator_classes,
      CodeSpace::LicenseStatus => &self.license_statuses,
    }
  }

  fn map_mut(&mut self, space: CodeSpace) -> &mut BTreeMap<String, String> {
    match space {
      CodeSpace::History => &mut self.history,
      CodeSpace::OperatorClass => &mut self.operator_classes,
      CodeSpace::LicenseStatus => &mut self.license_statuses,
    }
  }

  /// Description for `code`, or [`UNKNOWN_CODE`].
  pub fn describe(&self, space: CodeSpace, code: &str) -> &str {
    self
      .map(space)
      .get(code)
      .map(String::as_str)
      .unwrap_or(UNKNOWN_CODE)
  }

  /// All definitions of one space, sorted by code.
  pub fn list(&self, space: CodeSpace) -> Vec<CodeDefinition> {
    self
      .map(space)
      .iter()
      .map(|(code, description)| CodeDefinition {
        code:        code.clone(),
        description: description.clone(),
      })
      .collect()
  }

  pub fn counts(&self) -> CodeCounts {
    CodeCounts {
      history_codes:    self.history.len(),
      operator_classes: self.operator_classes.len(),
      license_statuses: self.license_statuses.len(),
    }
  }
}

fn builtin_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
  entries
    .iter()
    .map(|(c, d)| ((*c).to_owned(), (*d).to_owned()))
    .collect()
}

/// `Some(title)` when `line` is a section header: two uppercase
/// alphanumerics (letter first), a tab, then a letter.
fn section_title(line: &str) -> Option<&str> {
  let b = line.as_bytes();
  let is_header = b.len() > 3
    && b[0].is_ascii_uppercase()
    && (b[1].is_ascii_uppercase() || b[1].is_ascii_digit())
    && b[2] == b'\t'
    && b[3].is_ascii_alphabetic();
  is_header.then(|| line[3..].trim())
}

/// Decode ISO-8859-1 bytes; every byte maps to the code point of equal value.
pub fn decode_latin1(bytes: &[u8]) -> String {
  bytes.iter().map(|&b| char::from(b)).collect()
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Reloadable holder of the current [`CodeTables`].
pub struct CodeRegistry {
  path:   PathBuf,
  tables: ArcSwap<CodeTables>,
}

impl CodeRegistry {
  /// Parse the definitions file at `path`.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let tables = read_tables(&path)?;
    Ok(Self {
      path,
      tables: ArcSwap::from_pointee(tables),
    })
  }

  /// A registry serving only the built-in tables until a reload succeeds.
  pub fn unloaded(path: impl Into<PathBuf>) -> Self {
    Self {
      path:   path.into(),
      tables: ArcSwap::from_pointee(CodeTables::builtin()),
    }
  }

  /// Re-parse the definitions file and replace all mappings at once.
  ///
  /// On failure the previous mappings stay in effect.
  pub fn reload(&self) -> Result<CodeCounts> {
    let tables = read_tables(&self.path)?;
    let counts = tables.counts();
    self.tables.store(Arc::new(tables));
    tracing::info!(
      history = counts.history_codes,
      operator_classes = counts.operator_classes,
      license_statuses = counts.license_statuses,
      "code definitions loaded"
    );
    Ok(counts)
  }

  /// A consistent view of all three mappings.
  pub fn snapshot(&self) -> Arc<CodeTables> { self.tables.load_full() }

  pub fn lookup(&self, space: CodeSpace, code: &str) -> String {
    self.tables.load().describe(space, code).to_owned()
  }

  pub fn list(&self, space: CodeSpace) -> Vec<CodeDefinition> {
    self.tables.load().list(space)
  }
}

fn read_tables(path: &Path) -> Result<CodeTables> {
  let bytes = std::fs::read(path).map_err(|e| Error::DefinitionFile {
    path:   path.to_path_buf(),
    reason: e.to_string(),
  })?;
  CodeTables::parse(&decode_latin1(&bytes)).map_err(|reason| {
    Error::DefinitionFile {
      path: path.to_path_buf(),
      reason,
    }
  })
}
