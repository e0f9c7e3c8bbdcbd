//! Pipe-delimited flat-file codec for the ULS licence dump.
//!
//! Converts the upstream `AM.dat`, `EN.dat`, `HD.dat` and `HS.dat` files into
//! [`callbook_core`] record types. Pure synchronous; no HTTP or database
//! dependencies.
//!
//! Parsing is lazy and best-effort: every physical line is one record, and a
//! malformed line yields `Err(…)` in its position without ending the stream.
//! Only an I/O error ends it.
//!
//! # Quick start
//!
//! ```no_run
//! use callbook_core::record::AmateurRecord;
//! use callbook_dat::DatFile;
//!
//! let file = DatFile::<AmateurRecord>::new("AM.dat");
//! let (ok, bad) = file
//!   .rows()
//!   .unwrap()
//!   .fold((0, 0), |(ok, bad), r| if r.is_ok() { (ok + 1, bad) } else { (ok, bad + 1) });
//! println!("{ok} rows, {bad} skipped");
//! ```

mod fields;
mod schema;

use std::{
  fs::File,
  io::{self, BufRead, BufReader},
  marker::PhantomData,
  path::{Path, PathBuf},
};

use callbook_core::{
  ParseError,
  record::{AmateurRecord, EntityRecord, HeaderRecord, HistoryRecord, RecordKind},
  store::StagingRows,
};

pub use fields::Fields;

// ─── Record schema ───────────────────────────────────────────────────────────

/// A record type with a fixed upstream column layout.
pub trait DatRecord: Sized + Send + 'static {
  const KIND: RecordKind;
  /// Value of the leading record-type column (`AM`, `EN`, …).
  const TAG: &'static str;
  /// Exact number of `|`-separated columns per line.
  const COLUMNS: usize;

  fn from_fields(fields: &Fields<'_>) -> Result<Self, ParseError>;
}

// ─── Row iterator ────────────────────────────────────────────────────────────

/// Lazy iterator over the records of one flat file.
pub struct DatRows<R, T> {
  reader:  R,
  buf:     Vec<u8>,
  line:    u64,
  done:    bool,
  _record: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: DatRecord> DatRows<R, T> {
  pub fn new(reader: R) -> Self {
    Self {
      reader,
      buf: Vec::with_capacity(512),
      line: 0,
      done: false,
      _record: PhantomData,
    }
  }
}

impl<R: BufRead, T: DatRecord> Iterator for DatRows<R, T> {
  type Item = Result<T, ParseError>;

  fn next(&mut self) -> Option<Self::Item> {
    while !self.done {
      self.buf.clear();
      match self.reader.read_until(b'\n', &mut self.buf) {
        Ok(0) => self.done = true,
        Ok(_) => {
          self.line += 1;
          let raw = fields::trim_line_ending(&self.buf);
          if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
          }
          let text = fields::decode_line(raw);
          return Some(Fields::split::<T>(self.line, &text).and_then(|f| T::from_fields(&f)));
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
        Err(e) => {
          self.done = true;
          return Some(Err(ParseError::Io(e)));
        }
      }
    }
    None
  }
}

// ─── Files ───────────────────────────────────────────────────────────────────

/// A flat file on disk. Each call to [`DatFile::rows`] restarts from the top.
pub struct DatFile<T> {
  path:    PathBuf,
  _record: PhantomData<fn() -> T>,
}

impl<T: DatRecord> DatFile<T> {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path:    path.into(),
      _record: PhantomData,
    }
  }

  pub fn path(&self) -> &Path { &self.path }

  pub fn rows(&self) -> io::Result<DatRows<BufReader<File>, T>> {
    let file = File::open(&self.path)?;
    Ok(DatRows::new(BufReader::with_capacity(1 << 16, file)))
  }
}

/// Open `path` as the flat file of `kind`, ready for a staging load.
pub fn staging_rows(kind: RecordKind, path: &Path) -> io::Result<StagingRows> {
  Ok(match kind {
    RecordKind::Amateur => {
      StagingRows::Amateur(Box::new(DatFile::<AmateurRecord>::new(path).rows()?))
    }
    RecordKind::Entity => {
      StagingRows::Entity(Box::new(DatFile::<EntityRecord>::new(path).rows()?))
    }
    RecordKind::Header => {
      StagingRows::Header(Box::new(DatFile::<HeaderRecord>::new(path).rows()?))
    }
    RecordKind::History => {
      StagingRows::History(Box::new(DatFile::<HistoryRecord>::new(path).rows()?))
    }
  })
}

#[cfg(test)]
mod tests;
