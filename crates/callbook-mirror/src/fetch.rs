//! Download and extraction of the upstream archive.
//!
//! Everything lands in a process-exclusive temporary directory owned by the
//! returned [`Download`]; dropping it removes the directory on every path.

use std::{
  collections::BTreeMap,
  fs::File,
  io,
  path::{Path, PathBuf},
  time::Duration,
};

use callbook_core::record::RecordKind;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt as _;

use crate::RefreshError;

const ARCHIVE_NAME: &str = "archive.zip";

/// The four extracted flat files of one download.
#[derive(Debug)]
pub struct Download {
  _dir:  TempDir,
  files: BTreeMap<RecordKind, PathBuf>,
}

impl Download {
  pub fn path(&self, kind: RecordKind) -> Option<&Path> {
    self.files.get(&kind).map(PathBuf::as_path)
  }
}

/// Fetches the archive from one configured source.
#[derive(Debug, Clone)]
pub struct Fetcher {
  client: reqwest::Client,
  source: String,
}

impl Fetcher {
  /// `idle_timeout` bounds connecting and each wait for more of the body,
  /// not the transfer as a whole.
  pub fn new(source: impl Into<String>, idle_timeout: Duration) -> reqwest::Result<Self> {
    let client = reqwest::Client::builder()
      .connect_timeout(idle_timeout)
      .read_timeout(idle_timeout)
      .user_agent(concat!("callbook/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self {
      client,
      source: source.into(),
    })
  }

  /// Download (or copy) the archive and extract the four flat files.
  pub async fn fetch(&self) -> Result<Download, RefreshError> {
    let dir = tempfile::Builder::new().prefix("callbook-").tempdir()?;
    let archive = dir.path().join(ARCHIVE_NAME);

    let bytes = match local_path(&self.source) {
      Some(path) => tokio::fs::copy(path, &archive)
        .await
        .map_err(|e| RefreshError::Download(format!("{}: {e}", path.display())))?,
      None => self.download(&archive).await?,
    };
    tracing::info!(source = %self.source, bytes, "fetched archive");
    if bytes == 0 {
      return Err(RefreshError::Integrity("archive is empty".into()));
    }

    let target = dir.path().to_path_buf();
    let files = tokio::task::spawn_blocking(move || extract(&archive, &target))
      .await
      .map_err(io::Error::other)??;

    Ok(Download { _dir: dir, files })
  }

  /// Stream the response body to `dest` chunk by chunk.
  async fn download(&self, dest: &Path) -> Result<u64, RefreshError> {
    let failed = |e: reqwest::Error| RefreshError::Download(format!("{}: {e}", self.source));

    let mut response = self
      .client
      .get(&self.source)
      .send()
      .await
      .and_then(reqwest::Response::error_for_status)
      .map_err(failed)?;

    let mut file = tokio::fs::File::create(dest).await?;
    let mut bytes = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(failed)? {
      file.write_all(&chunk).await?;
      bytes += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(bytes)
  }
}

/// `file://` URLs and bare paths are read from disk.
fn local_path(source: &str) -> Option<&Path> {
  if let Some(path) = source.strip_prefix("file://") {
    Some(Path::new(path))
  } else if source.contains("://") {
    None
  } else {
    Some(Path::new(source))
  }
}

/// Unpack the four member files into `dir`, matching names case-insensitively
/// and ignoring any directory prefix inside the archive.
fn extract(
  archive: &Path,
  dir: &Path,
) -> Result<BTreeMap<RecordKind, PathBuf>, RefreshError> {
  let corrupt = |e: zip::result::ZipError| RefreshError::Integrity(format!("unreadable archive: {e}"));
  let mut zip = zip::ZipArchive::new(File::open(archive)?).map_err(corrupt)?;

  let mut files = BTreeMap::new();
  for i in 0..zip.len() {
    let mut entry = zip.by_index(i).map_err(corrupt)?;
    if entry.is_dir() {
      continue;
    }
    let name = entry.name().rsplit(['/', '\\']).next().unwrap_or_default().to_owned();
    let Some(kind) = RecordKind::ALL
      .into_iter()
      .find(|k| k.file_name().eq_ignore_ascii_case(&name))
    else {
      continue;
    };

    let path = dir.join(kind.file_name());
    let mut out = File::create(&path)?;
    io::copy(&mut entry, &mut out)
      .map_err(|e| RefreshError::Integrity(format!("extracting {name}: {e}")))?;
    files.insert(kind, path);
  }

  let missing: Vec<_> = RecordKind::ALL
    .into_iter()
    .filter(|k| !files.contains_key(k))
    .map(RecordKind::file_name)
    .collect();
  if !missing.is_empty() {
    return Err(RefreshError::Integrity(format!(
      "archive is missing {}",
      missing.join(", ")
    )));
  }
  Ok(files)
}
