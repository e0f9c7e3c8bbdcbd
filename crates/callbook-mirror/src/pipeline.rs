//! One refresh cycle: fetch, parse, stage, verify, promote.

use std::{future::Future, sync::Arc};

use callbook_core::{
  record::RecordKind,
  refresh::RefreshLogEntry,
  store::{Generation, LicenseStore, LoadReport},
};

use crate::{
  RefreshError,
  fetch::{Download, Fetcher},
};

/// Totals of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
  pub generation: Generation,
  pub loads:      Vec<LoadReport>,
}

impl CycleReport {
  pub fn loaded(&self) -> u64 { self.loads.iter().map(|r| r.loaded).sum() }

  pub fn skipped(&self) -> u64 { self.loads.iter().map(|r| r.skipped).sum() }
}

/// The work the scheduler runs. Implemented by [`RefreshPipeline`]; tests
/// substitute their own.
pub trait Pipeline: Send + Sync + 'static {
  fn run(&self) -> impl Future<Output = Result<CycleReport, RefreshError>> + Send + '_;

  /// Persist the outcome of a finished cycle.
  fn record(&self, entry: RefreshLogEntry) -> impl Future<Output = ()> + Send + '_;
}

/// The production pipeline over a [`LicenseStore`].
pub struct RefreshPipeline<S> {
  store:   Arc<S>,
  fetcher: Fetcher,
}

impl<S: LicenseStore + 'static> RefreshPipeline<S> {
  pub fn new(store: Arc<S>, fetcher: Fetcher) -> Self { Self { store, fetcher } }

  /// Stage the files of `download` as a new generation and promote it.
  ///
  /// On any failure the staging generation is discarded and the live one
  /// is left as it was.
  pub async fn publish(&self, download: &Download) -> Result<CycleReport, RefreshError> {
    let generation = self
      .store
      .begin_staging()
      .await
      .map_err(|e| RefreshError::Store(e.to_string()))?;

    let staged = match self.stage(generation, download).await {
      Ok(loads) => self
        .store
        .promote(generation)
        .await
        .map(|()| loads)
        .map_err(|e| RefreshError::Swap(e.to_string())),
      Err(e) => Err(e),
    };

    match staged {
      Ok(loads) => Ok(CycleReport { generation, loads }),
      Err(e) => {
        if let Err(discard) = self.store.discard_staging(generation).await {
          tracing::warn!(%generation, error = %discard, "failed to discard staging generation");
        }
        Err(e)
      }
    }
  }

  async fn stage(
    &self,
    generation: Generation,
    download: &Download,
  ) -> Result<Vec<LoadReport>, RefreshError> {
    let mut loads = Vec::with_capacity(RecordKind::ALL.len());
    for kind in RecordKind::ALL {
      let path = download.path(kind).ok_or_else(|| {
        RefreshError::Integrity(format!("archive is missing {}", kind.file_name()))
      })?;
      let rows = callbook_dat::staging_rows(kind, path).map_err(|e| RefreshError::Load {
        kind,
        message: e.to_string(),
      })?;
      let report = self
        .store
        .load_staging(generation, rows)
        .await
        .map_err(|e| RefreshError::Load {
          kind,
          message: e.to_string(),
        })?;
      if report.loaded == 0 {
        return Err(RefreshError::Integrity(format!(
          "{} contains no valid records",
          kind.file_name()
        )));
      }
      loads.push(report);
    }
    Ok(loads)
  }
}

impl<S: LicenseStore + 'static> Pipeline for RefreshPipeline<S> {
  async fn run(&self) -> Result<CycleReport, RefreshError> {
    let download = self.fetcher.fetch().await?;
    self.publish(&download).await
  }

  async fn record(&self, entry: RefreshLogEntry) {
    if let Err(e) = self.store.append_refresh_log(entry).await {
      tracing::warn!(error = %e, "failed to append refresh log entry");
    }
  }
}
