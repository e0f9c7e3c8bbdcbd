//! [`Mirror`]: the process-scoped object behind every inbound operation.

use std::sync::Arc;

use callbook_core::{
  codes::{CodeCounts, CodeDefinition, CodeRegistry, CodeSpace},
  query::{FieldSpec, QueryTranslator},
  record::SubjectKey,
  refresh::{RefreshLogEntry, RefreshState, RefreshStatus},
  store::{LicenseStore, LiveStats},
  view::{HistoryEntry, LicenseDetail, LicenseSummary, QueryPage, RegistrantHistoryView},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  Error, MirrorConfig, Result,
  fetch::Fetcher,
  pipeline::RefreshPipeline,
  scheduler::{Schedule, Scheduler},
};

/// A searchable field as advertised to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
  pub name:        &'static str,
  pub aliases:     &'static [&'static str],
  pub description: &'static str,
}

/// Live statistics plus refresh and code-table context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
  #[serde(flatten)]
  pub live:         LiveStats,
  /// Finish time of the last successful refresh.
  pub last_updated: Option<DateTime<Utc>>,
  pub updating:     bool,
  pub codes:        CodeCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
  pub store_reachable: bool,
  pub refresh:         RefreshStatus,
}

/// The licence mirror: query layer over the live generation plus the
/// refresh scheduler.
///
/// Created once per process and shared by `Arc`.
pub struct Mirror<S> {
  store:      Arc<S>,
  codes:      Arc<CodeRegistry>,
  translator: QueryTranslator,
  scheduler:  Scheduler,
}

impl<S: LicenseStore + 'static> Mirror<S> {
  /// Load code definitions and schedule the first refresh.
  ///
  /// A missing or malformed definitions file is not fatal: the built-in
  /// tables serve until a reload succeeds.
  pub async fn start(store: Arc<S>, config: &MirrorConfig) -> Result<Self> {
    config.validate()?;

    let codes = match CodeRegistry::load(&config.definitions_path) {
      Ok(codes) => codes,
      Err(e) => {
        tracing::warn!(error = %e, "code definitions unavailable; using built-in tables");
        CodeRegistry::unloaded(&config.definitions_path)
      }
    };

    let fetcher = Fetcher::new(&config.source_url, config.download_timeout())
      .map_err(|e| Error::Config(format!("http client: {e}")))?;
    let last_success = store
      .last_refresh(true)
      .await
      .map_err(Error::store)?
      .map(|entry| entry.finished_at);

    let scheduler = Scheduler::start(
      RefreshPipeline::new(store.clone(), fetcher),
      Schedule {
        interval:      config.refresh_interval(),
        startup_delay: config.startup_delay(),
      },
      last_success,
    );

    Ok(Self::from_parts(
      store,
      codes,
      QueryTranslator::new(config.page),
      scheduler,
    ))
  }

  pub fn from_parts(
    store: Arc<S>,
    codes: CodeRegistry,
    translator: QueryTranslator,
    scheduler: Scheduler,
  ) -> Self {
    Self {
      store,
      codes: Arc::new(codes),
      translator,
      scheduler,
    }
  }

  // ─── Queries ───────────────────────────────────────────────────────────────

  /// Search the live generation with a field → pattern filter map.
  pub async fn query<I, K, V>(&self, filter: I) -> Result<QueryPage>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let query = self.translator.translate(filter)?;
    let page = self.store.search(&query).await.map_err(Error::store)?;
    let codes = self.codes.snapshot();
    Ok(QueryPage {
      total:   page.total,
      offset:  query.page.offset,
      limit:   query.page.limit,
      results: page
        .rows
        .into_iter()
        .map(|row| LicenseSummary::enrich(row, &codes))
        .collect(),
    })
  }

  pub async fn license(&self, subject_key: SubjectKey) -> Result<Option<LicenseDetail>> {
    let records = self.store.license(subject_key).await.map_err(Error::store)?;
    let codes = self.codes.snapshot();
    Ok(records.map(|r| LicenseDetail::enrich(r, &codes)))
  }

  pub async fn history_by_subject_key(&self, subject_key: SubjectKey) -> Result<Vec<HistoryEntry>> {
    let records = self.store.history(subject_key).await.map_err(Error::store)?;
    Ok(HistoryEntry::enrich_all(records, &self.codes.snapshot()))
  }

  pub async fn history_by_registrant_key(&self, registrant_key: &str) -> Result<RegistrantHistoryView> {
    let history = self
      .store
      .registrant_history(registrant_key.trim())
      .await
      .map_err(Error::store)?;
    Ok(RegistrantHistoryView::enrich(history, &self.codes.snapshot()))
  }

  pub fn fields(&self) -> Vec<FieldInfo> {
    FieldSpec::all()
      .iter()
      .map(|spec| FieldInfo {
        name:        spec.name,
        aliases:     spec.aliases,
        description: spec.description,
      })
      .collect()
  }

  // ─── Refresh ───────────────────────────────────────────────────────────────

  /// Trigger a refresh cycle unless one is already running.
  pub fn refresh(&self) -> RefreshState { self.scheduler.trigger() }

  pub fn refresh_status(&self) -> RefreshState { self.scheduler.state() }

  pub fn scheduler(&self) -> &Scheduler { &self.scheduler }

  /// The most recent successful refresh.
  pub async fn version(&self) -> Result<Option<RefreshLogEntry>> {
    self.store.last_refresh(true).await.map_err(Error::store)
  }

  pub async fn stats(&self) -> Result<MirrorStats> {
    let live = self.store.stats().await.map_err(Error::store)?;
    let last_updated = self.version().await?.map(|entry| entry.finished_at);
    Ok(MirrorStats {
      live,
      last_updated,
      updating: self.scheduler.state().is_in_progress(),
      codes: self.codes.snapshot().counts(),
    })
  }

  pub async fn health(&self) -> Health {
    let store_reachable = match self.store.ping().await {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(error = %e, "store health check failed");
        false
      }
    };
    Health {
      store_reachable,
      refresh: self.scheduler.state().status,
    }
  }

  // ─── Codes ─────────────────────────────────────────────────────────────────

  pub fn list_codes(&self, space: &str) -> Result<Vec<CodeDefinition>> {
    let space: CodeSpace = space.parse()?;
    Ok(self.codes.list(space))
  }

  /// Re-read the definitions file; the previous mappings stay on failure.
  pub async fn reload_codes(&self) -> Result<CodeCounts> {
    let codes = self.codes.clone();
    let counts = tokio::task::spawn_blocking(move || codes.reload())
      .await
      .map_err(Error::store)??;
    Ok(counts)
  }

  /// Stop timed refreshes and wait for an in-flight cycle.
  pub async fn shutdown(&self) { self.scheduler.shutdown().await }
}
