//! Search, single-licence and history handlers.

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{PathRejection, QueryRejection},
  },
};
use callbook_core::{
  record::SubjectKey,
  store::LicenseStore,
  view::{HistoryEntry, LicenseDetail, QueryPage, RegistrantHistoryView},
};
use callbook_mirror::Mirror;

use crate::error::ApiError;

/// `GET /query?<field>=<pattern>[&...][&limit=N][&offset=N]`
///
/// Pairs are passed through in order, so a repeated field is seen (and
/// rejected if its values differ) by the translator.
pub async fn search<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
  filter: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<QueryPage>, ApiError> {
  let Query(filter) = filter?;
  Ok(Json(mirror.query(filter).await?))
}

/// `GET /licenses/{subject_key}`
pub async fn get_one<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
  subject_key: Result<Path<SubjectKey>, PathRejection>,
) -> Result<Json<LicenseDetail>, ApiError> {
  let Path(subject_key) = subject_key?;
  mirror
    .license(subject_key)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("licence {subject_key}")))
}

/// `GET /history/{subject_key}`
pub async fn history<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
  subject_key: Result<Path<SubjectKey>, PathRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
  let Path(subject_key) = subject_key?;
  Ok(Json(mirror.history_by_subject_key(subject_key).await?))
}

/// `GET /history/registrant/{registrant_key}`
pub async fn registrant_history<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
  Path(registrant_key): Path<String>,
) -> Result<Json<RegistrantHistoryView>, ApiError> {
  Ok(Json(mirror.history_by_registrant_key(&registrant_key).await?))
}
