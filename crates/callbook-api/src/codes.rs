//! Field registry and code table handlers.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use callbook_core::{
  codes::{CodeCounts, CodeDefinition},
  store::LicenseStore,
};
use callbook_mirror::{FieldInfo, Mirror};

use crate::error::ApiError;

/// `GET /fields`
pub async fn fields<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
) -> Json<Vec<FieldInfo>> {
  Json(mirror.fields())
}

/// `GET /codes/{space}`
pub async fn list<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
  Path(space): Path<String>,
) -> Result<Json<Vec<CodeDefinition>>, ApiError> {
  Ok(Json(mirror.list_codes(&space)?))
}

/// `POST /codes/reload`
pub async fn reload<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
) -> Result<Json<CodeCounts>, ApiError> {
  Ok(Json(mirror.reload_codes().await?))
}
