//! Refresh control and mirror status handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use callbook_core::{
  refresh::{RefreshLogEntry, RefreshState},
  store::LicenseStore,
};
use callbook_mirror::{Health, Mirror, MirrorStats};

use crate::error::ApiError;

/// `POST /refresh`: 202 with the resulting state, whether or not a new
/// cycle was started.
pub async fn trigger<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
) -> (StatusCode, Json<RefreshState>) {
  (StatusCode::ACCEPTED, Json(mirror.refresh()))
}

/// `GET /refresh/status`
pub async fn status<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
) -> Json<RefreshState> {
  Json(mirror.refresh_status())
}

/// `GET /version`: the last successful refresh.
pub async fn version<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
) -> Result<Json<RefreshLogEntry>, ApiError> {
  mirror
    .version()
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound("no successful refresh yet".into()))
}

/// `GET /stats`
pub async fn stats<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
) -> Result<Json<MirrorStats>, ApiError> {
  Ok(Json(mirror.stats().await?))
}

/// `GET /health`: 503 when the store cannot be reached.
pub async fn health<S: LicenseStore + 'static>(
  State(mirror): State<Arc<Mirror<S>>>,
) -> (StatusCode, Json<Health>) {
  let health = mirror.health().await;
  let status = if health.store_reachable {
    StatusCode::OK
  } else {
    StatusCode::SERVICE_UNAVAILABLE
  };
  (status, Json(health))
}
