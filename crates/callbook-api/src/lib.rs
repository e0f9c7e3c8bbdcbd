//! JSON REST API for the callbook mirror.
//!
//! Exposes an axum [`Router`] over a shared [`Mirror`]. TLS, access control
//! and process lifecycle are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", callbook_api::api_router(mirror.clone()))
//! ```

pub mod codes;
pub mod error;
pub mod licenses;
pub mod refresh;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use callbook_core::store::LicenseStore;
use callbook_mirror::Mirror;

pub use error::ApiError;

/// Build a fully-materialised API router for `mirror`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(mirror: Arc<Mirror<S>>) -> Router<()>
where
  S: LicenseStore + 'static,
{
  Router::new()
    // Queries
    .route("/query", get(licenses::search::<S>))
    .route("/licenses/{subject_key}", get(licenses::get_one::<S>))
    .route("/history/{subject_key}", get(licenses::history::<S>))
    .route(
      "/history/registrant/{registrant_key}",
      get(licenses::registrant_history::<S>),
    )
    // Refresh and status
    .route("/refresh", post(refresh::trigger::<S>))
    .route("/refresh/status", get(refresh::status::<S>))
    .route("/version", get(refresh::version::<S>))
    .route("/stats", get(refresh::stats::<S>))
    .route("/health", get(refresh::health::<S>))
    // Codes
    .route("/fields", get(codes::fields::<S>))
    .route("/codes/reload", post(codes::reload::<S>))
    .route("/codes/{space}", get(codes::list::<S>))
    .with_state(mirror)
}
