//! Refresh pipeline and service layer for the callbook licence mirror.
//!
//! - [`fetch`] downloads and unpacks the upstream archive.
//! - [`pipeline`] stages the four flat files into a new generation and
//!   promotes it.
//! - [`scheduler`] runs the pipeline on a timer and on demand, one cycle at a
//!   time.
//! - [`Mirror`] is the process-scoped object every caller goes through.

pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod scheduler;
mod service;

pub use config::MirrorConfig;
pub use error::{Error, RefreshError, Result};
pub use service::{FieldInfo, Health, Mirror, MirrorStats};
