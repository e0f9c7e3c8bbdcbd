//! Mirror configuration.

use std::{path::PathBuf, time::Duration};

use callbook_core::query::PageBounds;
use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_SOURCE_URL: &str =
  "https://data.fcc.gov/download/pub/uls/complete/l_amat.zip";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
  /// Archive location: `https://…`, `file://…` or a plain path.
  pub source_url:            String,
  /// Code definitions file.
  pub definitions_path:      PathBuf,
  pub refresh_interval_days: u64,
  pub startup_delay_secs:    u64,
  /// Longest wait to connect or for more data, not a cap on the whole
  /// transfer.
  pub download_timeout_secs: u64,
  pub page:                  PageBounds,
}

impl Default for MirrorConfig {
  fn default() -> Self {
    Self {
      source_url:            DEFAULT_SOURCE_URL.to_owned(),
      definitions_path:      PathBuf::from("definitions.txt"),
      refresh_interval_days: 7,
      startup_delay_secs:    30,
      download_timeout_secs: 300,
      page:                  PageBounds::default(),
    }
  }
}

impl MirrorConfig {
  pub fn validate(&self) -> Result<()> {
    if self.source_url.trim().is_empty() {
      return Err(Error::Config("source_url must not be empty".into()));
    }
    if self.refresh_interval_days == 0 {
      return Err(Error::Config("refresh_interval_days must be at least 1".into()));
    }
    if self.download_timeout_secs == 0 {
      return Err(Error::Config("download_timeout_secs must be at least 1".into()));
    }
    self.page.validate()?;
    Ok(())
  }

  pub fn refresh_interval(&self) -> Duration {
    Duration::from_secs(self.refresh_interval_days.saturating_mul(24 * 60 * 60))
  }

  pub fn startup_delay(&self) -> Duration { Duration::from_secs(self.startup_delay_secs) }

  pub fn download_timeout(&self) -> Duration {
    Duration::from_secs(self.download_timeout_secs)
  }
}
