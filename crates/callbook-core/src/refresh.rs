//! Refresh cycle state and the persisted refresh-attempt log.
//!
//! [`RefreshState`] is owned by the scheduler: created idle, moved to
//! in-progress when a cycle starts and to success or failed when it ends.
//! Success and failed are both ready for the next cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
  Idle,
  InProgress,
  Success,
  Failed,
}

impl RefreshStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Idle => "idle",
      Self::InProgress => "in_progress",
      Self::Success => "success",
      Self::Failed => "failed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "idle" => Some(Self::Idle),
      "in_progress" => Some(Self::InProgress),
      "success" => Some(Self::Success),
      "failed" => Some(Self::Failed),
      _ => None,
    }
  }
}

/// Snapshot of the current or most recent refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshState {
  pub status:          RefreshStatus,
  pub started_at:      Option<DateTime<Utc>>,
  pub finished_at:     Option<DateTime<Utc>>,
  pub records_loaded:  u64,
  /// Malformed upstream lines skipped during the cycle.
  pub records_skipped: u64,
  pub error:           Option<String>,
}

impl Default for RefreshState {
  fn default() -> Self { Self::idle() }
}

impl RefreshState {
  pub fn idle() -> Self {
    Self {
      status:          RefreshStatus::Idle,
      started_at:      None,
      finished_at:     None,
      records_loaded:  0,
      records_skipped: 0,
      error:           None,
    }
  }

  pub fn is_in_progress(&self) -> bool {
    self.status == RefreshStatus::InProgress
  }

  /// Transition to in-progress for a cycle starting at `now`.
  pub fn begin(&mut self, now: DateTime<Utc>) {
    *self = Self {
      status: RefreshStatus::InProgress,
      started_at: Some(now),
      ..Self::idle()
    };
  }

  pub fn succeed(&mut self, now: DateTime<Utc>, loaded: u64, skipped: u64) {
    self.status = RefreshStatus::Success;
    self.finished_at = Some(now);
    self.records_loaded = loaded;
    self.records_skipped = skipped;
    self.error = None;
  }

  pub fn fail(&mut self, now: DateTime<Utc>, error: String) {
    self.status = RefreshStatus::Failed;
    self.finished_at = Some(now);
    self.error = Some(error);
  }

  /// The log entry for a finished cycle. `None` while no cycle has finished.
  pub fn log_entry(&self) -> Option<RefreshLogEntry> {
    match (self.status, self.started_at, self.finished_at) {
      (
        RefreshStatus::Success | RefreshStatus::Failed,
        Some(started_at),
        Some(finished_at),
      ) => Some(RefreshLogEntry {
        started_at,
        finished_at,
        status: self.status,
        records_loaded: self.records_loaded,
        records_skipped: self.records_skipped,
        error_message: self.error.clone(),
      }),
      _ => None,
    }
  }
}

/// One row of the append-only refresh-attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshLogEntry {
  pub started_at:      DateTime<Utc>,
  pub finished_at:     DateTime<Utc>,
  pub status:          RefreshStatus,
  pub records_loaded:  u64,
  pub records_skipped: u64,
  pub error_message:   Option<String>,
}
