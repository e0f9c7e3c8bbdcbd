//! Timed and on-demand refresh cycles, one at a time.
//!
//! A single worker task consumes a trigger channel of depth one. A trigger is
//! accepted only if it moves [`RefreshState`] to in-progress, which happens
//! under the state channel's lock, so at most one cycle is ever queued or
//! running.

use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use callbook_core::refresh::RefreshState;
use chrono::{DateTime, Utc};
use tokio::{
  sync::{mpsc, watch},
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};

use crate::pipeline::Pipeline;

/// When cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
  pub interval:      Duration,
  pub startup_delay: Duration,
}

impl Schedule {
  /// Delay before the first timed cycle.
  ///
  /// A successful refresh younger than the interval defers the first tick
  /// until it ages past the interval, so a restart does not re-download.
  pub fn first_delay(&self, last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let Some(at) = last_success else {
      return self.startup_delay;
    };
    let age = (now - at).to_std().unwrap_or_default();
    self
      .interval
      .checked_sub(age)
      .map_or(self.startup_delay, |rest| rest.max(self.startup_delay))
  }
}

struct Shared {
  state:   watch::Sender<RefreshState>,
  trigger: mpsc::Sender<()>,
}

impl Shared {
  fn trigger(&self) -> RefreshState {
    let mut accepted = false;
    self.state.send_if_modified(|state| {
      if state.is_in_progress() {
        return false;
      }
      state.begin(Utc::now());
      accepted = true;
      true
    });

    if accepted && self.trigger.try_send(()).is_err() {
      tracing::warn!("refresh worker is not running");
      self
        .state
        .send_modify(|state| state.fail(Utc::now(), "refresh worker is not running".into()));
    } else if accepted {
      tracing::info!("refresh cycle queued");
    } else {
      tracing::debug!("refresh already in progress");
    }
    self.state.borrow().clone()
  }
}

/// Owner of the refresh worker and ticker tasks.
pub struct Scheduler {
  shared: Arc<Shared>,
  stop:   watch::Sender<bool>,
  ticker: Mutex<Option<JoinHandle<()>>>,
  worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
  /// Spawn the worker and the ticker. Must be called inside a tokio runtime.
  pub fn start<P: Pipeline>(
    pipeline: P,
    schedule: Schedule,
    last_success: Option<DateTime<Utc>>,
  ) -> Self {
    let (state, _) = watch::channel(RefreshState::idle());
    let (trigger, triggers) = mpsc::channel(1);
    let (stop, stopped) = watch::channel(false);
    let shared = Arc::new(Shared { state, trigger });

    let worker = tokio::spawn(work(pipeline, shared.clone(), triggers, stopped));

    let first = schedule.first_delay(last_success, Utc::now());
    tracing::info!(
      first_in_secs = first.as_secs(),
      interval_secs = schedule.interval.as_secs(),
      "refresh scheduled"
    );
    let ticker = tokio::spawn(tick(shared.clone(), first, schedule.interval));

    Self {
      shared,
      stop,
      ticker: Mutex::new(Some(ticker)),
      worker: Mutex::new(Some(worker)),
    }
  }

  /// Request a cycle now. A no-op while one is in progress; either way the
  /// resulting state is returned.
  pub fn trigger(&self) -> RefreshState { self.shared.trigger() }

  pub fn state(&self) -> RefreshState { self.shared.state.borrow().clone() }

  /// Observe state changes.
  pub fn subscribe(&self) -> watch::Receiver<RefreshState> { self.shared.state.subscribe() }

  /// Cancel the pending tick and wait for an in-flight cycle to finish.
  pub async fn shutdown(&self) {
    if let Some(ticker) = take(&self.ticker) {
      ticker.abort();
    }
    self.stop.send_replace(true);
    if let Some(worker) = take(&self.worker)
      && let Err(e) = worker.await
    {
      tracing::warn!(error = %e, "refresh worker ended abnormally");
    }
  }
}

impl Drop for Scheduler {
  fn drop(&mut self) {
    for handle in [take(&self.ticker), take(&self.worker)].into_iter().flatten() {
      handle.abort();
    }
  }
}

fn take(slot: &Mutex<Option<JoinHandle<()>>>) -> Option<JoinHandle<()>> {
  match slot.lock() {
    Ok(mut guard) => guard.take(),
    Err(poisoned) => poisoned.into_inner().take(),
  }
}

async fn tick(shared: Arc<Shared>, first: Duration, interval: Duration) {
  let mut ticks = tokio::time::interval_at(Instant::now() + first, interval);
  ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
  loop {
    ticks.tick().await;
    tracing::info!("scheduled refresh tick");
    shared.trigger();
  }
}

async fn work<P: Pipeline>(
  pipeline: P,
  shared: Arc<Shared>,
  mut triggers: mpsc::Receiver<()>,
  mut stopped: watch::Receiver<bool>,
) {
  loop {
    tokio::select! {
      biased;
      // The `watch::Ref` guard must not outlive the branch future.
      _ = async { let _ = stopped.wait_for(|stop| *stop).await; } => break,
      next = triggers.recv() => {
        if next.is_none() {
          break;
        }
        run_cycle(&pipeline, &shared).await;
      }
    }
  }
}

async fn run_cycle<P: Pipeline>(pipeline: &P, shared: &Shared) {
  tracing::info!("refresh cycle started");
  let outcome = pipeline.run().await;
  let now = Utc::now();

  shared.state.send_modify(|state| match &outcome {
    Ok(report) => state.succeed(now, report.loaded(), report.skipped()),
    Err(e) => state.fail(now, e.to_string()),
  });
  match &outcome {
    Ok(report) => tracing::info!(
      generation = %report.generation,
      loaded = report.loaded(),
      skipped = report.skipped(),
      "refresh cycle succeeded"
    ),
    Err(e) => tracing::error!(error = %e, "refresh cycle failed"),
  }

  let entry = shared.state.borrow().log_entry();
  if let Some(entry) = entry {
    pipeline.record(entry).await;
  }
}
