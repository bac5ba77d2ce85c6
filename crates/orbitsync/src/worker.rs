//! Periodic worker driving one synchronization domain.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use orbitsync_core::sync::{SyncOutcome, Synchronizer};

/// Lifecycle of a worker. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Schedule of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Run one invocation inside `start` before the first tick.
    pub run_on_start: bool,
}

impl WorkerConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            run_on_start: true,
        }
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }
}

/// Runs a [`Synchronizer`] on a fixed interval.
///
/// The state lives in a `watch` channel: transitions are check-and-set under
/// the channel lock, the run loop observes `Stopping` through it, and
/// `stopped()` waits on it for the final `Stopped`.
pub struct Worker {
    name: String,
    synchronizer: Arc<dyn Synchronizer>,
    config: WorkerConfig,
    state: Arc<watch::Sender<WorkerState>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(synchronizer: Arc<dyn Synchronizer>, config: WorkerConfig) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            name: synchronizer.domain().to_string(),
            synchronizer,
            config,
            state: Arc::new(state),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> WorkerConfig {
        self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Starts the worker. Returns false if it was not idle.
    ///
    /// With `run_on_start`, the first invocation completes before this
    /// returns. The tick loop then runs on its own task.
    pub async fn start(&self) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == WorkerState::Idle {
                *state = WorkerState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            tracing::debug!(worker = %self.name, state = ?self.state(), "Worker already started");
            return false;
        }

        tracing::info!(
            worker = %self.name,
            interval_secs = self.config.interval.as_secs(),
            run_on_start = self.config.run_on_start,
            "Worker started"
        );

        if self.config.run_on_start {
            run_once(&*self.synchronizer).await;
        }

        let handle = tokio::spawn(run_loop(
            self.name.clone(),
            self.synchronizer.clone(),
            self.config.interval,
            self.state.clone(),
        ));
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Asks the worker to stop. Returns false if it was already stopping.
    ///
    /// An idle worker goes straight to `Stopped`. A running one moves to
    /// `Stopping` and reaches `Stopped` once its loop observes the signal;
    /// an invocation in flight is not interrupted.
    pub fn stop(&self) -> bool {
        let signalled = self.state.send_if_modified(|state| match *state {
            WorkerState::Idle => {
                *state = WorkerState::Stopped;
                true
            }
            WorkerState::Running => {
                *state = WorkerState::Stopping;
                true
            }
            WorkerState::Stopping | WorkerState::Stopped => false,
        });
        if signalled {
            tracing::debug!(worker = %self.name, "Worker stop requested");
        }
        signalled
    }

    /// Waits until the worker reaches `Stopped`.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == WorkerState::Stopped).await;
    }

    /// Aborts the loop task without waiting for the current invocation.
    pub(crate) fn abort(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

async fn run_loop(
    name: String,
    synchronizer: Arc<dyn Synchronizer>,
    interval: Duration,
    state: Arc<watch::Sender<WorkerState>>,
) {
    let mut rx = state.subscribe();
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop_requested(&mut rx) => break,
            _ = ticker.tick() => run_once(&*synchronizer).await,
        }
    }

    state.send_replace(WorkerState::Stopped);
    tracing::info!(worker = %name, "Worker stopped");
}

async fn stop_requested(rx: &mut watch::Receiver<WorkerState>) {
    let _ = rx.wait_for(|state| *state != WorkerState::Running).await;
}

/// Runs one invocation and logs its result. Never fails.
async fn run_once(synchronizer: &dyn Synchronizer) {
    let domain = synchronizer.domain();
    match AssertUnwindSafe(synchronizer.sync()).catch_unwind().await {
        Ok(Ok(SyncOutcome::Locked)) => {
            tracing::debug!(domain, "Tick skipped, fetch lock held");
        }
        Ok(Ok(SyncOutcome::Completed { fetched, persisted })) => {
            tracing::debug!(domain, fetched, persisted, "Tick completed");
        }
        Ok(Ok(SyncOutcome::PersistFailed { fetched, error })) => {
            tracing::error!(domain, fetched, error = %error, "Tick fetched data but could not persist it");
        }
        Ok(Err(err)) => {
            tracing::warn!(domain, error = %err, "Tick failed, will retry on next tick");
        }
        Err(_) => {
            tracing::error!(domain, "Tick panicked");
        }
    }
}
