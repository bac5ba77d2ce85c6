//! Scheduler owning the set of workers.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;

use crate::worker::{Worker, WorkerState};

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by scheduler operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler already started")]
    AlreadyStarted,
    #[error("Scheduler is stopped")]
    Stopped,
}

/// How a call to [`Scheduler::stop`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every worker acknowledged the stop in time.
    Graceful,
    /// The timeout elapsed first; these workers had not stopped.
    TimedOut { pending: Vec<String> },
    /// A previous call already stopped the scheduler.
    AlreadyStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

struct Inner {
    phase: Phase,
    workers: Vec<Arc<Worker>>,
}

/// Starts workers concurrently and stops them within a bounded time.
pub struct Scheduler {
    inner: Mutex<Inner>,
    shutdown_timeout: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl Scheduler {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                workers: Vec::new(),
            }),
            shutdown_timeout,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a worker. Only valid before `start`.
    pub fn add_worker(&self, worker: Worker) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Idle => {
                tracing::debug!(worker = %worker.name(), "Worker registered");
                inner.workers.push(Arc::new(worker));
                Ok(())
            }
            Phase::Running => Err(SchedulerError::AlreadyStarted),
            Phase::Stopped => Err(SchedulerError::Stopped),
        }
    }

    /// Launches every worker on its own task and returns immediately.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let workers = {
            let mut inner = self.lock();
            match inner.phase {
                Phase::Idle => inner.phase = Phase::Running,
                Phase::Running => return Err(SchedulerError::AlreadyStarted),
                Phase::Stopped => return Err(SchedulerError::Stopped),
            }
            inner.workers.clone()
        };

        tracing::info!(workers = workers.len(), "Scheduler started");
        for worker in workers {
            tokio::spawn(async move {
                worker.start().await;
            });
        }
        Ok(())
    }

    /// Stops every worker, waiting at most the shutdown timeout.
    ///
    /// Later calls return [`StopOutcome::AlreadyStopped`].
    pub async fn stop(&self) -> StopOutcome {
        let workers = {
            let mut inner = self.lock();
            if inner.phase == Phase::Stopped {
                return StopOutcome::AlreadyStopped;
            }
            inner.phase = Phase::Stopped;
            inner.workers.clone()
        };

        for worker in &workers {
            worker.stop();
        }

        let all_stopped = join_all(workers.iter().map(|w| w.stopped()));
        match tokio::time::timeout(self.shutdown_timeout, all_stopped).await {
            Ok(_) => {
                tracing::info!(workers = workers.len(), "Scheduler stopped gracefully");
                StopOutcome::Graceful
            }
            Err(_) => {
                let pending: Vec<String> = workers
                    .iter()
                    .filter(|w| w.state() != WorkerState::Stopped)
                    .map(|w| {
                        w.abort();
                        w.name().to_string()
                    })
                    .collect();
                tracing::warn!(
                    timeout_secs = self.shutdown_timeout.as_secs(),
                    pending = ?pending,
                    "Scheduler stop timed out, abandoning workers"
                );
                StopOutcome::TimedOut { pending }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().phase == Phase::Running
    }

    /// Current state of every worker in registration order.
    pub fn worker_states(&self) -> Vec<(String, WorkerState)> {
        self.lock()
            .workers
            .iter()
            .map(|w| (w.name().to_string(), w.state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tests::CountingSync;
    use crate::worker::WorkerConfig;

    fn worker(sync: Arc<CountingSync>, run_on_start: bool) -> Worker {
        Worker::new(
            sync,
            WorkerConfig::new(Duration::from_secs(60)).with_run_on_start(run_on_start),
        )
    }

    #[tokio::test]
    async fn test_stop_right_after_start_is_bounded() {
        let scheduler = Scheduler::new(Duration::from_millis(500));
        let sync = Arc::new(CountingSync::new());
        scheduler.add_worker(worker(sync.clone(), true)).unwrap();
        scheduler.add_worker(worker(sync, false)).unwrap();

        scheduler.start().unwrap();
        assert!(scheduler.is_running());

        let started = tokio::time::Instant::now();
        let outcome = scheduler.stop().await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome, StopOutcome::Graceful);
        assert!(!scheduler.is_running());

        assert_eq!(scheduler.stop().await, StopOutcome::AlreadyStopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_times_out_on_hung_invocation() {
        let scheduler = Scheduler::new(Duration::from_secs(10));
        let slow = Arc::new(CountingSync::slow(Duration::from_secs(300)));
        scheduler.add_worker(worker(slow.clone(), true)).unwrap();
        scheduler.start().unwrap();

        // Let the front-loaded invocation begin
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(slow.calls(), 1);

        let started = tokio::time::Instant::now();
        let outcome = scheduler.stop().await;
        assert_eq!(
            outcome,
            StopOutcome::TimedOut {
                pending: vec!["counting".to_string()]
            }
        );
        assert!(started.elapsed() <= Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_add_worker_rejected_after_start_and_stop() {
        let scheduler = Scheduler::default();
        scheduler.start().unwrap();
        assert_eq!(
            scheduler.add_worker(worker(Arc::new(CountingSync::new()), false)),
            Err(SchedulerError::AlreadyStarted)
        );
        assert_eq!(scheduler.start(), Err(SchedulerError::AlreadyStarted));

        scheduler.stop().await;
        assert_eq!(
            scheduler.add_worker(worker(Arc::new(CountingSync::new()), false)),
            Err(SchedulerError::Stopped)
        );
        assert_eq!(scheduler.start(), Err(SchedulerError::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_run_concurrently() {
        let scheduler = Scheduler::default();
        let a = Arc::new(CountingSync::slow(Duration::from_secs(5)));
        let b = Arc::new(CountingSync::slow(Duration::from_secs(5)));
        scheduler.add_worker(worker(a.clone(), true)).unwrap();
        scheduler.add_worker(worker(b.clone(), true)).unwrap();

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Both front-loaded invocations are in flight at once
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let states = scheduler.worker_states();
        assert!(states.iter().all(|(_, s)| *s == WorkerState::Running));

        assert_eq!(scheduler.stop().await, StopOutcome::Graceful);
    }
}
