//! Shared vocabulary of the synchronization services.

mod error;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::storage::RepositoryError;

pub use error::{ServiceError, SyncError};

/// Result of one synchronization invocation that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The fetch lock was held; nothing was fetched.
    Locked,
    /// Fetched and persisted.
    Completed { fetched: usize, persisted: usize },
    /// Fetched, but the repository write failed. The cache and fetch lock
    /// were still refreshed, so the data is lost until the lock expires.
    PersistFailed {
        fetched: usize,
        error: RepositoryError,
    },
}

impl SyncOutcome {
    pub fn is_locked(&self) -> bool {
        matches!(self, SyncOutcome::Locked)
    }

    /// Converts a persistence failure into an error for callers that must
    /// see it (manual syncs).
    pub fn into_result(self) -> Result<SyncOutcome, SyncError> {
        match self {
            SyncOutcome::PersistFailed { error, .. } => Err(SyncError::Persist(error)),
            other => Ok(other),
        }
    }
}

/// One synchronization domain: lock check, fetch, transform, persist, cache.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Domain name used for the fetch lock and in logs.
    fn domain(&self) -> &str;

    /// Runs one scheduled invocation, honoring the fetch lock.
    async fn sync(&self) -> Result<SyncOutcome, SyncError>;

    /// Runs one invocation regardless of the fetch lock.
    ///
    /// Persistence failures are returned as [`SyncError::Persist`].
    async fn force_sync(&self) -> Result<SyncOutcome, SyncError>;
}

/// Runs `fut` under a deadline, mapping expiry to [`SyncError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| SyncError::Timeout(deadline))?
}
