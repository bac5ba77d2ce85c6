use std::time::Duration;

use thiserror::Error;

use crate::domain::SchemaMismatch;
use crate::source::SourceError;
use crate::storage::RepositoryError;

/// Errors from one synchronization invocation.
///
/// Background ticks only log these. `force_sync` hands them to its caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] SourceError),
    #[error("Unexpected payload shape: {0}")]
    Schema(#[from] SchemaMismatch),
    #[error("Persist failed: {0}")]
    Persist(#[from] RepositoryError),
    #[error("Sync exceeded its {0:?} deadline")]
    Timeout(Duration),
}

/// Errors surfaced by the read path.
///
/// "No data yet" is not an error: reads return `Ok(None)` or an empty list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Service degraded: {0}")]
    Degraded(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        ServiceError::Degraded(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let error = SyncError::from(SourceError::Request("connection refused".to_string()));
        assert_eq!(
            error.to_string(),
            "Fetch failed: Request failed: connection refused"
        );
    }

    #[test]
    fn test_timeout_display() {
        let error = SyncError::Timeout(Duration::from_secs(30));
        assert_eq!(error.to_string(), "Sync exceeded its 30s deadline");
    }

    #[test]
    fn test_repository_error_degrades_reads() {
        let error = ServiceError::from(RepositoryError::ConnectionFailed("gone".to_string()));
        assert_eq!(
            error,
            ServiceError::Degraded("Connection failed: gone".to_string())
        );
    }
}
