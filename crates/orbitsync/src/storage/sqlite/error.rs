//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `RepositoryError` from
//! `orbitsync_core::storage`.

use orbitsync_core::storage::RepositoryError;

/// Maps a rusqlite error to a RepositoryError.
///
/// - UNIQUE / PRIMARY KEY violations → `AlreadyExists`
/// - Cannot open / busy / locked → `ConnectionFailed`
/// - Row conversion failures → `Serialization`
/// - Everything else → `QueryFailed`
fn map_rusqlite_error(err: &rusqlite::Error, entity_type: &'static str, id: &str) -> RepositoryError {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            RepositoryError::AlreadyExists {
                entity_type,
                id: id.to_string(),
            }
        }

        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if matches!(
                sqlite_err.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            RepositoryError::ConnectionFailed(err.to_string())
        }

        rusqlite::Error::FromSqlConversionFailure(..) => {
            RepositoryError::Serialization(format!("{entity_type}: {err}"))
        }

        _ => RepositoryError::QueryFailed(err.to_string()),
    }
}

/// Maps a tokio_rusqlite error to a RepositoryError.
pub fn map_tokio_rusqlite_error(
    err: tokio_rusqlite::Error,
    entity_type: &'static str,
) -> RepositoryError {
    map_tokio_rusqlite_error_with_id(err, entity_type, "unknown")
}

/// Maps a tokio_rusqlite error with a known ID to a RepositoryError.
pub fn map_tokio_rusqlite_error_with_id(
    err: tokio_rusqlite::Error,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    match &err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => {
            map_rusqlite_error(rusqlite_err, entity_type, &id.into())
        }
        tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_) => {
            RepositoryError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        _ => RepositoryError::QueryFailed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    #[test]
    fn test_unique_constraint_maps_to_already_exists() {
        let sqlite_err = ffi::Error {
            code: rusqlite::ErrorCode::ConstraintViolation,
            extended_code: ffi::SQLITE_CONSTRAINT_UNIQUE,
        };
        let err = tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(sqlite_err, None));

        let result = map_tokio_rusqlite_error_with_id(err, "CatalogItem", "OSD-1");

        assert_eq!(
            result,
            RepositoryError::AlreadyExists {
                entity_type: "CatalogItem",
                id: "OSD-1".to_string()
            }
        );
    }

    #[test]
    fn test_busy_maps_to_connection_failed() {
        let sqlite_err = ffi::Error {
            code: rusqlite::ErrorCode::DatabaseBusy,
            extended_code: ffi::SQLITE_BUSY,
        };
        let err = tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(sqlite_err, None));

        assert!(matches!(
            map_tokio_rusqlite_error(err, "TelemetrySample"),
            RepositoryError::ConnectionFailed(_)
        ));
    }

    #[test]
    fn test_connection_closed_maps_to_connection_failed() {
        let result = map_tokio_rusqlite_error(tokio_rusqlite::Error::ConnectionClosed, "Observation");
        assert!(matches!(result, RepositoryError::ConnectionFailed(_)));
    }

    #[test]
    fn test_other_error_maps_to_query_failed() {
        let err = tokio_rusqlite::Error::Other(Box::new(std::io::Error::other("test error")));
        assert!(matches!(
            map_tokio_rusqlite_error(err, "PositionRecord"),
            RepositoryError::QueryFailed(_)
        ));
    }
}
