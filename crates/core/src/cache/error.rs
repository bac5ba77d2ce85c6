use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let error = CacheError::ConnectionFailed("timeout".to_string());
        assert_eq!(error.to_string(), "Cache connection failed: timeout");
    }

    #[test]
    fn test_operation_failed_display() {
        let error = CacheError::OperationFailed("value is not an integer".to_string());
        assert_eq!(
            error.to_string(),
            "Cache operation failed: value is not an integer"
        );
    }

    #[test]
    fn test_serialization_display() {
        let error = CacheError::Serialization("invalid JSON".to_string());
        assert_eq!(error.to_string(), "Serialization error: invalid JSON");
    }

    #[test]
    fn test_invalid_ttl_display() {
        let error = CacheError::InvalidTtl("zero duration for key iss:last_fetch".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid TTL: zero duration for key iss:last_fetch"
        );
    }
}
