//! Client error types.

use std::time::Duration;

use orbitsync_core::source::SourceError;
use thiserror::Error;

/// Result type alias for client module.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ClientError> for SourceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::ServerError { status, message } => SourceError::Status {
                status,
                body: message,
            },
            ClientError::Timeout(after) => SourceError::Timeout(after),
            ClientError::InvalidResponse(msg) => SourceError::Decode(msg),
            ClientError::Json(e) => SourceError::Decode(e.to_string()),
            ClientError::Request(e) => SourceError::Request(e.to_string()),
            ClientError::InvalidInput(msg) => SourceError::Request(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_maps_to_status() {
        let err = ClientError::ServerError {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(
            SourceError::from(err),
            SourceError::Status {
                status: 429,
                body: "slow down".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_response_maps_to_decode() {
        let err = ClientError::InvalidResponse("empty body".to_string());
        assert_eq!(
            SourceError::from(err),
            SourceError::Decode("empty body".to_string())
        );
    }
}
