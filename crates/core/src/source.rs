//! Upstream data sources as seen by the synchronization services.
//!
//! A source is an opaque fetch: it returns a raw document or an error. The
//! services never branch on the kind of error; every failure is retried by
//! the next scheduled tick.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::TelemetrySample;

/// Errors that can occur while fetching from an upstream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response body: {0}")]
    Decode(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// A single upstream endpoint returning one JSON document per fetch.
#[async_trait]
pub trait Source: Send + Sync {
    /// Identifier used in logs and as the observation source tag.
    fn id(&self) -> &str;

    /// URL recorded as provenance on persisted documents.
    fn url(&self) -> &str;

    /// Fetches one document.
    async fn fetch(&self) -> Result<Value, SourceError>;
}

/// Produces batches of telemetry readings.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Reads one batch of samples.
    async fn read_batch(&self) -> Result<Vec<TelemetrySample>, SourceError>;
}

/// Observer location and look-ahead window of an events lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub days: u32,
}

/// Looks up upcoming astronomy events for an observer.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetches the raw events document for `query`.
    async fn events(&self, query: &EventQuery) -> Result<Value, SourceError>;
}
