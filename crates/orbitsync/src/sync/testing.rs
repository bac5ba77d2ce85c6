//! Hand-written collaborators for the service tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use orbitsync_core::domain::{PositionRecord, TelemetrySample, TelemetryStats};
use orbitsync_core::source::{EventQuery, EventSource, Source, SourceError, TelemetrySource};
use orbitsync_core::storage::{
    PositionRepository, RepositoryError, Result, TelemetryRepository, TimeRange,
};

/// A source returning a canned response and counting calls.
pub struct MockSource {
    id: String,
    response: Mutex<std::result::Result<Value, SourceError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(value: Value) -> Self {
        Self {
            id: "mock".to_string(),
            response: Mutex::new(Ok(value)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: SourceError) -> Self {
        let source = Self::new(Value::Null);
        *source.response.lock().unwrap() = Err(error);
        source
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond_with(&self, response: std::result::Result<Value, SourceError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn url(&self) -> &str {
        "https://upstream.test"
    }

    async fn fetch(&self) -> std::result::Result<Value, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.lock().unwrap().clone()
    }
}

/// An events source returning a canned document and recording each query.
pub struct MockEventSource {
    inner: MockSource,
    last_query: Mutex<Option<EventQuery>>,
}

impl MockEventSource {
    pub fn new(value: Value) -> Self {
        Self {
            inner: MockSource::new(value),
            last_query: Mutex::new(None),
        }
    }

    pub fn failing(error: SourceError) -> Self {
        Self {
            inner: MockSource::failing(error),
            last_query: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inner = self.inner.with_delay(delay);
        self
    }

    pub fn respond_with(&self, response: std::result::Result<Value, SourceError>) {
        self.inner.respond_with(response);
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }

    pub fn last_query(&self) -> Option<EventQuery> {
        *self.last_query.lock().unwrap()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn events(&self, query: &EventQuery) -> std::result::Result<Value, SourceError> {
        *self.last_query.lock().unwrap() = Some(*query);
        self.inner.fetch().await
    }
}

/// A telemetry source producing fixed-size batches.
pub struct MockTelemetrySource {
    batch_size: usize,
    calls: AtomicUsize,
}

impl MockTelemetrySource {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for MockTelemetrySource {
    async fn read_batch(&self) -> std::result::Result<Vec<TelemetrySample>, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        Ok((0..self.batch_size)
            .map(|i| {
                TelemetrySample::new(
                    now - chrono::Duration::seconds((self.batch_size - i) as i64),
                    5.0,
                    20.0,
                    format!("batch_{}", call),
                )
            })
            .collect())
    }
}

/// A repository whose every operation fails as if the database were down.
pub struct BrokenRepository;

fn down<T>() -> Result<T> {
    Err(RepositoryError::ConnectionFailed("database is down".to_string()))
}

#[async_trait]
impl PositionRepository for BrokenRepository {
    async fn create_position(&self, _record: &PositionRecord) -> Result<()> {
        down()
    }

    async fn get_position(&self, _id: Uuid) -> Result<Option<PositionRecord>> {
        down()
    }

    async fn get_latest_position(&self) -> Result<Option<PositionRecord>> {
        down()
    }

    async fn get_latest_positions(&self, _n: usize) -> Result<Vec<PositionRecord>> {
        down()
    }

    async fn get_positions_in_range(&self, _range: TimeRange) -> Result<Vec<PositionRecord>> {
        down()
    }

    async fn count_positions(&self) -> Result<u64> {
        down()
    }
}

#[async_trait]
impl TelemetryRepository for BrokenRepository {
    async fn create_sample(&self, _sample: &TelemetrySample) -> Result<()> {
        down()
    }

    async fn create_samples(&self, _samples: &[TelemetrySample]) -> Result<()> {
        down()
    }

    async fn get_samples_in_range(&self, _range: TimeRange) -> Result<Vec<TelemetrySample>> {
        down()
    }

    async fn get_latest_samples(&self, _limit: u32) -> Result<Vec<TelemetrySample>> {
        down()
    }

    async fn get_stats(&self, _range: TimeRange) -> Result<TelemetryStats> {
        down()
    }

    async fn delete_samples_before(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        down()
    }

    async fn count_samples(&self) -> Result<u64> {
        down()
    }
}

/// Shorthand for a timestamp a number of minutes before now.
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}
