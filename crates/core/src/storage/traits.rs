use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{CatalogItem, Observation, PositionRecord, TelemetrySample, TelemetryStats};

use super::{PageRequest, Result, TimeRange, UpsertSummary};

/// Repository for ISS position documents.
#[async_trait]
pub trait PositionRepository: Send + Sync {
    /// Stores a new position record.
    async fn create_position(&self, record: &PositionRecord) -> Result<()>;

    /// Gets a position record by its ID.
    async fn get_position(&self, id: Uuid) -> Result<Option<PositionRecord>>;

    /// Gets the most recently fetched position.
    async fn get_latest_position(&self) -> Result<Option<PositionRecord>>;

    /// Gets the `n` most recent positions, newest first.
    async fn get_latest_positions(&self, n: usize) -> Result<Vec<PositionRecord>>;

    /// Gets positions fetched within a window, newest first.
    async fn get_positions_in_range(&self, range: TimeRange) -> Result<Vec<PositionRecord>>;

    /// Counts stored positions.
    async fn count_positions(&self) -> Result<u64>;
}

/// Repository for catalog items keyed by `dataset_id`.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Stores a new item. Fails with `AlreadyExists` on a duplicate natural key.
    async fn create_item(&self, item: &CatalogItem) -> Result<()>;

    /// Inserts or updates a batch by natural key in one transaction.
    ///
    /// Items with an empty `dataset_id` are skipped and counted. Any other
    /// failure rolls back the whole batch.
    async fn upsert_items(&self, items: &[CatalogItem]) -> Result<UpsertSummary>;

    /// Gets an item by its ID.
    async fn get_item(&self, id: Uuid) -> Result<Option<CatalogItem>>;

    /// Gets an item by its natural key.
    async fn get_item_by_dataset_id(&self, dataset_id: &str) -> Result<Option<CatalogItem>>;

    /// Lists items most-recently-updated first, nulls last, then newest created.
    async fn list_items(&self, page: PageRequest) -> Result<Vec<CatalogItem>>;

    /// Case-insensitive substring search over title and dataset id.
    async fn search_items(&self, query: &str, limit: u32) -> Result<Vec<CatalogItem>>;

    /// Counts stored items.
    async fn count_items(&self) -> Result<u64>;
}

/// Repository for telemetry samples.
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Stores a single sample.
    async fn create_sample(&self, sample: &TelemetrySample) -> Result<()>;

    /// Stores a batch of samples in one transaction.
    async fn create_samples(&self, samples: &[TelemetrySample]) -> Result<()>;

    /// Gets samples recorded within a window, newest first.
    async fn get_samples_in_range(&self, range: TimeRange) -> Result<Vec<TelemetrySample>>;

    /// Gets the `limit` most recent samples, newest first.
    async fn get_latest_samples(&self, limit: u32) -> Result<Vec<TelemetrySample>>;

    /// Aggregates samples recorded within a window.
    async fn get_stats(&self, range: TimeRange) -> Result<TelemetryStats>;

    /// Deletes samples recorded before `cutoff`. Returns the number removed.
    async fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Counts stored samples.
    async fn count_samples(&self) -> Result<u64>;
}

/// Repository for raw feed observations.
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Stores a new observation.
    async fn create_observation(&self, observation: &Observation) -> Result<()>;

    /// Gets the most recent observation from a source.
    async fn get_latest_observation(&self, source: &str) -> Result<Option<Observation>>;

    /// Gets up to `limit` observations from a source, newest first.
    async fn get_observations(&self, source: &str, limit: u32) -> Result<Vec<Observation>>;

    /// Gets observations from a source within a window, newest first.
    async fn get_observations_in_range(
        &self,
        source: &str,
        range: TimeRange,
    ) -> Result<Vec<Observation>>;

    /// Deletes observations fetched before `cutoff`. Returns the number removed.
    async fn delete_observations_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
