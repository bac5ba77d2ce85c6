//! In-memory repository implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use orbitsync_core::domain::{
    CatalogItem, Observation, PositionRecord, TelemetrySample, TelemetryStats,
};
use orbitsync_core::storage::{
    CatalogRepository, ObservationRepository, PageRequest, PositionRepository, RepositoryError,
    Result, TelemetryRepository, TimeRange, UpsertSummary,
};

/// In-memory storage backend for testing.
///
/// Uses collections wrapped in `Arc<RwLock<_>>` for thread-safe access.
/// Data is not persisted and will be lost when the repository is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    positions: Arc<RwLock<Vec<PositionRecord>>>,
    /// Catalog items keyed by trimmed `dataset_id`.
    catalog: Arc<RwLock<HashMap<String, CatalogItem>>>,
    telemetry: Arc<RwLock<Vec<TelemetrySample>>>,
    observations: Arc<RwLock<Vec<Observation>>>,
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Most recently updated first with missing timestamps last, then newest created.
fn catalog_order(a: &CatalogItem, b: &CatalogItem) -> Ordering {
    match (a.updated_at, b.updated_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.created_at.cmp(&a.created_at))
}

#[async_trait]
impl PositionRepository for InMemoryRepository {
    async fn create_position(&self, record: &PositionRecord) -> Result<()> {
        let mut positions = self.positions.write().await;
        if positions.iter().any(|p| p.id == record.id) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "PositionRecord",
                id: record.id.to_string(),
            });
        }
        positions.push(record.clone());
        Ok(())
    }

    async fn get_position(&self, id: Uuid) -> Result<Option<PositionRecord>> {
        let positions = self.positions.read().await;
        Ok(positions.iter().find(|p| p.id == id).cloned())
    }

    async fn get_latest_position(&self) -> Result<Option<PositionRecord>> {
        Ok(self.get_latest_positions(1).await?.into_iter().next())
    }

    async fn get_latest_positions(&self, n: usize) -> Result<Vec<PositionRecord>> {
        let positions = self.positions.read().await;
        let mut latest: Vec<_> = positions.clone();
        latest.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        latest.truncate(n);
        Ok(latest)
    }

    async fn get_positions_in_range(&self, range: TimeRange) -> Result<Vec<PositionRecord>> {
        let positions = self.positions.read().await;
        let mut found: Vec<_> = positions
            .iter()
            .filter(|p| range.contains(p.fetched_at))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        Ok(found)
    }

    async fn count_positions(&self) -> Result<u64> {
        Ok(self.positions.read().await.len() as u64)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn create_item(&self, item: &CatalogItem) -> Result<()> {
        if item.has_empty_key() {
            return Err(RepositoryError::InvalidData(
                "catalog item has an empty dataset_id".to_string(),
            ));
        }
        let key = item.dataset_id.trim().to_string();
        let mut catalog = self.catalog.write().await;
        if catalog.contains_key(&key) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "CatalogItem",
                id: key,
            });
        }
        let mut stored = item.clone();
        stored.dataset_id = key.clone();
        catalog.insert(key, stored);
        Ok(())
    }

    async fn upsert_items(&self, items: &[CatalogItem]) -> Result<UpsertSummary> {
        let mut summary = UpsertSummary::default();
        // Holding the write guard for the whole batch makes it atomic
        let mut catalog = self.catalog.write().await;

        for item in items {
            if item.has_empty_key() {
                summary.skipped += 1;
                continue;
            }
            let key = item.dataset_id.trim().to_string();
            match catalog.get_mut(&key) {
                Some(existing) => {
                    existing.absorb(item);
                    summary.updated += 1;
                }
                None => {
                    let mut stored = item.clone();
                    stored.dataset_id = key.clone();
                    catalog.insert(key, stored);
                    summary.inserted += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<CatalogItem>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.values().find(|i| i.id == id).cloned())
    }

    async fn get_item_by_dataset_id(&self, dataset_id: &str) -> Result<Option<CatalogItem>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.get(dataset_id.trim()).cloned())
    }

    async fn list_items(&self, page: PageRequest) -> Result<Vec<CatalogItem>> {
        let catalog = self.catalog.read().await;
        let mut items: Vec<_> = catalog.values().cloned().collect();
        items.sort_by(catalog_order);
        Ok(items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn search_items(&self, query: &str, limit: u32) -> Result<Vec<CatalogItem>> {
        let needle = query.trim().to_lowercase();
        let catalog = self.catalog.read().await;
        let mut found: Vec<_> = catalog
            .values()
            .filter(|i| {
                i.title.to_lowercase().contains(&needle)
                    || i.dataset_id.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by(catalog_order);
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn count_items(&self) -> Result<u64> {
        Ok(self.catalog.read().await.len() as u64)
    }
}

#[async_trait]
impl TelemetryRepository for InMemoryRepository {
    async fn create_sample(&self, sample: &TelemetrySample) -> Result<()> {
        self.create_samples(std::slice::from_ref(sample)).await
    }

    async fn create_samples(&self, samples: &[TelemetrySample]) -> Result<()> {
        let mut telemetry = self.telemetry.write().await;
        if let Some(dup) = samples
            .iter()
            .find(|s| telemetry.iter().any(|t| t.id == s.id))
        {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "TelemetrySample",
                id: dup.id.to_string(),
            });
        }
        telemetry.extend_from_slice(samples);
        Ok(())
    }

    async fn get_samples_in_range(&self, range: TimeRange) -> Result<Vec<TelemetrySample>> {
        let telemetry = self.telemetry.read().await;
        let mut found: Vec<_> = telemetry
            .iter()
            .filter(|s| range.contains(s.recorded_at))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(found)
    }

    async fn get_latest_samples(&self, limit: u32) -> Result<Vec<TelemetrySample>> {
        let telemetry = self.telemetry.read().await;
        let mut latest = telemetry.clone();
        latest.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        latest.truncate(limit as usize);
        Ok(latest)
    }

    async fn get_stats(&self, range: TimeRange) -> Result<TelemetryStats> {
        let samples = self.get_samples_in_range(range).await?;
        Ok(TelemetryStats::from_samples(&samples))
    }

    async fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut telemetry = self.telemetry.write().await;
        let before = telemetry.len();
        telemetry.retain(|s| s.recorded_at >= cutoff);
        Ok((before - telemetry.len()) as u64)
    }

    async fn count_samples(&self) -> Result<u64> {
        Ok(self.telemetry.read().await.len() as u64)
    }
}

#[async_trait]
impl ObservationRepository for InMemoryRepository {
    async fn create_observation(&self, observation: &Observation) -> Result<()> {
        let mut observations = self.observations.write().await;
        if observations.iter().any(|o| o.id == observation.id) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "Observation",
                id: observation.id.to_string(),
            });
        }
        observations.push(observation.clone());
        Ok(())
    }

    async fn get_latest_observation(&self, source: &str) -> Result<Option<Observation>> {
        Ok(self.get_observations(source, 1).await?.into_iter().next())
    }

    async fn get_observations(&self, source: &str, limit: u32) -> Result<Vec<Observation>> {
        let observations = self.observations.read().await;
        let mut found: Vec<_> = observations
            .iter()
            .filter(|o| o.source == source)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn get_observations_in_range(
        &self,
        source: &str,
        range: TimeRange,
    ) -> Result<Vec<Observation>> {
        let observations = self.observations.read().await;
        let mut found: Vec<_> = observations
            .iter()
            .filter(|o| o.source == source && range.contains(o.fetched_at))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        Ok(found)
    }

    async fn delete_observations_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut observations = self.observations.write().await;
        let before = observations.len();
        observations.retain(|o| o.fetched_at >= cutoff);
        Ok((before - observations.len()) as u64)
    }
}
