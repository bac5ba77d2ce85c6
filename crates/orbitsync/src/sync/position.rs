//! ISS position synchronization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use orbitsync_core::cache::{position_history_key, position_latest_key, position_trend_key, Cache};
use orbitsync_core::domain::{compute_trend, PositionRecord, TrendResult};
use orbitsync_core::source::Source;
use orbitsync_core::storage::{PositionRepository, TimeRange};
use orbitsync_core::sync::{with_deadline, ServiceError, SyncError, SyncOutcome, Synchronizer};

use super::{cache_lookup, cache_store, FetchLock};

pub const POSITION_DOMAIN: &str = "iss";

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(120);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
const LATEST_TTL: Duration = Duration::from_secs(120);
const TREND_TTL: Duration = Duration::from_secs(30);
const HISTORY_TTL: Duration = Duration::from_secs(300);
const DEFAULT_TREND_LIMIT: u32 = 240;

/// Synchronizes the ISS position feed and serves position reads.
///
/// # Type Parameters
///
/// * `R` - The repository storing position records
/// * `C` - The cache implementation
pub struct PositionSync<R, C>
where
    R: PositionRepository,
    C: Cache,
{
    source: Arc<dyn Source>,
    repository: Arc<R>,
    cache: Arc<C>,
    lock: FetchLock<C>,
    deadline: Duration,
}

impl<R, C> PositionSync<R, C>
where
    R: PositionRepository,
    C: Cache,
{
    pub fn new(source: Arc<dyn Source>, repository: Arc<R>, cache: Arc<C>) -> Self {
        let lock = FetchLock::new(cache.clone(), POSITION_DOMAIN, DEFAULT_INTERVAL);
        Self {
            source,
            repository,
            cache,
            lock,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Sets the minimum refetch interval (the fetch lock TTL).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.lock = FetchLock::new(self.cache.clone(), POSITION_DOMAIN, interval);
        self
    }

    /// Sets the deadline for one invocation.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn run(&self, honor_lock: bool) -> Result<SyncOutcome, SyncError> {
        if honor_lock && self.lock.is_held().await {
            tracing::debug!(domain = POSITION_DOMAIN, "Fetch lock held, skipping");
            return Ok(SyncOutcome::Locked);
        }
        with_deadline(self.deadline, self.fetch_and_store()).await
    }

    async fn fetch_and_store(&self) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let payload = self.source.fetch().await?;
        let record = PositionRecord::new(self.source.url(), payload);

        let outcome = match self.repository.create_position(&record).await {
            Ok(()) => SyncOutcome::Completed {
                fetched: 1,
                persisted: 1,
            },
            Err(error) => {
                tracing::error!(domain = POSITION_DOMAIN, error = %error, "Failed to persist position");
                SyncOutcome::PersistFailed { fetched: 1, error }
            }
        };

        cache_store(&*self.cache, &position_latest_key(), &record, LATEST_TTL).await;
        self.lock.acquire(started).await;

        tracing::info!(
            domain = POSITION_DOMAIN,
            record_id = %record.id,
            fetched_at = %record.fetched_at,
            "Position synced"
        );
        Ok(outcome)
    }

    /// Returns the most recent position, or `None` before the first sync.
    pub async fn get_latest(&self) -> Result<Option<PositionRecord>, ServiceError> {
        let key = position_latest_key();
        if let Some(record) = cache_lookup::<C, PositionRecord>(&self.cache, &key).await {
            return Ok(Some(record));
        }

        let record = self.repository.get_latest_position().await?;
        if let Some(ref r) = record {
            cache_store(&*self.cache, &key, r, LATEST_TTL).await;
        }
        Ok(record)
    }

    /// Returns the movement between the two most recent positions.
    ///
    /// `limit` only scopes the cache entry; a value of zero or less uses
    /// the default. The neutral result is never cached.
    pub async fn get_trend(&self, limit: i64) -> Result<TrendResult, ServiceError> {
        let limit = if limit <= 0 {
            DEFAULT_TREND_LIMIT
        } else {
            limit.min(u32::MAX as i64) as u32
        };
        let key = position_trend_key(limit);

        if let Some(trend) = cache_lookup::<C, TrendResult>(&self.cache, &key).await {
            return Ok(trend);
        }

        let latest = self.repository.get_latest_positions(2).await?;
        if latest.len() < 2 {
            return Ok(TrendResult::neutral());
        }

        let trend = compute_trend(&latest);
        cache_store(&*self.cache, &key, &trend, TREND_TTL).await;
        Ok(trend)
    }

    /// Returns positions fetched within a window, newest first.
    pub async fn get_history(&self, range: TimeRange) -> Result<Vec<PositionRecord>, ServiceError> {
        let key = position_history_key(range.from, range.to);
        if let Some(records) = cache_lookup::<C, Vec<PositionRecord>>(&self.cache, &key).await {
            if !records.is_empty() {
                return Ok(records);
            }
        }

        let records = self.repository.get_positions_in_range(range).await?;
        if !records.is_empty() {
            cache_store(&*self.cache, &key, &records, HISTORY_TTL).await;
        }
        Ok(records)
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(self.repository.count_positions().await?)
    }
}

#[async_trait]
impl<R, C> Synchronizer for PositionSync<R, C>
where
    R: PositionRepository + 'static,
    C: Cache + 'static,
{
    fn domain(&self) -> &str {
        POSITION_DOMAIN
    }

    async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(true).await
    }

    async fn force_sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(false).await?.into_result()
    }
}
