//! Spacecraft telemetry synchronization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, Utc};
use tokio::time::Instant;

use orbitsync_core::cache::{telemetry_history_key, telemetry_latest_key, Cache};
use orbitsync_core::domain::{TelemetrySample, TelemetryStats};
use orbitsync_core::source::TelemetrySource;
use orbitsync_core::storage::{TelemetryRepository, TimeRange};
use orbitsync_core::sync::{with_deadline, ServiceError, SyncError, SyncOutcome, Synchronizer};

use super::{cache_lookup, cache_store, FetchLock};

pub const TELEMETRY_DOMAIN: &str = "telemetry";

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
const HISTORY_TTL: Duration = Duration::from_secs(60);
const DEFAULT_LATEST_LIMIT: u32 = 100;
const MAX_LATEST_LIMIT: i64 = 1000;

fn default_history_span() -> chrono::Duration {
    chrono::Duration::hours(24)
}

fn max_history_span() -> chrono::Duration {
    chrono::Duration::days(30)
}

/// Ingests telemetry batches and serves telemetry reads.
pub struct TelemetrySync<R, C>
where
    R: TelemetryRepository,
    C: Cache,
{
    source: Arc<dyn TelemetrySource>,
    repository: Arc<R>,
    cache: Arc<C>,
    lock: FetchLock<C>,
    deadline: Duration,
    retention: Option<chrono::Duration>,
}

impl<R, C> TelemetrySync<R, C>
where
    R: TelemetryRepository,
    C: Cache,
{
    pub fn new(source: Arc<dyn TelemetrySource>, repository: Arc<R>, cache: Arc<C>) -> Self {
        let lock = FetchLock::new(cache.clone(), TELEMETRY_DOMAIN, DEFAULT_INTERVAL);
        Self {
            source,
            repository,
            cache,
            lock,
            deadline: DEFAULT_DEADLINE,
            retention: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.lock = FetchLock::new(self.cache.clone(), TELEMETRY_DOMAIN, interval);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Enables the retention sweep run after each successful invocation.
    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    async fn run(&self, honor_lock: bool) -> Result<SyncOutcome, SyncError> {
        if honor_lock && self.lock.is_held().await {
            tracing::debug!(domain = TELEMETRY_DOMAIN, "Fetch lock held, skipping");
            return Ok(SyncOutcome::Locked);
        }

        let outcome = with_deadline(self.deadline, self.fetch_and_store()).await?;

        if let (SyncOutcome::Completed { .. }, Some(retention)) = (&outcome, self.retention) {
            if let Err(err) = self.sweep(retention).await {
                tracing::warn!(domain = TELEMETRY_DOMAIN, error = %err, "Retention sweep failed");
            }
        }
        Ok(outcome)
    }

    async fn fetch_and_store(&self) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let mut batch = self.source.read_batch().await?;
        newest_first(&mut batch);
        let fetched = batch.len();

        let outcome = match self.repository.create_samples(&batch).await {
            Ok(()) => SyncOutcome::Completed {
                fetched,
                persisted: fetched,
            },
            Err(error) => {
                tracing::error!(domain = TELEMETRY_DOMAIN, error = %error, "Failed to persist telemetry batch");
                SyncOutcome::PersistFailed { fetched, error }
            }
        };

        cache_store(&*self.cache, &telemetry_latest_key(), &batch, self.lock.ttl()).await;
        self.lock.acquire(started).await;

        tracing::info!(domain = TELEMETRY_DOMAIN, samples = fetched, "Telemetry synced");
        Ok(outcome)
    }

    /// Returns the most recent samples. Limits outside 1..=1000 use 100.
    ///
    /// Served from the cached latest batch when it holds enough samples,
    /// otherwise from the repository, refilling the cache.
    pub async fn get_latest(&self, limit: i64) -> Result<Vec<TelemetrySample>, ServiceError> {
        let limit = if (1..=MAX_LATEST_LIMIT).contains(&limit) {
            limit as u32
        } else {
            DEFAULT_LATEST_LIMIT
        };

        let key = telemetry_latest_key();
        if let Some(mut samples) = cache_lookup::<C, Vec<TelemetrySample>>(&self.cache, &key).await
        {
            if samples.len() >= limit as usize {
                newest_first(&mut samples);
                samples.truncate(limit as usize);
                return Ok(samples);
            }
        }

        let samples = self.repository.get_latest_samples(limit).await?;
        if !samples.is_empty() {
            cache_store(&*self.cache, &key, &samples, self.lock.ttl()).await;
        }
        Ok(samples)
    }

    /// Returns samples recorded within a window, newest first.
    ///
    /// A missing end defaults to the next whole minute and a missing start to
    /// 24 hours before the end. Windows longer than 30 days are shortened from
    /// the start.
    pub async fn get_history(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TelemetrySample>, ServiceError> {
        let to = to.unwrap_or_else(next_minute);
        let from = from.unwrap_or(to - default_history_span());
        let range = TimeRange::new(from, to)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?
            .clamp_span(max_history_span());

        let key = telemetry_history_key(range.from, range.to);
        if let Some(samples) = cache_lookup::<C, Vec<TelemetrySample>>(&self.cache, &key).await {
            if !samples.is_empty() {
                return Ok(samples);
            }
        }

        let samples = self.repository.get_samples_in_range(range).await?;
        if !samples.is_empty() {
            cache_store(&*self.cache, &key, &samples, HISTORY_TTL).await;
        }
        Ok(samples)
    }

    pub async fn get_stats(&self, range: TimeRange) -> Result<TelemetryStats, ServiceError> {
        Ok(self.repository.get_stats(range).await?)
    }

    /// Deletes samples older than `retention`. Returns the number removed.
    pub async fn sweep(&self, retention: chrono::Duration) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - retention;
        let removed = self.repository.delete_samples_before(cutoff).await?;
        if removed > 0 {
            tracing::info!(domain = TELEMETRY_DOMAIN, removed, cutoff = %cutoff, "Swept old telemetry");
        }
        Ok(removed)
    }
}

fn newest_first(samples: &mut [TelemetrySample]) {
    samples.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
}

/// Open-ended windows end here so repeated reads within a minute share a cache key.
fn next_minute() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(chrono::Duration::minutes(1))
        .unwrap_or(now)
        + chrono::Duration::minutes(1)
}

#[async_trait]
impl<R, C> Synchronizer for TelemetrySync<R, C>
where
    R: TelemetryRepository + 'static,
    C: Cache + 'static,
{
    fn domain(&self) -> &str {
        TELEMETRY_DOMAIN
    }

    async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(true).await
    }

    async fn force_sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(false).await?.into_result()
    }
}
