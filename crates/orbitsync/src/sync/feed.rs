//! Feed synchronization: APOD, NEO and JWST documents.
//!
//! Each channel owns its own fetch lock and interval. A tick visits every
//! channel whose lock has expired; one failing channel never blocks the rest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::time::Instant;

use orbitsync_core::cache::{feed_domain, feed_items_key, feed_items_pattern, feed_latest_key, Cache};
use orbitsync_core::domain::{FeedImage, ItemsPath, Observation, FEED_IMAGE_FIELDS};
use orbitsync_core::source::Source;
use orbitsync_core::storage::{ObservationRepository, PageRequest, TimeRange};
use orbitsync_core::sync::{with_deadline, ServiceError, SyncError, SyncOutcome, Synchronizer};

use super::{cache_lookup, cache_store, FetchLock};

pub const FEED_DOMAIN: &str = "feed";

pub const APOD_CHANNEL: &str = "apod";
pub const NEO_CHANNEL: &str = "neo";
pub const JWST_CHANNEL: &str = "jwst";

pub const APOD_INTERVAL: Duration = Duration::from_secs(24 * 3600);
pub const NEO_INTERVAL: Duration = Duration::from_secs(2 * 3600);
pub const JWST_INTERVAL: Duration = Duration::from_secs(6 * 3600);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);
pub const DEFAULT_JWST_ITEMS_PATH: &str = "body";
const ITEMS_TTL: Duration = Duration::from_secs(15 * 60);

/// One upstream feed and its refetch policy.
pub struct FeedChannel {
    name: String,
    source: Arc<dyn Source>,
    interval: Duration,
    items_path: Option<ItemsPath>,
}

impl FeedChannel {
    pub fn new(name: impl Into<String>, source: Arc<dyn Source>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            source,
            interval,
            items_path: None,
        }
    }

    /// Declares where image entries live in this channel's documents.
    ///
    /// Channels without a declared path do not serve `get_items`.
    pub fn with_items_path(mut self, items_path: ItemsPath) -> Self {
        self.items_path = Some(items_path);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

struct ChannelState<C: Cache> {
    channel: FeedChannel,
    lock: FetchLock<C>,
}

enum ChannelResult {
    Persisted,
    PersistFailed(orbitsync_core::storage::RepositoryError),
}

/// Synchronizes every configured feed channel and serves feed reads.
pub struct FeedSync<R, C>
where
    R: ObservationRepository,
    C: Cache,
{
    channels: Vec<ChannelState<C>>,
    repository: Arc<R>,
    cache: Arc<C>,
    deadline: Duration,
}

impl<R, C> FeedSync<R, C>
where
    R: ObservationRepository,
    C: Cache,
{
    pub fn new(repository: Arc<R>, cache: Arc<C>) -> Self {
        Self {
            channels: Vec::new(),
            repository,
            cache,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Registers a channel. A channel with the same name is replaced.
    pub fn with_channel(mut self, channel: FeedChannel) -> Self {
        self.channels.retain(|c| c.channel.name != channel.name);
        let lock = FetchLock::new(
            self.cache.clone(),
            &feed_domain(&channel.name),
            channel.interval,
        );
        self.channels.push(ChannelState { channel, lock });
        self
    }

    /// Sets the deadline for one invocation across every due channel.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel.name()).collect()
    }

    fn channel(&self, name: &str) -> Result<&ChannelState<C>, ServiceError> {
        self.channels
            .iter()
            .find(|c| c.channel.name == name)
            .ok_or_else(|| ServiceError::NotConfigured(name.to_string()))
    }

    async fn run(&self, honor_lock: bool) -> Result<SyncOutcome, SyncError> {
        let mut due = Vec::new();
        for state in &self.channels {
            if honor_lock && state.lock.is_held().await {
                tracing::debug!(domain = FEED_DOMAIN, channel = state.channel.name(), "Fetch lock held, skipping");
                continue;
            }
            due.push(state);
        }
        if due.is_empty() {
            return Ok(SyncOutcome::Locked);
        }

        // Due channels run side by side, so one deadline bounds the invocation.
        let results = join_all(due.into_iter().map(|state| async move {
            let result = with_deadline(self.deadline, self.sync_channel(state)).await;
            (state.channel.name(), result)
        }))
        .await;

        let mut fetched = 0;
        let mut persisted = 0;
        let mut first_persist_error = None;
        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(ChannelResult::Persisted) => {
                    fetched += 1;
                    persisted += 1;
                }
                Ok(ChannelResult::PersistFailed(error)) => {
                    fetched += 1;
                    first_persist_error.get_or_insert(error);
                }
                Err(err) => {
                    tracing::warn!(domain = FEED_DOMAIN, channel = name, error = %err, "Channel sync failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        if fetched == 0 {
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        Ok(match first_persist_error {
            Some(error) => SyncOutcome::PersistFailed { fetched, error },
            None => SyncOutcome::Completed { fetched, persisted },
        })
    }

    async fn sync_channel(&self, state: &ChannelState<C>) -> Result<ChannelResult, SyncError> {
        let channel = &state.channel;
        let started = Instant::now();
        let payload = channel.source.fetch().await?;
        let observation = Observation::new(channel.name.clone(), payload);

        let result = match self.repository.create_observation(&observation).await {
            Ok(()) => ChannelResult::Persisted,
            Err(error) => {
                tracing::error!(
                    domain = FEED_DOMAIN,
                    channel = %channel.name,
                    error = %error,
                    "Failed to persist observation"
                );
                ChannelResult::PersistFailed(error)
            }
        };

        cache_store(
            &*self.cache,
            &feed_latest_key(&channel.name),
            &observation,
            channel.interval,
        )
        .await;
        if let Err(err) = self
            .cache
            .delete_pattern(&feed_items_pattern(&channel.name))
            .await
        {
            tracing::warn!(channel = %channel.name, error = %err, "Failed to invalidate feed items");
        }
        state.lock.acquire(started).await;

        tracing::info!(domain = FEED_DOMAIN, channel = %channel.name, "Channel synced");
        Ok(result)
    }

    /// Returns the latest document of a channel.
    pub async fn get_latest(&self, channel: &str) -> Result<Option<Observation>, ServiceError> {
        let state = self.channel(channel)?;
        let key = feed_latest_key(channel);
        if let Some(observation) = cache_lookup::<C, Observation>(&self.cache, &key).await {
            return Ok(Some(observation));
        }

        let observation = self.repository.get_latest_observation(channel).await?;
        if let Some(ref o) = observation {
            cache_store(&*self.cache, &key, o, state.channel.interval).await;
        }
        Ok(observation)
    }

    /// Returns the documents of a channel fetched within a window.
    pub async fn get_history(
        &self,
        channel: &str,
        range: TimeRange,
    ) -> Result<Vec<Observation>, ServiceError> {
        self.channel(channel)?;
        Ok(self
            .repository
            .get_observations_in_range(channel, range)
            .await?)
    }

    /// Extracts one page of images from the latest document of a channel.
    pub async fn get_items(
        &self,
        channel: &str,
        page: PageRequest,
    ) -> Result<Vec<FeedImage>, ServiceError> {
        let state = self.channel(channel)?;
        let Some(items_path) = state.channel.items_path.as_ref() else {
            return Err(ServiceError::NotConfigured(format!(
                "{} has no declared items path",
                channel
            )));
        };

        let key = feed_items_key(channel, page.page, page.limit);
        if let Some(images) = cache_lookup::<C, Vec<FeedImage>>(&self.cache, &key).await {
            if !images.is_empty() {
                return Ok(images);
            }
        }

        let Some(observation) = self.get_latest(channel).await? else {
            return Ok(Vec::new());
        };

        let entries = items_path
            .resolve(&observation.payload)
            .map_err(|e| ServiceError::Degraded(e.to_string()))?;
        let images: Vec<FeedImage> = entries
            .into_iter()
            .filter_map(|doc| FEED_IMAGE_FIELDS.to_image(doc))
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();

        if !images.is_empty() {
            cache_store(&*self.cache, &key, &images, ITEMS_TTL).await;
        }
        Ok(images)
    }

    /// Deletes documents fetched before `cutoff`. Returns the number removed.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, ServiceError> {
        let removed = self.repository.delete_observations_before(cutoff).await?;
        tracing::info!(domain = FEED_DOMAIN, removed, "Purged old observations");
        Ok(removed)
    }
}

#[async_trait]
impl<R, C> Synchronizer for FeedSync<R, C>
where
    R: ObservationRepository + 'static,
    C: Cache + 'static,
{
    fn domain(&self) -> &str {
        FEED_DOMAIN
    }

    async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(true).await
    }

    async fn force_sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(false).await?.into_result()
    }
}
