//! Application state: storage and cache backends wired into the
//! synchronization services.
//!
//! Backends are chosen at compile time through feature flags, the same way
//! the `storage` and `cache` modules select their implementations. Services
//! are built from [`Config`]; a missing credential disables only the
//! dependent domain or feed channel.

use std::sync::Arc;
use std::time::Duration;

use orbitsync_core::cache::Cache;
use orbitsync_core::domain::ItemsPath;
use orbitsync_core::source::{Source, TelemetrySource};
use orbitsync_core::storage::{
    CatalogRepository, ObservationRepository, PositionRepository, TelemetryRepository,
};
use orbitsync_core::sync::{SyncError, SyncOutcome, Synchronizer};
use orbitsync_sources::client::astro::AstroSource;
use orbitsync_sources::client::iss::IssSource;
use orbitsync_sources::client::jwst::{JwstSource, DEFAULT_JWST_PATH};
use orbitsync_sources::client::nasa::{self, NeoFeedSource, MAX_NEO_DAYS};
use orbitsync_sources::telemetry::SyntheticTelemetrySource;

use crate::config::{Config, WorkerSettings};
use crate::scheduler::{Scheduler, SchedulerError};
use crate::sync::feed::{
    APOD_CHANNEL, APOD_INTERVAL, JWST_CHANNEL, JWST_INTERVAL, NEO_CHANNEL, NEO_INTERVAL,
};
use crate::sync::{
    AstroService, CatalogSync, FeedChannel, FeedSync, PositionSync, TelemetrySync,
};
use crate::worker::{Worker, WorkerConfig};

/// JWST listing page fetched on each tick.
const JWST_PAGE_SIZE: u32 = 24;

#[cfg(feature = "sqlite")]
pub type Repository = crate::storage::SqliteRepository;

#[cfg(feature = "inmemory")]
pub type Repository = crate::storage::InMemoryRepository;

#[cfg(feature = "memory")]
pub type CacheBackend = crate::cache::MemoryCache;

#[cfg(feature = "redis")]
pub type CacheBackend = crate::cache::RedisCache;

#[derive(Debug, Clone, Copy)]
struct Schedules {
    iss: WorkerSettings,
    nasa: WorkerSettings,
    feed: WorkerSettings,
    telemetry: WorkerSettings,
}

/// The enabled synchronization services.
///
/// A `None` service is disabled by configuration.
pub struct AppState<R = Repository, C = CacheBackend>
where
    R: PositionRepository + CatalogRepository + TelemetryRepository + ObservationRepository,
    C: Cache,
{
    pub position: Option<Arc<PositionSync<R, C>>>,
    pub catalog: Option<Arc<CatalogSync<R, C>>>,
    pub feed: Option<Arc<FeedSync<R, C>>>,
    pub telemetry: Option<Arc<TelemetrySync<R, C>>>,
    /// Read-through astronomy events; not scheduled.
    pub astro: Option<Arc<AstroService<C>>>,
    schedules: Schedules,
    shutdown_timeout: Duration,
}

impl AppState {
    /// Opens the configured backends and builds every enabled service.
    pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let repository = Arc::new(open_repository(config).await?);
        let cache = Arc::new(open_cache(config).await?);
        Ok(Self::build(config, repository, cache))
    }
}

#[cfg(feature = "sqlite")]
async fn open_repository(config: &Config) -> Result<Repository, anyhow::Error> {
    tracing::info!(path = %config.sqlite_path, "Opening SQLite repository");
    Ok(crate::storage::SqliteRepository::new(&config.sqlite_path).await?)
}

#[cfg(feature = "inmemory")]
async fn open_repository(_config: &Config) -> Result<Repository, anyhow::Error> {
    tracing::info!("Using in-memory repository");
    Ok(crate::storage::InMemoryRepository::new())
}

#[cfg(feature = "memory")]
async fn open_cache(config: &Config) -> Result<CacheBackend, anyhow::Error> {
    tracing::info!(max_entries = config.cache_max_entries, "Using in-memory cache");
    Ok(crate::cache::MemoryCache::new(config.cache_max_entries))
}

#[cfg(feature = "redis")]
async fn open_cache(config: &Config) -> Result<CacheBackend, anyhow::Error> {
    tracing::info!(url = %config.redis_url, "Connecting to Redis cache");
    Ok(crate::cache::RedisCache::new(&config.redis_url).await?)
}

impl<R, C> AppState<R, C>
where
    R: PositionRepository
        + CatalogRepository
        + TelemetryRepository
        + ObservationRepository
        + 'static,
    C: Cache + 'static,
{
    /// Builds the services enabled in `config` over the given backends.
    pub fn build(config: &Config, repository: Arc<R>, cache: Arc<C>) -> Self {
        let position = config
            .iss
            .enabled
            .then(|| build_position(config, &repository, &cache))
            .flatten();
        let catalog = config
            .nasa
            .enabled
            .then(|| build_catalog(config, &repository, &cache))
            .flatten();
        let feed = config
            .feed
            .enabled
            .then(|| build_feed(config, &repository, &cache))
            .flatten();
        let telemetry = config
            .telemetry
            .enabled
            .then(|| build_telemetry(config, &repository, &cache));
        let astro = build_astro(config, &cache);

        Self {
            position,
            catalog,
            feed,
            telemetry,
            astro,
            schedules: Schedules {
                iss: config.iss,
                nasa: config.nasa,
                feed: config.feed,
                telemetry: config.telemetry,
            },
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Every enabled service paired with its worker schedule.
    pub fn synchronizers(&self) -> Vec<(Arc<dyn Synchronizer>, WorkerSettings)> {
        let mut services: Vec<(Arc<dyn Synchronizer>, WorkerSettings)> = Vec::new();
        if let Some(service) = &self.position {
            services.push((service.clone(), self.schedules.iss));
        }
        if let Some(service) = &self.catalog {
            services.push((service.clone(), self.schedules.nasa));
        }
        if let Some(service) = &self.feed {
            services.push((service.clone(), self.schedules.feed));
        }
        if let Some(service) = &self.telemetry {
            services.push((service.clone(), self.schedules.telemetry));
        }
        services
    }

    /// Domains of the enabled services, in start order.
    pub fn enabled(&self) -> Vec<String> {
        self.synchronizers()
            .iter()
            .map(|(service, _)| service.domain().to_string())
            .collect()
    }

    /// A scheduler with one worker per enabled service.
    pub fn scheduler(&self) -> Result<Scheduler, SchedulerError> {
        let scheduler = Scheduler::new(self.shutdown_timeout);
        for (service, settings) in self.synchronizers() {
            let config =
                WorkerConfig::new(settings.interval()).with_run_on_start(settings.run_on_start);
            scheduler.add_worker(Worker::new(service, config))?;
        }
        Ok(scheduler)
    }

    /// Runs one lock-bypassing sync of every enabled service, in order.
    pub async fn sync_once(&self) -> Vec<(String, Result<SyncOutcome, SyncError>)> {
        let mut results = Vec::new();
        for (service, _) in self.synchronizers() {
            let domain = service.domain().to_string();
            let result = service.force_sync().await;
            match &result {
                Ok(outcome) => tracing::info!(domain = %domain, ?outcome, "Manual sync finished"),
                Err(err) => tracing::error!(domain = %domain, error = %err, "Manual sync failed"),
            }
            results.push((domain, result));
        }
        results
    }
}

fn build_position<R, C>(
    config: &Config,
    repository: &Arc<R>,
    cache: &Arc<C>,
) -> Option<Arc<PositionSync<R, C>>>
where
    R: PositionRepository,
    C: Cache,
{
    let source = match IssSource::new(config.iss_url.as_str()) {
        Ok(source) => source,
        Err(err) => {
            tracing::error!(error = %err, "ISS source unavailable; position sync disabled");
            return None;
        }
    };

    Some(Arc::new(
        PositionSync::new(Arc::new(source), repository.clone(), cache.clone())
            .with_interval(config.iss.interval()),
    ))
}

fn build_catalog<R, C>(
    config: &Config,
    repository: &Arc<R>,
    cache: &Arc<C>,
) -> Option<Arc<CatalogSync<R, C>>>
where
    R: CatalogRepository,
    C: Cache,
{
    // OSDR answers without a key; one is sent when configured.
    let api_key = config.nasa_api_key.as_deref().unwrap_or_default();
    let source = match nasa::osdr(config.nasa_osdr_url.as_str(), api_key) {
        Ok(source) => source,
        Err(err) => {
            tracing::error!(error = %err, "OSDR source unavailable; catalog sync disabled");
            return None;
        }
    };

    Some(Arc::new(
        CatalogSync::new(Arc::new(source), repository.clone(), cache.clone())
            .with_items_path(ItemsPath::new(&config.nasa_osdr_items_path)),
    ))
}

fn build_feed<R, C>(
    config: &Config,
    repository: &Arc<R>,
    cache: &Arc<C>,
) -> Option<Arc<FeedSync<R, C>>>
where
    R: ObservationRepository,
    C: Cache,
{
    let mut feed = FeedSync::new(repository.clone(), cache.clone());

    for channel in [apod_channel(config), neo_channel(config), jwst_channel(config)] {
        match channel {
            Ok(channel) => feed = feed.with_channel(channel),
            Err(err) => tracing::error!(error = %err, "Feed channel disabled"),
        }
    }

    if feed.channel_names().is_empty() {
        tracing::warn!("No feed channel is configured; feed sync disabled");
        return None;
    }
    Some(Arc::new(feed))
}

fn apod_channel(config: &Config) -> Result<FeedChannel, anyhow::Error> {
    let api_key = config.require_nasa_api_key("feed channel apod")?;
    let source: Arc<dyn Source> = Arc::new(nasa::apod(config.nasa_apod_url.as_str(), api_key)?);
    Ok(FeedChannel::new(APOD_CHANNEL, source, APOD_INTERVAL))
}

fn neo_channel(config: &Config) -> Result<FeedChannel, anyhow::Error> {
    let api_key = config.require_nasa_api_key("feed channel neo")?;
    let source: Arc<dyn Source> = Arc::new(NeoFeedSource::new(
        config.nasa_neo_url.as_str(),
        api_key,
        MAX_NEO_DAYS,
    )?);
    Ok(FeedChannel::new(NEO_CHANNEL, source, NEO_INTERVAL))
}

fn jwst_channel(config: &Config) -> Result<FeedChannel, anyhow::Error> {
    let api_key = config.require_jwst_api_key()?;
    let mut source = JwstSource::new(
        &config.jwst_host,
        DEFAULT_JWST_PATH,
        api_key,
        1,
        JWST_PAGE_SIZE,
    )?;
    if let Some(email) = &config.jwst_email {
        source = source.with_email(email)?;
    }
    let source: Arc<dyn Source> = Arc::new(source);
    Ok(FeedChannel::new(JWST_CHANNEL, source, JWST_INTERVAL)
        .with_items_path(ItemsPath::new(&config.jwst_items_path)))
}

fn build_telemetry<R, C>(
    config: &Config,
    repository: &Arc<R>,
    cache: &Arc<C>,
) -> Arc<TelemetrySync<R, C>>
where
    R: TelemetryRepository,
    C: Cache,
{
    let source: Arc<dyn TelemetrySource> =
        Arc::new(SyntheticTelemetrySource::new(config.telemetry_batch_size));
    let mut service = TelemetrySync::new(source, repository.clone(), cache.clone())
        .with_interval(config.telemetry.interval());
    if let Some(retention) = config.telemetry_retention() {
        service = service.with_retention(retention);
    }
    Arc::new(service)
}

fn build_astro<C: Cache>(config: &Config, cache: &Arc<C>) -> Option<Arc<AstroService<C>>> {
    let source = config
        .require_astro_credentials()
        .map_err(anyhow::Error::from)
        .and_then(|(app_id, secret)| Ok(AstroSource::new(&config.astro_url, app_id, secret)?));
    match source {
        Ok(source) => Some(Arc::new(
            AstroService::new(Arc::new(source), cache.clone())
                .with_items_path(ItemsPath::new(&config.astro_items_path)),
        )),
        Err(err) => {
            tracing::warn!(error = %err, "Astronomy events disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::storage::InMemoryRepository;

    fn settings(enabled: bool) -> WorkerSettings {
        WorkerSettings {
            enabled,
            interval_secs: 60,
            run_on_start: false,
        }
    }

    fn config() -> Config {
        Config {
            sqlite_path: ":memory:".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            cache_max_entries: 64,
            iss: settings(true),
            nasa: settings(true),
            feed: settings(true),
            telemetry: settings(true),
            iss_url: "http://127.0.0.1:9/iss".to_string(),
            nasa_api_key: None,
            nasa_osdr_url: "http://127.0.0.1:9/osdr".to_string(),
            nasa_osdr_items_path: "items".to_string(),
            nasa_apod_url: "http://127.0.0.1:9/apod".to_string(),
            nasa_neo_url: "http://127.0.0.1:9/neo".to_string(),
            jwst_host: "http://127.0.0.1:9".to_string(),
            jwst_api_key: None,
            jwst_email: None,
            jwst_items_path: "body".to_string(),
            astro_url: "http://127.0.0.1:9/api/v2".to_string(),
            astro_app_id: None,
            astro_app_secret: None,
            astro_items_path: "data.events".to_string(),
            telemetry_batch_size: 5,
            telemetry_retention_days: 30,
            shutdown_timeout_secs: 1,
        }
    }

    fn build(config: &Config) -> AppState<InMemoryRepository, MemoryCache> {
        AppState::build(
            config,
            Arc::new(InMemoryRepository::new()),
            Arc::new(MemoryCache::new(64)),
        )
    }

    #[tokio::test]
    async fn test_missing_keys_disable_only_dependent_channels() {
        let mut config = config();
        config.jwst_api_key = Some("jwst-key".to_string());

        let state = build(&config);

        assert_eq!(state.enabled(), vec!["iss", "nasa:osdr", "feed", "telemetry"]);
        let feed = state.feed.as_ref().expect("feed enabled");
        assert_eq!(feed.channel_names(), vec!["jwst"]);
    }

    #[tokio::test]
    async fn test_astro_events_need_credentials_and_are_not_scheduled() {
        let state = build(&config());
        assert!(state.astro.is_none());

        let mut config = config();
        config.astro_app_id = Some("app".to_string());
        config.astro_app_secret = Some("secret".to_string());
        let state = build(&config);

        assert!(state.astro.is_some());
        assert!(!state.enabled().iter().any(|domain| domain == "astro"));
    }

    #[tokio::test]
    async fn test_feed_without_any_key_is_disabled() {
        let state = build(&config());

        assert!(state.feed.is_none());
        assert_eq!(state.enabled(), vec!["iss", "nasa:osdr", "telemetry"]);
    }

    #[tokio::test]
    async fn test_disabled_workers_are_not_built() {
        let mut config = config();
        config.iss = settings(false);
        config.nasa = settings(false);

        let state = build(&config);

        assert!(state.position.is_none());
        assert!(state.catalog.is_none());
        assert_eq!(state.enabled(), vec!["telemetry"]);
    }

    #[tokio::test]
    async fn test_scheduler_gets_one_worker_per_service() {
        let state = build(&config());

        let scheduler = state.scheduler().expect("scheduler");
        let names: Vec<String> = scheduler
            .worker_states()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["iss", "nasa:osdr", "telemetry"]);
    }

    #[tokio::test]
    async fn test_sync_once_runs_every_enabled_service() {
        let mut config = config();
        config.iss = settings(false);
        config.nasa = settings(false);

        let state = build(&config);
        let results = state.sync_once().await;

        assert_eq!(results.len(), 1);
        let (domain, result) = &results[0];
        assert_eq!(domain, "telemetry");
        assert!(matches!(
            result,
            Ok(SyncOutcome::Completed {
                fetched: 5,
                persisted: 5
            })
        ));
    }
}
