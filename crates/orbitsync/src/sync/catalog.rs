//! NASA OSDR catalog synchronization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use orbitsync_core::cache::{catalog_list_key, catalog_list_pattern, Cache};
use orbitsync_core::domain::{CatalogItem, ItemsPath, CATALOG_FIELDS};
use orbitsync_core::source::Source;
use orbitsync_core::storage::{CatalogRepository, PageRequest};
use orbitsync_core::sync::{with_deadline, ServiceError, SyncError, SyncOutcome, Synchronizer};

use super::{cache_lookup, cache_store, FetchLock};

pub const CATALOG_DOMAIN: &str = "nasa:osdr";

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);
pub const DEFAULT_ITEMS_PATH: &str = "items";
const LIST_TTL: Duration = Duration::from_secs(300);
const DEFAULT_SEARCH_LIMIT: u32 = 10;
const MAX_SEARCH_LIMIT: i64 = 50;

/// Ingests the dataset catalog and serves catalog reads.
///
/// The upstream document must carry its items at the configured
/// [`ItemsPath`]. A document that does not match fails the invocation with
/// [`SyncError::Schema`] and leaves the fetch lock unset.
pub struct CatalogSync<R, C>
where
    R: CatalogRepository,
    C: Cache,
{
    source: Arc<dyn Source>,
    repository: Arc<R>,
    cache: Arc<C>,
    lock: FetchLock<C>,
    items_path: ItemsPath,
    deadline: Duration,
}

impl<R, C> CatalogSync<R, C>
where
    R: CatalogRepository,
    C: Cache,
{
    pub fn new(source: Arc<dyn Source>, repository: Arc<R>, cache: Arc<C>) -> Self {
        let lock = FetchLock::new(cache.clone(), CATALOG_DOMAIN, DEFAULT_INTERVAL);
        Self {
            source,
            repository,
            cache,
            lock,
            items_path: ItemsPath::new(DEFAULT_ITEMS_PATH),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.lock = FetchLock::new(self.cache.clone(), CATALOG_DOMAIN, interval);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_items_path(mut self, items_path: ItemsPath) -> Self {
        self.items_path = items_path;
        self
    }

    async fn run(&self, honor_lock: bool) -> Result<SyncOutcome, SyncError> {
        if honor_lock && self.lock.is_held().await {
            tracing::debug!(domain = CATALOG_DOMAIN, "Fetch lock held, skipping");
            return Ok(SyncOutcome::Locked);
        }
        with_deadline(self.deadline, self.fetch_and_store()).await
    }

    async fn fetch_and_store(&self) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let document = self.source.fetch().await?;
        let items: Vec<CatalogItem> = self
            .items_path
            .resolve(&document)?
            .into_iter()
            .map(|doc| CATALOG_FIELDS.to_item(doc))
            .collect();
        let fetched = items.len();

        let outcome = match self.repository.upsert_items(&items).await {
            Ok(summary) => {
                tracing::info!(
                    domain = CATALOG_DOMAIN,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "Catalog synced"
                );
                SyncOutcome::Completed {
                    fetched,
                    persisted: summary.written(),
                }
            }
            Err(error) => {
                tracing::error!(domain = CATALOG_DOMAIN, error = %error, "Failed to upsert catalog batch");
                SyncOutcome::PersistFailed { fetched, error }
            }
        };

        if let Err(err) = self.cache.delete_pattern(&catalog_list_pattern()).await {
            tracing::warn!(domain = CATALOG_DOMAIN, error = %err, "Failed to invalidate catalog pages");
        }
        self.lock.acquire(started).await;

        Ok(outcome)
    }

    /// Returns one page of the catalog, most recently updated first.
    pub async fn get_list(&self, page: PageRequest) -> Result<Vec<CatalogItem>, ServiceError> {
        let key = catalog_list_key(page.page, page.limit);
        if let Some(items) = cache_lookup::<C, Vec<CatalogItem>>(&self.cache, &key).await {
            if !items.is_empty() {
                return Ok(items);
            }
        }

        let items = self.repository.list_items(page).await?;
        if !items.is_empty() {
            cache_store(&*self.cache, &key, &items, LIST_TTL).await;
        }
        Ok(items)
    }

    /// Returns the most recently updated item.
    pub async fn get_latest(&self) -> Result<Option<CatalogItem>, ServiceError> {
        Ok(self
            .get_list(PageRequest::new(1, 1))
            .await?
            .into_iter()
            .next())
    }

    pub async fn get_by_dataset_id(
        &self,
        dataset_id: &str,
    ) -> Result<Option<CatalogItem>, ServiceError> {
        if dataset_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "dataset id must not be empty".to_string(),
            ));
        }
        Ok(self.repository.get_item_by_dataset_id(dataset_id).await?)
    }

    /// Searches titles and dataset ids. Limits outside 1..=50 use 10.
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<CatalogItem>, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "search query must not be empty".to_string(),
            ));
        }
        let limit = if (1..=MAX_SEARCH_LIMIT).contains(&limit) {
            limit as u32
        } else {
            DEFAULT_SEARCH_LIMIT
        };
        Ok(self.repository.search_items(query, limit).await?)
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(self.repository.count_items().await?)
    }
}

#[async_trait]
impl<R, C> Synchronizer for CatalogSync<R, C>
where
    R: CatalogRepository + 'static,
    C: Cache + 'static,
{
    fn domain(&self) -> &str {
        CATALOG_DOMAIN
    }

    async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(true).await
    }

    async fn force_sync(&self) -> Result<SyncOutcome, SyncError> {
        self.run(false).await?.into_result()
    }
}
