//! Synchronization services, one per data domain.
//!
//! Every service follows the same invocation:
//! check lock, fetch, transform, persist, refresh cache, set lock.
//! Reads are cache-aside over the repository and never call upstream. The
//! astronomy events view is the exception: it has no repository and reads
//! through to its upstream on a cache miss.

pub mod astro;
pub mod catalog;
pub mod feed;
mod lock;
pub mod position;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use orbitsync_core::cache::{Cache, CacheExt};

pub use astro::{AstroService, ASTRO_DOMAIN};
pub use catalog::{CatalogSync, CATALOG_DOMAIN};
pub use feed::{FeedChannel, FeedSync, FEED_DOMAIN};
pub use lock::FetchLock;
pub use position::{PositionSync, POSITION_DOMAIN};
pub use telemetry::{TelemetrySync, TELEMETRY_DOMAIN};

/// Reads a cached value. Cache failures and undecodable values count as a miss.
pub(crate) async fn cache_lookup<C, T>(cache: &C, key: &str) -> Option<T>
where
    C: Cache,
    T: DeserializeOwned + Send,
{
    match cache.get_json::<T>(key).await {
        Ok(value) => {
            tracing::trace!(key, hit = value.is_some(), "Cache lookup");
            value
        }
        Err(err) => {
            tracing::warn!(key, error = %err, "Cache read failed, falling back to repository");
            None
        }
    }
}

/// Writes a value to the cache. Failures are logged and otherwise ignored.
pub(crate) async fn cache_store<C, T>(cache: &C, key: &str, value: &T, ttl: Duration)
where
    C: Cache,
    T: Serialize + Sync,
{
    if let Err(err) = cache.set_json(key, value, Some(ttl)).await {
        tracing::warn!(key, error = %err, "Failed to populate cache");
    }
}
