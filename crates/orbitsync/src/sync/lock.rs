//! Fetch lock: a short-lived cache marker that rate-limits upstream calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use orbitsync_core::cache::{fetch_lock_key, Cache};

/// Marker value stored under a lock key.
const LOCK_VALUE: &[u8] = b"1";

/// Per-domain fetch lock stored in the cache as `{domain}:last_fetch`.
///
/// The lock is only ever set after a successful fetch. It expires one
/// refetch interval after the invocation started, so a worker ticking at
/// the same interval finds it gone on the next tick.
pub struct FetchLock<C: Cache> {
    cache: Arc<C>,
    key: String,
    ttl: Duration,
}

impl<C: Cache> FetchLock<C> {
    pub fn new(cache: Arc<C>, domain: &str, ttl: Duration) -> Self {
        Self {
            cache,
            key: fetch_lock_key(domain),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true while the lock is held.
    ///
    /// A cache failure reads as "not held" so an unavailable cache never
    /// blocks synchronization.
    pub async fn is_held(&self) -> bool {
        match self.cache.exists(&self.key).await {
            Ok(held) => held,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "Fetch lock check failed, assuming free");
                false
            }
        }
    }

    /// Sets the lock to expire one interval after `started`.
    ///
    /// Nothing is written if the interval has already elapsed. Failures are
    /// logged only.
    pub async fn acquire(&self, started: Instant) {
        let remaining = self.ttl.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return;
        }
        if let Err(err) = self.cache.set(&self.key, LOCK_VALUE, Some(remaining)).await {
            tracing::warn!(key = %self.key, error = %err, "Failed to set fetch lock");
        }
    }
}
