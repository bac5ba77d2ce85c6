//! In-memory cache implementation with LRU eviction.
//!
//! Provides a thread-safe in-memory cache with TTL support using
//! tokio synchronization primitives and LRU eviction policy. Expiry is
//! measured on the tokio clock so paused-time tests can step past a TTL.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use orbitsync_core::cache::{
    is_fetch_lock_key, pattern_matches, validate_ttl, Cache, CacheError, Result,
};

/// A single cache entry with optional expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    /// Creates a new cache entry with optional TTL.
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    /// Returns true if this entry has expired.
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Projections live in the LRU; fetch locks live beside it so read churn
/// can never evict a lock before its TTL.
#[derive(Debug)]
struct Store {
    entries: LruCache<String, CacheEntry>,
    locks: HashMap<String, CacheEntry>,
}

impl Store {
    /// Returns the live entry for `key`, dropping it if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut CacheEntry> {
        if is_fetch_lock_key(key) {
            if self.locks.get(key).is_some_and(CacheEntry::is_expired) {
                self.locks.remove(key);
                return None;
            }
            return self.locks.get_mut(key);
        }
        if self.entries.peek(key).is_some_and(CacheEntry::is_expired) {
            self.entries.pop(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    fn put(&mut self, key: &str, entry: CacheEntry) {
        if is_fetch_lock_key(key) {
            self.locks.retain(|_, e| !e.is_expired());
            self.locks.insert(key.to_string(), entry);
        } else {
            self.entries.put(key.to_string(), entry);
        }
    }

    fn remove(&mut self, key: &str) {
        if is_fetch_lock_key(key) {
            self.locks.remove(key);
        } else {
            self.entries.pop(key);
        }
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Every operation takes the single store lock, so `increment` is atomic
/// with respect to concurrent callers. Expired entries are dropped lazily
/// when touched. Fetch lock keys are exempt from eviction.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<Mutex<Store>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache holding at most `max_entries` keys,
    /// not counting fetch locks.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(Mutex::new(Store {
                entries: LruCache::new(capacity),
                locks: HashMap::new(),
            })),
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        let store = self.store.lock().await;
        store.entries.len() + store.locks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut store = self.store.lock().await;
        Ok(store.live(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let ttl = validate_ttl(key, ttl)?;
        let mut store = self.store.lock().await;
        store.put(key, CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut store = self.store.lock().await;
        Ok(store.live(key).is_some())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut store = self.store.lock().await;

        match store.live(key) {
            Some(entry) => {
                let current: i64 = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| {
                        CacheError::OperationFailed(format!(
                            "value at {} is not an integer",
                            key
                        ))
                    })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    CacheError::OperationFailed(format!("increment overflow at {}", key))
                })?;
                entry.value = next.to_string().into_bytes();
                Ok(next)
            }
            None => {
                store.put(key, CacheEntry::new(b"1".to_vec(), None));
                Ok(1)
            }
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        let doomed: Vec<String> = store
            .entries
            .iter()
            .map(|(key, _)| key)
            .chain(store.locks.keys())
            .filter(|key| pattern_matches(pattern, key))
            .cloned()
            .collect();

        for key in &doomed {
            store.remove(key);
        }
        Ok(())
    }
}
