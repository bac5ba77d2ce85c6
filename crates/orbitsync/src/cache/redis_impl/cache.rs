//! Redis cache implementation.
//!
//! `delete_pattern` walks the keyspace with `SCAN MATCH` and deletes what it
//! finds. The walk is not atomic: keys written during the scan may survive,
//! which is acceptable for a disposable projection.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;

use orbitsync_core::cache::{validate_ttl, Cache, Result};

use super::error::map_redis_error;

/// Redis cache backend using connection manager for reconnection.
#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Creates a new Redis cache connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }
}

/// Milliseconds for `PSETEX`, rounded up so sub-millisecond TTLs still expire.
fn ttl_millis(ttl: Duration) -> u64 {
    let millis = ttl.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let ttl = validate_ttl(key, ttl)?;
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => conn
                .pset_ex::<_, _, ()>(key, value, ttl_millis(duration))
                .await
                .map_err(map_redis_error),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(map_redis_error),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(map_redis_error)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(map_redis_error)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1i64).await.map_err(map_redis_error)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let keys: Vec<String> = {
            let mut conn = self.conn.clone();
            let iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(map_redis_error)?;
            iter.collect().await
        };

        if keys.is_empty() {
            return Ok(());
        }

        tracing::debug!(pattern, count = keys.len(), "Deleting cache keys by pattern");
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys).await.map_err(map_redis_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitsync_core::cache::{CacheError, CacheExt};
    use uuid::Uuid;

    /// Helper to get Redis URL from environment.
    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    /// Skip test if Redis not available.
    async fn get_test_cache() -> Option<RedisCache> {
        RedisCache::new(&redis_url()).await.ok()
    }

    /// Generate a unique test key to avoid conflicts.
    fn test_key(suffix: &str) -> String {
        format!("test:redis_cache:{}:{}", Uuid::new_v4(), suffix)
    }

    #[test]
    fn test_ttl_millis_rounds_up() {
        assert_eq!(ttl_millis(Duration::from_micros(1)), 1);
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(ttl_millis(Duration::from_secs(120)), 120_000);
    }

    #[tokio::test]
    async fn test_redis_set_and_get() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("set_get");
        cache.set(&key, b"hello world", None).await.unwrap();

        assert_eq!(cache.get(&key).await.unwrap(), Some(b"hello world".to_vec()));
        assert!(cache.exists(&key).await.unwrap());

        cache.delete(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(!cache.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_ttl() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("ttl");
        cache
            .set(&key, b"1", Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(cache.exists(&key).await.unwrap());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!cache.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_zero_ttl_is_rejected() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let result = cache.set(&test_key("zero"), b"v", Some(Duration::ZERO)).await;
        assert!(matches!(result, Err(CacheError::InvalidTtl(_))));
    }

    #[tokio::test]
    async fn test_redis_increment() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("counter");
        assert_eq!(cache.increment(&key).await.unwrap(), 1);
        assert_eq!(cache.increment(&key).await.unwrap(), 2);
        cache.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_delete_pattern() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let prefix = test_key("pattern");
        let a = format!("{}:list:1:20", prefix);
        let b = format!("{}:list:2:20", prefix);
        let keep = format!("{}:last_fetch", prefix);
        for key in [&a, &b, &keep] {
            cache.set(key, b"x", None).await.unwrap();
        }

        cache
            .delete_pattern(&format!("{}:list:*", prefix))
            .await
            .unwrap();

        assert!(!cache.exists(&a).await.unwrap());
        assert!(!cache.exists(&b).await.unwrap());
        assert!(cache.exists(&keep).await.unwrap());
        cache.delete(&keep).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_json_helpers() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("json");
        cache
            .set_json(&key, &vec!["a".to_string()], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        let value: Option<Vec<String>> = cache.get_json(&key).await.unwrap();
        assert_eq!(value, Some(vec!["a".to_string()]));
        cache.delete(&key).await.unwrap();
    }
}
