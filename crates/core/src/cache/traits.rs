use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::serialization::{from_bytes, to_bytes};
use super::{CacheError, Result};

/// Trait for basic cache operations.
///
/// A missing key is never an error: `get` returns `Ok(None)` and `exists`
/// returns `Ok(false)`. Failures are reserved for an unreachable or
/// misbehaving store.
///
/// TTL policy: `None` stores the value without expiration, and a zero
/// duration is rejected with [`CacheError::InvalidTtl`] by every backend.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns true if a live (non-expired) value is stored under the key.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Atomically increments an integer counter and returns the new value.
    ///
    /// A missing key starts at zero and is stored without expiration. An
    /// existing key keeps its remaining TTL.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Deletes all values matching a pattern (e.g., "nasa:osdr:list:*").
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;
}

/// Typed helpers layered over any [`Cache`].
///
/// Values are stored as JSON so they stay readable from `redis-cli`.
#[async_trait]
pub trait CacheExt: Cache {
    /// Gets and deserializes a structured value.
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(bytes) => from_bytes(&bytes)
                .map(Some)
                .map_err(|e| CacheError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Serializes and stores a structured value.
    async fn set_json<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let bytes = to_bytes(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set(key, &bytes, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Validates a TTL against the cache-wide policy.
pub fn validate_ttl(key: &str, ttl: Option<Duration>) -> Result<Option<Duration>> {
    match ttl {
        Some(d) if d.is_zero() => Err(CacheError::InvalidTtl(format!(
            "zero duration for key {}",
            key
        ))),
        other => Ok(other),
    }
}
