//! Redis cache backend implementation.
//!
//! Provides a shared cache using Redis. Supports connection management,
//! TTL and pattern-based deletion.

mod cache;
mod error;

pub use cache::RedisCache;
