//! Cache backend implementations.
//!
//! This module provides concrete implementations of the cache traits
//! defined in `orbitsync_core::cache`. The implementations are selected
//! at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `memory` (default): In-memory LRU cache
//! - `redis`: Redis cache using the redis crate
//!
//! These features are mutually exclusive - only one cache backend can be
//! enabled at a time.

// Compile-time checks for mutual exclusivity
#[cfg(all(feature = "memory", feature = "redis"))]
compile_error!(
    "Features 'memory' and 'redis' are mutually exclusive. \
    Enable only one cache backend at a time."
);

#[cfg(not(any(feature = "memory", feature = "redis")))]
compile_error!(
    "No cache backend selected. Enable 'memory' or 'redis' feature. \
    Example: cargo build -p orbitsync --no-default-features --features sqlite,redis"
);

// The memory cache backs the service tests regardless of the selected backend.
#[cfg(any(feature = "memory", test))]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

#[cfg(any(feature = "memory", test))]
pub use memory::MemoryCache;

#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
