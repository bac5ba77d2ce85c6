//! Storage backend implementations.
//!
//! This module provides concrete implementations of the repository traits
//! defined in `orbitsync_core::storage`. The backend used by the binary is
//! selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `sqlite` (default): SQLite storage backend using `rusqlite` and `tokio-rusqlite`
//! - `inmemory`: volatile storage, always compiled for tests
//!
//! # Examples
//!
//! Build with in-memory storage:
//! ```bash
//! cargo build -p orbitsync --no-default-features --features inmemory,memory
//! ```

#[cfg(all(feature = "sqlite", feature = "inmemory"))]
compile_error!(
    "Features 'sqlite' and 'inmemory' are mutually exclusive. \
    Enable only one storage backend at a time."
);

#[cfg(not(any(feature = "sqlite", feature = "inmemory")))]
compile_error!(
    "No storage backend selected. Enable 'sqlite' or 'inmemory' feature. \
    Example: cargo build -p orbitsync --features sqlite"
);

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod inmemory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;

pub use inmemory::InMemoryRepository;
