//! In-memory storage backend.
//!
//! Implements every repository trait over collections wrapped in
//! `Arc<RwLock<_>>`. Used by the `inmemory` feature and by the service tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use orbitsync::storage::inmemory::InMemoryRepository;
//!
//! let repo = InMemoryRepository::new();
//! ```

mod repository;

pub use repository::InMemoryRepository;
