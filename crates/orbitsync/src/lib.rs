//! orbitsync - scheduled synchronization of space data feeds.
//!
//! Workers periodically pull upstream documents, persist them in the
//! configured repository and keep a cache-aside copy for the read path.

pub mod cache;
pub mod config;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod sync;
pub mod worker;
