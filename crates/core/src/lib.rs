//! orbitsync_core - Core types and pure logic for orbitsync.
//!
//! This crate holds everything the synchronization services share that does
//! not perform I/O: the domain records, the cache and repository contracts,
//! field extraction and trend math. Backends and services live in the
//! `orbitsync` crate.

pub mod cache;
pub mod domain;
pub mod source;
pub mod storage;
pub mod sync;
