//! orbitsync_sources - Upstream API clients for orbitsync.
//!
//! Each client is exposed as an `orbitsync_core::source::Source` returning the
//! raw JSON document. No payload interpretation happens here.

pub mod client;
pub mod error;
pub mod telemetry;

pub use client::{AstroSource, HttpSource, IssSource, JwstSource, NeoFeedSource};
pub use error::{ClientError, Result};
pub use telemetry::SyntheticTelemetrySource;
