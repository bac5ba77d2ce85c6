mod error;
mod keys;
mod patterns;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{
    astro_events_key, catalog_list_key, catalog_list_pattern, feed_domain, feed_items_key, feed_items_pattern,
    feed_latest_key, fetch_lock_key, is_fetch_lock_key, position_history_key, position_latest_key,
    position_trend_key, telemetry_history_key, telemetry_latest_key, FETCH_LOCK_SUFFIX,
};
pub use patterns::pattern_matches;
pub use serialization::{from_bytes, to_bytes, SerializationError};
pub use traits::{validate_ttl, Cache, CacheExt};
