use chrono::{DateTime, Utc};

/// Suffix shared by every fetch lock key.
pub const FETCH_LOCK_SUFFIX: &str = ":last_fetch";

/// Returns the fetch lock key for a synchronization domain.
pub fn fetch_lock_key(domain: &str) -> String {
    format!("{}{}", domain, FETCH_LOCK_SUFFIX)
}

/// Returns true for keys produced by [`fetch_lock_key`].
pub fn is_fetch_lock_key(key: &str) -> bool {
    key.len() > FETCH_LOCK_SUFFIX.len() && key.ends_with(FETCH_LOCK_SUFFIX)
}

/// Returns the cache key for the most recent ISS position.
pub fn position_latest_key() -> String {
    "iss:last_position".to_string()
}

/// Returns the cache key for a trend computed over `limit` samples.
pub fn position_trend_key(limit: u32) -> String {
    format!("iss:trend:{}", limit)
}

/// Returns the cache key for positions recorded within a time window.
pub fn position_history_key(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    format!("iss:history:{}:{}", from.timestamp(), to.timestamp())
}

/// Returns the cache key for one page of the catalog listing.
pub fn catalog_list_key(page: u32, limit: u32) -> String {
    format!("nasa:osdr:list:{}:{}", page, limit)
}

/// Returns the pattern matching every cached catalog page.
pub fn catalog_list_pattern() -> String {
    "nasa:osdr:list:*".to_string()
}

/// Returns the lock domain for a feed channel.
pub fn feed_domain(channel: &str) -> String {
    format!("feed:{}", channel)
}

/// Returns the cache key for the latest document of a feed channel.
pub fn feed_latest_key(channel: &str) -> String {
    format!("feed:{}:latest", channel)
}

/// Returns the cache key for a page of items extracted from a feed channel.
pub fn feed_items_key(channel: &str, page: u32, limit: u32) -> String {
    format!("feed:{}:items:{}:{}", channel, page, limit)
}

/// Returns the pattern matching every cached item page of a feed channel.
pub fn feed_items_pattern(channel: &str) -> String {
    format!("feed:{}:items:*", channel)
}

/// Returns the cache key for the latest telemetry batch.
pub fn telemetry_latest_key() -> String {
    "telemetry:latest".to_string()
}

/// Returns the cache key for telemetry recorded within a time window.
pub fn telemetry_history_key(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    format!("telemetry:history:{}:{}", from.timestamp(), to.timestamp())
}

/// Returns the cache key for astronomy events seen from a location.
///
/// Coordinates are rounded to four decimals, roughly 11 m.
pub fn astro_events_key(latitude: f64, longitude: f64, days: u32) -> String {
    format!("astro:events:{:.4}:{:.4}:{}", latitude, longitude, days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fetch_lock_key() {
        assert_eq!(fetch_lock_key("iss"), "iss:last_fetch");
        assert_eq!(fetch_lock_key("nasa:osdr"), "nasa:osdr:last_fetch");
        assert_eq!(fetch_lock_key(&feed_domain("apod")), "feed:apod:last_fetch");
    }

    #[test]
    fn test_is_fetch_lock_key() {
        assert!(is_fetch_lock_key(&fetch_lock_key("iss")));
        assert!(is_fetch_lock_key(&fetch_lock_key(&feed_domain("jwst"))));
        assert!(!is_fetch_lock_key("iss:last_position"));
        assert!(!is_fetch_lock_key(":last_fetch"));
    }

    #[test]
    fn test_position_keys() {
        assert_eq!(position_latest_key(), "iss:last_position");
        assert_eq!(position_trend_key(240), "iss:trend:240");
    }

    #[test]
    fn test_history_keys_use_unix_seconds() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            position_history_key(from, to),
            "iss:history:1704067200:1704153600"
        );
        assert_eq!(
            telemetry_history_key(from, to),
            "telemetry:history:1704067200:1704153600"
        );
    }

    #[test]
    fn test_catalog_list_key_matches_pattern() {
        let key = catalog_list_key(2, 50);
        assert_eq!(key, "nasa:osdr:list:2:50");
        assert!(crate::cache::pattern_matches(&catalog_list_pattern(), &key));
    }

    #[test]
    fn test_feed_keys() {
        assert_eq!(feed_latest_key("jwst"), "feed:jwst:latest");
        assert_eq!(feed_items_key("jwst", 1, 24), "feed:jwst:items:1:24");
        assert!(crate::cache::pattern_matches(
            &feed_items_pattern("jwst"),
            &feed_items_key("jwst", 3, 12)
        ));
        assert!(!crate::cache::pattern_matches(
            &feed_items_pattern("jwst"),
            &feed_latest_key("jwst")
        ));
    }

    #[test]
    fn test_telemetry_latest_key() {
        assert_eq!(telemetry_latest_key(), "telemetry:latest");
    }

    #[test]
    fn test_astro_events_key_rounds_coordinates() {
        assert_eq!(
            astro_events_key(55.755_812, 37.617_634, 7),
            "astro:events:55.7558:37.6176:7"
        );
        assert_eq!(
            astro_events_key(-33.9, 151.2, 30),
            "astro:events:-33.9000:151.2000:30"
        );
    }
}
