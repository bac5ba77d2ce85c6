//! Glob matching for cache keys.
//!
//! Only `*` is special: it matches any run of characters, including none.
//! This is the subset both backends agree on, so the memory cache and
//! Redis `SCAN MATCH` invalidate the same keys.

/// Checks if a cache key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use orbitsync_core::cache::pattern_matches;
///
/// assert!(pattern_matches("iss:last_position", "iss:last_position"));
/// assert!(pattern_matches("nasa:osdr:list:*", "nasa:osdr:list:1:20"));
/// assert!(pattern_matches("feed:*:items:*", "feed:jwst:items:2:24"));
/// assert!(!pattern_matches("nasa:osdr:list:*", "iss:trend:240"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();

    let Some(mut remaining) = key.strip_prefix(first) else {
        return false;
    };

    let rest: Vec<&str> = parts.collect();
    let Some((last, middle)) = rest.split_last() else {
        // No wildcard at all
        return remaining.is_empty();
    };

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match remaining.find(segment) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last)
}
