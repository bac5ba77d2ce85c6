//! Prioritized field lookup over loosely-typed upstream documents.
//!
//! Upstream APIs name the same logical field differently. Each lookup takes
//! an ordered list of candidate keys and returns the first usable value.
//! Lookups never fail; absent or unparseable fields fall back to an empty
//! value so one odd field never discards the whole record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Returns the first candidate holding a non-empty string.
///
/// Numbers are accepted and rendered as text, since some upstreams send
/// numeric identifiers.
pub fn first_string(doc: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| doc.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Returns the first candidate coercible to `f64`.
///
/// Accepts floating-point, integer and numeric-string encodings.
pub fn find_f64(doc: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| doc.get(*key))
        .find_map(coerce_f64)
}

/// Like [`find_f64`] but defaults to `0.0`.
pub fn first_f64(doc: &Map<String, Value>, keys: &[&str]) -> f64 {
    find_f64(doc, keys).unwrap_or(0.0)
}

/// Returns the first candidate parseable as a timestamp.
///
/// Strings may be RFC 3339, `YYYY-MM-DD HH:MM:SS` or a bare `YYYY-MM-DD`;
/// the last two are read as UTC. Numbers are read as Unix seconds.
pub fn first_timestamp(doc: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|key| doc.get(*key))
        .find_map(|value| match value {
            Value::String(s) => parse_timestamp(s.trim()),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            _ => None,
        })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_first_string_respects_priority() {
        let d = doc(json!({"name": "second", "title": "first"}));
        assert_eq!(first_string(&d, &["title", "name", "label"]), "first");
    }

    #[test]
    fn test_first_string_skips_empty_values() {
        let d = doc(json!({"title": "  ", "name": null, "label": "third"}));
        assert_eq!(first_string(&d, &["title", "name", "label"]), "third");
    }

    #[test]
    fn test_first_string_renders_numbers() {
        let d = doc(json!({"id": 42}));
        assert_eq!(first_string(&d, &["dataset_id", "id"]), "42");
    }

    #[test]
    fn test_first_string_defaults_to_empty() {
        let d = doc(json!({"other": "x"}));
        assert_eq!(first_string(&d, &["title"]), "");
    }

    #[test]
    fn test_numeric_coercion_is_uniform() {
        let float = doc(json!({"v": 27600.5}));
        let int = doc(json!({"v": 27600}));
        let string = doc(json!({"v": " 27600.5 "}));

        assert_eq!(first_f64(&float, &["v"]), 27600.5);
        assert_eq!(first_f64(&int, &["v"]), 27600.0);
        assert_eq!(first_f64(&string, &["v"]), 27600.5);
    }

    #[test]
    fn test_unparseable_number_defaults_to_zero() {
        let d = doc(json!({"v": "fast", "w": true}));
        assert_eq!(first_f64(&d, &["v", "w"]), 0.0);
        assert_eq!(find_f64(&d, &["v", "w"]), None);
    }

    #[test]
    fn test_find_f64_falls_through_to_next_candidate() {
        let d = doc(json!({"lat": "n/a", "latitude": 51.5}));
        assert_eq!(find_f64(&d, &["lat", "latitude"]), Some(51.5));
    }

    #[test]
    fn test_first_timestamp_rfc3339() {
        let d = doc(json!({"modified": "2024-05-01T10:00:00+02:00"}));
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert_eq!(
            first_timestamp(&d, &["updated_at", "modified"]),
            Some(expected)
        );
    }

    #[test]
    fn test_first_timestamp_unix_seconds() {
        let d = doc(json!({"timestamp": 1704067200}));
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(first_timestamp(&d, &["timestamp"]), Some(expected));
    }

    #[test]
    fn test_first_timestamp_plain_forms_are_utc() {
        let d = doc(json!({"peak": "2024-08-12 21:30:00", "date": "2024-08-13"}));
        assert_eq!(
            first_timestamp(&d, &["peak"]),
            Some(Utc.with_ymd_and_hms(2024, 8, 12, 21, 30, 0).unwrap())
        );
        assert_eq!(
            first_timestamp(&d, &["date"]),
            Some(Utc.with_ymd_and_hms(2024, 8, 13, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_first_timestamp_invalid_is_none() {
        let d = doc(json!({"updated_at": "yesterday"}));
        assert_eq!(first_timestamp(&d, &["updated_at"]), None);
    }
}
