//! Movement trend between two ISS position samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::{POSITION_LATITUDE, POSITION_LONGITUDE, POSITION_VELOCITY};
use super::{extract, PositionRecord};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Displacement below this many kilometres counts as stationary.
pub const MOVEMENT_THRESHOLD_KM: f64 = 0.1;

/// Derived movement between the two most recent positions.
///
/// Never persisted. Cached briefly by the position service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub movement: bool,
    pub delta_km: f64,
    pub dt_sec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_kmh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_lon: Option<f64>,
}

impl TrendResult {
    /// The result reported when fewer than two samples exist.
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Great-circle distance between two lat/lon points, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Computes the trend from samples ordered newest first.
///
/// Only the first two samples are used. Fewer than two yields
/// [`TrendResult::neutral`].
pub fn compute_trend(samples: &[PositionRecord]) -> TrendResult {
    let [current, previous, ..] = samples else {
        return TrendResult::neutral();
    };

    let (Some(cur), Some(prev)) = (current.payload.as_object(), previous.payload.as_object())
    else {
        return TrendResult::neutral();
    };

    let lat1 = extract::first_f64(prev, POSITION_LATITUDE);
    let lon1 = extract::first_f64(prev, POSITION_LONGITUDE);
    let lat2 = extract::first_f64(cur, POSITION_LATITUDE);
    let lon2 = extract::first_f64(cur, POSITION_LONGITUDE);

    let delta_km = haversine_km(lat1, lon1, lat2, lon2);
    let dt_sec = (current.fetched_at - previous.fetched_at).num_milliseconds() as f64 / 1000.0;

    // m/s to km/h
    let velocity_kmh = extract::find_f64(cur, POSITION_VELOCITY)
        .filter(|v| *v > 0.0)
        .map(|v| v * 3.6);

    TrendResult {
        movement: delta_km > MOVEMENT_THRESHOLD_KM,
        delta_km,
        dt_sec,
        velocity_kmh,
        from_time: Some(previous.fetched_at),
        to_time: Some(current.fetched_at),
        from_lat: Some(lat1),
        from_lon: Some(lon1),
        to_lat: Some(lat2),
        to_lon: Some(lon2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn record(lat: f64, lon: f64, secs: i64) -> PositionRecord {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PositionRecord::new("test", json!({"latitude": lat, "longitude": lon}))
            .with_fetched_at(base + Duration::seconds(secs))
    }

    #[test]
    fn test_no_samples_is_neutral() {
        let trend = compute_trend(&[]);
        assert!(!trend.movement);
        assert_eq!(trend.delta_km, 0.0);
        assert_eq!(trend.velocity_kmh, None);
        assert_eq!(trend.from_time, None);
    }

    #[test]
    fn test_single_sample_is_neutral() {
        assert_eq!(compute_trend(&[record(10.0, 10.0, 0)]), TrendResult::neutral());
    }

    #[test]
    fn test_identical_coordinates_do_not_move() {
        let trend = compute_trend(&[record(45.0, 90.0, 120), record(45.0, 90.0, 0)]);
        assert!(trend.delta_km.abs() < 1e-9);
        assert!(!trend.movement);
        assert_eq!(trend.dt_sec, 120.0);
    }

    #[test]
    fn test_one_degree_of_latitude_is_about_111_km() {
        let trend = compute_trend(&[record(1.0, 0.0, 60), record(0.0, 0.0, 0)]);
        let expected = 111.19;
        assert!((trend.delta_km - expected).abs() / expected < 0.01);
        assert!(trend.movement);
        assert_eq!(trend.from_lat, Some(0.0));
        assert_eq!(trend.to_lat, Some(1.0));
    }

    #[test]
    fn test_only_two_newest_samples_are_used() {
        let trend = compute_trend(&[
            record(0.0, 0.0, 240),
            record(0.0, 0.0, 120),
            record(50.0, 50.0, 0),
        ]);
        assert!(!trend.movement);
        assert_eq!(trend.dt_sec, 120.0);
    }

    #[test]
    fn test_velocity_is_converted_from_metres_per_second() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let current = PositionRecord::new(
            "test",
            json!({"latitude": "0.5", "longitude": 0, "velocity": 10}),
        )
        .with_fetched_at(base + Duration::seconds(10));
        let previous = record(0.0, 0.0, 0);

        let trend = compute_trend(&[current, previous]);
        assert_eq!(trend.velocity_kmh, Some(36.0));
        assert_eq!(trend.to_lat, Some(0.5));
    }

    #[test]
    fn test_zero_velocity_is_omitted() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let current = PositionRecord::new("test", json!({"latitude": 0, "longitude": 0, "velocity": 0}))
            .with_fetched_at(base);
        let trend = compute_trend(&[current, record(0.0, 0.0, -10)]);
        assert_eq!(trend.velocity_kmh, None);
    }

    #[test]
    fn test_non_object_payload_is_neutral() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let broken = PositionRecord::new("test", json!("oops")).with_fetched_at(base);
        assert_eq!(
            compute_trend(&[broken, record(0.0, 0.0, 0)]),
            TrendResult::neutral()
        );
    }

    #[test]
    fn test_haversine_quarter_meridian() {
        let d = haversine_km(0.0, 0.0, 90.0, 0.0);
        let expected = std::f64::consts::PI * EARTH_RADIUS_KM / 2.0;
        assert!((d - expected).abs() < 1e-6);
    }
}
