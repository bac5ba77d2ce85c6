//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and domain types.
//! These are testable in isolation without database access.

use chrono::{DateTime, SecondsFormat, Utc};
use orbitsync_core::domain::{CatalogItem, Observation, PositionRecord, TelemetrySample};
use rusqlite::Row;
use serde_json::Value;
use uuid::Uuid;

/// Convert a SQLite row to a PositionRecord.
///
/// Expected columns: id, fetched_at, source_url, payload
pub fn row_to_position(row: &Row) -> rusqlite::Result<PositionRecord> {
    let id: String = row.get(0)?;
    let fetched_at: String = row.get(1)?;
    let payload: String = row.get(3)?;

    Ok(PositionRecord {
        id: parse_uuid(&id)?,
        fetched_at: parse_datetime(&fetched_at)?,
        source_url: row.get(2)?,
        payload: parse_json(&payload)?,
    })
}

/// Convert a SQLite row to a CatalogItem.
///
/// Expected columns: id, dataset_id, title, status, updated_at, raw, created_at
pub fn row_to_catalog_item(row: &Row) -> rusqlite::Result<CatalogItem> {
    let id: String = row.get(0)?;
    let updated_at: Option<String> = row.get(4)?;
    let raw: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(CatalogItem {
        id: parse_uuid(&id)?,
        dataset_id: row.get(1)?,
        title: row.get(2)?,
        status: row.get(3)?,
        updated_at: updated_at.as_deref().map(parse_datetime).transpose()?,
        raw: parse_json(&raw)?,
        created_at: parse_datetime(&created_at)?,
    })
}

/// Convert a SQLite row to a TelemetrySample.
///
/// Expected columns: id, recorded_at, voltage, temperature, source_file, created_at
pub fn row_to_telemetry(row: &Row) -> rusqlite::Result<TelemetrySample> {
    let id: String = row.get(0)?;
    let recorded_at: String = row.get(1)?;
    let created_at: String = row.get(5)?;

    Ok(TelemetrySample {
        id: parse_uuid(&id)?,
        recorded_at: parse_datetime(&recorded_at)?,
        voltage: row.get(2)?,
        temperature: row.get(3)?,
        source_file: row.get(4)?,
        created_at: parse_datetime(&created_at)?,
    })
}

/// Convert a SQLite row to an Observation.
///
/// Expected columns: id, source, fetched_at, payload
pub fn row_to_observation(row: &Row) -> rusqlite::Result<Observation> {
    let id: String = row.get(0)?;
    let fetched_at: String = row.get(2)?;
    let payload: String = row.get(3)?;

    Ok(Observation {
        id: parse_uuid(&id)?,
        source: row.get(1)?,
        fetched_at: parse_datetime(&fetched_at)?,
        payload: parse_json(&payload)?,
    })
}

fn conversion_error(e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a UUID from string.
fn parse_uuid(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(conversion_error)
}

/// Parse a datetime from RFC 3339 string.
fn parse_datetime(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_error)
}

/// Parse a stored JSON document.
fn parse_json(s: &str) -> rusqlite::Result<Value> {
    serde_json::from_str(s).map_err(conversion_error)
}

/// Format a DateTime for SQLite storage as fixed-width RFC 3339.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}
