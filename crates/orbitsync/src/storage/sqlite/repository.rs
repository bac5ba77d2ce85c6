//! SQLite repository implementation.
//!
//! Implements the repository traits from `orbitsync_core::storage` using SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use orbitsync_core::domain::{
    CatalogItem, Observation, PositionRecord, TelemetrySample, TelemetryStats,
};
use orbitsync_core::storage::{
    CatalogRepository, ObservationRepository, PageRequest, PositionRepository, RepositoryError,
    Result, TelemetryRepository, TimeRange, UpsertSummary,
};

use super::conversions::{
    format_datetime, row_to_catalog_item, row_to_observation, row_to_position, row_to_telemetry,
};
use super::error::{map_tokio_rusqlite_error, map_tokio_rusqlite_error_with_id};
use super::schema;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

fn to_json(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// SQLite-based repository implementation.
///
/// One connection serves every entity type. `tokio-rusqlite` runs all calls
/// on a dedicated thread, so statements never interleave.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Creates a new repository with a file-based database.
    ///
    /// The database file will be created if it doesn't exist.
    /// Schema tables are created automatically.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Creates a new repository with an in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Initialize the database schema.
    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES)
                .map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
    }

    async fn count(&self, sql: &'static str, entity_type: &'static str) -> Result<u64> {
        self.conn
            .call(move |conn| {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0)).map_err(wrap_err)?;
                Ok(n.max(0) as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, entity_type))
    }
}

// ============================================================================
// PositionRepository implementation
// ============================================================================

#[async_trait]
impl PositionRepository for SqliteRepository {
    async fn create_position(&self, record: &PositionRecord) -> Result<()> {
        let id = record.id.to_string();
        let fetched_at = format_datetime(&record.fetched_at);
        let source_url = record.source_url.clone();
        let payload = to_json(&record.payload)?;
        let id_for_err = id.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    schema::INSERT_POSITION,
                    params![id, fetched_at, source_url, payload],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "PositionRecord", id_for_err))
    }

    async fn get_position(&self, id: Uuid) -> Result<Option<PositionRecord>> {
        let id_str = id.to_string();

        self.conn
            .call(move |conn| {
                conn.query_row(schema::SELECT_POSITION_BY_ID, [&id_str], row_to_position)
                    .optional()
                    .map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "PositionRecord", id.to_string()))
    }

    async fn get_latest_position(&self) -> Result<Option<PositionRecord>> {
        Ok(self.get_latest_positions(1).await?.into_iter().next())
    }

    async fn get_latest_positions(&self, n: usize) -> Result<Vec<PositionRecord>> {
        let limit = n as i64;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_LATEST_POSITIONS)
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map([limit], row_to_position)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "PositionRecord"))
    }

    async fn get_positions_in_range(&self, range: TimeRange) -> Result<Vec<PositionRecord>> {
        let from = format_datetime(&range.from);
        let to = format_datetime(&range.to);

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_POSITIONS_IN_RANGE)
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map([&from, &to], row_to_position)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "PositionRecord"))
    }

    async fn count_positions(&self) -> Result<u64> {
        self.count(schema::COUNT_POSITIONS, "PositionRecord").await
    }
}

// ============================================================================
// CatalogRepository implementation
// ============================================================================

/// Owned column values for one catalog row.
struct CatalogRow {
    id: String,
    dataset_id: String,
    title: String,
    status: String,
    updated_at: Option<String>,
    raw: String,
    created_at: String,
}

impl CatalogRow {
    fn from_item(item: &CatalogItem) -> Result<Self> {
        Ok(Self {
            id: item.id.to_string(),
            dataset_id: item.dataset_id.trim().to_string(),
            title: item.title.clone(),
            status: item.status.clone(),
            updated_at: item.updated_at.as_ref().map(format_datetime),
            raw: to_json(&item.raw)?,
            created_at: format_datetime(&item.created_at),
        })
    }

    fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
        conn.execute(
            schema::INSERT_CATALOG_ITEM,
            params![
                self.id,
                self.dataset_id,
                self.title,
                self.status,
                self.updated_at,
                self.raw,
                self.created_at
            ],
        )
    }
}

#[async_trait]
impl CatalogRepository for SqliteRepository {
    async fn create_item(&self, item: &CatalogItem) -> Result<()> {
        if item.has_empty_key() {
            return Err(RepositoryError::InvalidData(
                "catalog item has an empty dataset_id".to_string(),
            ));
        }
        let row = CatalogRow::from_item(item)?;
        let dataset_id = row.dataset_id.clone();

        self.conn
            .call(move |conn| {
                row.insert(conn).map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "CatalogItem", dataset_id))
    }

    async fn upsert_items(&self, items: &[CatalogItem]) -> Result<UpsertSummary> {
        let mut summary = UpsertSummary::default();
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            if item.has_empty_key() {
                summary.skipped += 1;
            } else {
                rows.push(CatalogRow::from_item(item)?);
            }
        }

        if rows.is_empty() {
            return Ok(summary);
        }

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                for row in &rows {
                    let existing: Option<String> = tx
                        .query_row(
                            schema::SELECT_CATALOG_ID_BY_DATASET_ID,
                            [&row.dataset_id],
                            |r| r.get(0),
                        )
                        .optional()
                        .map_err(wrap_err)?;

                    if existing.is_some() {
                        tx.execute(
                            schema::UPDATE_CATALOG_ITEM_BY_DATASET_ID,
                            params![row.dataset_id, row.title, row.status, row.updated_at, row.raw],
                        )
                        .map_err(wrap_err)?;
                        summary.updated += 1;
                    } else {
                        row.insert(&tx).map_err(wrap_err)?;
                        summary.inserted += 1;
                    }
                }
                // Dropping the transaction without commit rolls it back
                tx.commit().map_err(wrap_err)?;
                Ok(summary)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "CatalogItem"))
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<CatalogItem>> {
        let id_str = id.to_string();

        self.conn
            .call(move |conn| {
                conn.query_row(
                    &schema::select_catalog_item_by_id(),
                    [&id_str],
                    row_to_catalog_item,
                )
                .optional()
                .map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "CatalogItem", id.to_string()))
    }

    async fn get_item_by_dataset_id(&self, dataset_id: &str) -> Result<Option<CatalogItem>> {
        let key = dataset_id.trim().to_string();
        let key_for_err = key.clone();

        self.conn
            .call(move |conn| {
                conn.query_row(
                    &schema::select_catalog_item_by_dataset_id(),
                    [&key],
                    row_to_catalog_item,
                )
                .optional()
                .map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "CatalogItem", key_for_err))
    }

    async fn list_items(&self, page: PageRequest) -> Result<Vec<CatalogItem>> {
        let limit = page.limit as i64;
        let offset = page.offset() as i64;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&schema::select_catalog_page())
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map([limit, offset], row_to_catalog_item)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "CatalogItem"))
    }

    async fn search_items(&self, query: &str, limit: u32) -> Result<Vec<CatalogItem>> {
        let needle = query.trim().to_lowercase();
        let limit = limit as i64;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&schema::search_catalog_items())
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map(params![needle, limit], row_to_catalog_item)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "CatalogItem"))
    }

    async fn count_items(&self) -> Result<u64> {
        self.count(schema::COUNT_CATALOG_ITEMS, "CatalogItem").await
    }
}

// ============================================================================
// TelemetryRepository implementation
// ============================================================================

type TelemetryRow = (String, String, f64, f64, String, String);

fn telemetry_row(sample: &TelemetrySample) -> TelemetryRow {
    (
        sample.id.to_string(),
        format_datetime(&sample.recorded_at),
        sample.voltage,
        sample.temperature,
        sample.source_file.clone(),
        format_datetime(&sample.created_at),
    )
}

#[async_trait]
impl TelemetryRepository for SqliteRepository {
    async fn create_sample(&self, sample: &TelemetrySample) -> Result<()> {
        self.create_samples(std::slice::from_ref(sample)).await
    }

    async fn create_samples(&self, samples: &[TelemetrySample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let rows: Vec<TelemetryRow> = samples.iter().map(telemetry_row).collect();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                {
                    let mut stmt = tx
                        .prepare(schema::INSERT_TELEMETRY_SAMPLE)
                        .map_err(wrap_err)?;
                    for (id, recorded_at, voltage, temperature, source_file, created_at) in &rows {
                        stmt.execute(params![
                            id,
                            recorded_at,
                            voltage,
                            temperature,
                            source_file,
                            created_at
                        ])
                        .map_err(wrap_err)?;
                    }
                }
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "TelemetrySample"))
    }

    async fn get_samples_in_range(&self, range: TimeRange) -> Result<Vec<TelemetrySample>> {
        let from = format_datetime(&range.from);
        let to = format_datetime(&range.to);

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_TELEMETRY_IN_RANGE)
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map([&from, &to], row_to_telemetry)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "TelemetrySample"))
    }

    async fn get_latest_samples(&self, limit: u32) -> Result<Vec<TelemetrySample>> {
        let limit = limit as i64;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_LATEST_TELEMETRY)
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map([limit], row_to_telemetry)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "TelemetrySample"))
    }

    async fn get_stats(&self, range: TimeRange) -> Result<TelemetryStats> {
        let from = format_datetime(&range.from);
        let to = format_datetime(&range.to);

        self.conn
            .call(move |conn| {
                conn.query_row(schema::SELECT_TELEMETRY_STATS, [&from, &to], |row| {
                    let count: i64 = row.get(0)?;
                    Ok(TelemetryStats {
                        count: count.max(0) as u64,
                        avg_voltage: row.get(1)?,
                        min_voltage: row.get(2)?,
                        max_voltage: row.get(3)?,
                        avg_temperature: row.get(4)?,
                        min_temperature: row.get(5)?,
                        max_temperature: row.get(6)?,
                    })
                })
                .map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "TelemetrySample"))
    }

    async fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff = format_datetime(&cutoff);

        self.conn
            .call(move |conn| {
                let n = conn
                    .execute(schema::DELETE_TELEMETRY_BEFORE, [&cutoff])
                    .map_err(wrap_err)?;
                Ok(n as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "TelemetrySample"))
    }

    async fn count_samples(&self) -> Result<u64> {
        self.count(schema::COUNT_TELEMETRY, "TelemetrySample").await
    }
}

// ============================================================================
// ObservationRepository implementation
// ============================================================================

#[async_trait]
impl ObservationRepository for SqliteRepository {
    async fn create_observation(&self, observation: &Observation) -> Result<()> {
        let id = observation.id.to_string();
        let source = observation.source.clone();
        let fetched_at = format_datetime(&observation.fetched_at);
        let payload = to_json(&observation.payload)?;
        let id_for_err = id.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    schema::INSERT_OBSERVATION,
                    params![id, source, fetched_at, payload],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error_with_id(e, "Observation", id_for_err))
    }

    async fn get_latest_observation(&self, source: &str) -> Result<Option<Observation>> {
        Ok(self.get_observations(source, 1).await?.into_iter().next())
    }

    async fn get_observations(&self, source: &str, limit: u32) -> Result<Vec<Observation>> {
        let source = source.to_string();
        let limit = limit as i64;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_OBSERVATIONS_BY_SOURCE)
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map(params![source, limit], row_to_observation)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Observation"))
    }

    async fn get_observations_in_range(
        &self,
        source: &str,
        range: TimeRange,
    ) -> Result<Vec<Observation>> {
        let source = source.to_string();
        let from = format_datetime(&range.from);
        let to = format_datetime(&range.to);

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_OBSERVATIONS_IN_RANGE)
                    .map_err(wrap_err)?;
                let rows = stmt
                    .query_map([&source, &from, &to], row_to_observation)
                    .map_err(wrap_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Observation"))
    }

    async fn delete_observations_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff = format_datetime(&cutoff);

        self.conn
            .call(move |conn| {
                let n = conn
                    .execute(schema::DELETE_OBSERVATIONS_BEFORE, [&cutoff])
                    .map_err(wrap_err)?;
                Ok(n as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Observation"))
    }
}
