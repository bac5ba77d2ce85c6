//! SQLite schema definitions and SQL query constants.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text
//! (`2024-01-01T00:00:00.000000Z`), so comparing and ordering the text
//! columns matches comparing and ordering the instants.

/// SQL statement to create all tables.
pub const CREATE_TABLES: &str = r#"
-- ISS position documents
CREATE TABLE IF NOT EXISTS positions (
    id TEXT PRIMARY KEY,
    fetched_at TEXT NOT NULL,
    source_url TEXT NOT NULL,
    payload TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_positions_fetched_at ON positions(fetched_at);

-- Catalog datasets, keyed by upstream dataset id
CREATE TABLE IF NOT EXISTS catalog_items (
    id TEXT PRIMARY KEY,
    dataset_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    updated_at TEXT,
    raw TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_catalog_items_updated_at ON catalog_items(updated_at);

-- Telemetry readings
CREATE TABLE IF NOT EXISTS telemetry_samples (
    id TEXT PRIMARY KEY,
    recorded_at TEXT NOT NULL,
    voltage REAL NOT NULL,
    temperature REAL NOT NULL,
    source_file TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_telemetry_samples_recorded_at ON telemetry_samples(recorded_at);

-- Raw feed documents
CREATE TABLE IF NOT EXISTS observations (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    payload TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_observations_source_fetched_at ON observations(source, fetched_at);
"#;

// ============================================================================
// Position queries
// ============================================================================

pub const INSERT_POSITION: &str =
    "INSERT INTO positions (id, fetched_at, source_url, payload) VALUES (?1, ?2, ?3, ?4)";

pub const SELECT_POSITION_BY_ID: &str =
    "SELECT id, fetched_at, source_url, payload FROM positions WHERE id = ?1";

pub const SELECT_LATEST_POSITIONS: &str =
    "SELECT id, fetched_at, source_url, payload FROM positions ORDER BY fetched_at DESC LIMIT ?1";

pub const SELECT_POSITIONS_IN_RANGE: &str = "SELECT id, fetched_at, source_url, payload FROM positions \
     WHERE fetched_at >= ?1 AND fetched_at <= ?2 ORDER BY fetched_at DESC";

pub const COUNT_POSITIONS: &str = "SELECT COUNT(*) FROM positions";

// ============================================================================
// Catalog queries
// ============================================================================

const CATALOG_COLUMNS: &str = "id, dataset_id, title, status, updated_at, raw, created_at";

pub const INSERT_CATALOG_ITEM: &str = "INSERT INTO catalog_items \
     (id, dataset_id, title, status, updated_at, raw, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

pub const UPDATE_CATALOG_ITEM_BY_DATASET_ID: &str = "UPDATE catalog_items \
     SET title = ?2, status = ?3, updated_at = ?4, raw = ?5 WHERE dataset_id = ?1";

pub const SELECT_CATALOG_ID_BY_DATASET_ID: &str =
    "SELECT id FROM catalog_items WHERE dataset_id = ?1";

pub fn select_catalog_item_by_id() -> String {
    format!("SELECT {} FROM catalog_items WHERE id = ?1", CATALOG_COLUMNS)
}

pub fn select_catalog_item_by_dataset_id() -> String {
    format!(
        "SELECT {} FROM catalog_items WHERE dataset_id = ?1",
        CATALOG_COLUMNS
    )
}

pub fn select_catalog_page() -> String {
    format!(
        "SELECT {} FROM catalog_items \
         ORDER BY updated_at DESC NULLS LAST, created_at DESC LIMIT ?1 OFFSET ?2",
        CATALOG_COLUMNS
    )
}

pub fn search_catalog_items() -> String {
    format!(
        "SELECT {} FROM catalog_items \
         WHERE instr(lower(title), ?1) > 0 OR instr(lower(dataset_id), ?1) > 0 \
         ORDER BY updated_at DESC NULLS LAST, created_at DESC LIMIT ?2",
        CATALOG_COLUMNS
    )
}

pub const COUNT_CATALOG_ITEMS: &str = "SELECT COUNT(*) FROM catalog_items";

// ============================================================================
// Telemetry queries
// ============================================================================

pub const INSERT_TELEMETRY_SAMPLE: &str = "INSERT INTO telemetry_samples \
     (id, recorded_at, voltage, temperature, source_file, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

pub const SELECT_TELEMETRY_IN_RANGE: &str = "SELECT id, recorded_at, voltage, temperature, source_file, created_at \
     FROM telemetry_samples WHERE recorded_at >= ?1 AND recorded_at <= ?2 \
     ORDER BY recorded_at DESC";

pub const SELECT_LATEST_TELEMETRY: &str = "SELECT id, recorded_at, voltage, temperature, source_file, created_at \
     FROM telemetry_samples ORDER BY recorded_at DESC LIMIT ?1";

pub const SELECT_TELEMETRY_STATS: &str = "SELECT COUNT(*), \
     COALESCE(AVG(voltage), 0), COALESCE(MIN(voltage), 0), COALESCE(MAX(voltage), 0), \
     COALESCE(AVG(temperature), 0), COALESCE(MIN(temperature), 0), COALESCE(MAX(temperature), 0) \
     FROM telemetry_samples WHERE recorded_at >= ?1 AND recorded_at <= ?2";

pub const DELETE_TELEMETRY_BEFORE: &str = "DELETE FROM telemetry_samples WHERE recorded_at < ?1";

pub const COUNT_TELEMETRY: &str = "SELECT COUNT(*) FROM telemetry_samples";

// ============================================================================
// Observation queries
// ============================================================================

pub const INSERT_OBSERVATION: &str =
    "INSERT INTO observations (id, source, fetched_at, payload) VALUES (?1, ?2, ?3, ?4)";

pub const SELECT_OBSERVATIONS_BY_SOURCE: &str = "SELECT id, source, fetched_at, payload FROM observations \
     WHERE source = ?1 ORDER BY fetched_at DESC LIMIT ?2";

pub const SELECT_OBSERVATIONS_IN_RANGE: &str = "SELECT id, source, fetched_at, payload FROM observations \
     WHERE source = ?1 AND fetched_at >= ?2 AND fetched_at <= ?3 ORDER BY fetched_at DESC";

pub const DELETE_OBSERVATIONS_BEFORE: &str = "DELETE FROM observations WHERE fetched_at < ?1";
