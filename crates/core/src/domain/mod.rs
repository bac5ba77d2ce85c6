//! Domain records and the pure transforms applied to upstream payloads.

pub mod extract;
pub mod schema;
mod trend;
mod types;

pub use schema::{
    ItemsPath, SchemaMismatch, ASTRO_EVENT_FIELDS, CATALOG_FIELDS, FEED_IMAGE_FIELDS,
};
pub use trend::{compute_trend, haversine_km, TrendResult, EARTH_RADIUS_KM, MOVEMENT_THRESHOLD_KM};
pub use types::{
    AstroEvent, CatalogItem, FeedImage, Observation, PositionRecord, TelemetrySample, TelemetryStats,
};
