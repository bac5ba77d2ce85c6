mod error;
mod traits;
mod types;

pub use error::{RepositoryError, Result, TimeRangeError};
pub use traits::{
    CatalogRepository, ObservationRepository, PositionRepository, TelemetryRepository,
};
pub use types::{PageRequest, TimeRange, UpsertSummary, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
