//! Astronomy events: a read-through view over the events API.
//!
//! Nothing here is persisted or scheduled. A lookup is served from the cache
//! when possible and otherwise fetched, mapped and cached for six hours.

use std::sync::Arc;
use std::time::Duration;

use orbitsync_core::cache::{astro_events_key, Cache};
use orbitsync_core::domain::{AstroEvent, ItemsPath, ASTRO_EVENT_FIELDS};
use orbitsync_core::source::{EventQuery, EventSource};
use orbitsync_core::sync::{with_deadline, ServiceError, SyncError};

use super::{cache_lookup, cache_store};

pub const ASTRO_DOMAIN: &str = "astro";

pub const DEFAULT_DAYS: u32 = 7;
pub const MAX_DAYS: u32 = 30;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_ITEMS_PATH: &str = "data.events";
const EVENTS_TTL: Duration = Duration::from_secs(6 * 3600);

/// Serves astronomy events for an observer location.
pub struct AstroService<C: Cache> {
    source: Arc<dyn EventSource>,
    cache: Arc<C>,
    items_path: ItemsPath,
    deadline: Duration,
}

impl<C: Cache> AstroService<C> {
    pub fn new(source: Arc<dyn EventSource>, cache: Arc<C>) -> Self {
        Self {
            source,
            cache,
            items_path: ItemsPath::new(DEFAULT_ITEMS_PATH),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Declares where event entries live in the upstream document.
    pub fn with_items_path(mut self, items_path: ItemsPath) -> Self {
        self.items_path = items_path;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns events visible from (`latitude`, `longitude`) over the next
    /// `days` days, earliest first.
    ///
    /// `days` outside 1..=30 uses 7. An upstream failure with nothing cached
    /// is [`ServiceError::Degraded`].
    pub async fn get_events(
        &self,
        latitude: f64,
        longitude: f64,
        days: i64,
    ) -> Result<Vec<AstroEvent>, ServiceError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ServiceError::InvalidRequest(format!(
                "coordinates out of range: {}, {}",
                latitude, longitude
            )));
        }
        let days = u32::try_from(days)
            .ok()
            .filter(|d| (1..=MAX_DAYS).contains(d))
            .unwrap_or(DEFAULT_DAYS);

        let key = astro_events_key(latitude, longitude, days);
        if let Some(events) = cache_lookup::<C, Vec<AstroEvent>>(&self.cache, &key).await {
            if !events.is_empty() {
                return Ok(events);
            }
        }

        let query = EventQuery {
            latitude,
            longitude,
            days,
        };
        let lookup = async { self.source.events(&query).await.map_err(SyncError::from) };
        let doc = with_deadline(self.deadline, lookup)
            .await
            .map_err(|err| {
                tracing::warn!(domain = ASTRO_DOMAIN, error = %err, "Events lookup failed");
                ServiceError::Degraded(err.to_string())
            })?;

        let entries = self
            .items_path
            .resolve(&doc)
            .map_err(|e| ServiceError::Degraded(e.to_string()))?;
        let mut events: Vec<AstroEvent> = entries
            .into_iter()
            .filter_map(|entry| ASTRO_EVENT_FIELDS.to_event(entry))
            .collect();
        events.sort_by(|a, b| a.when.cmp(&b.when));

        tracing::debug!(domain = ASTRO_DOMAIN, days, events = events.len(), "Fetched astronomy events");
        if !events.is_empty() {
            cache_store(&*self.cache, &key, &events, EVENTS_TTL).await;
        }
        Ok(events)
    }
}
