use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One ISS position document as fetched from the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: Uuid,
    pub fetched_at: DateTime<Utc>,
    pub source_url: String,
    pub payload: Value,
}

impl PositionRecord {
    /// Creates a new record stamped with the current time.
    pub fn new(source_url: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            fetched_at: Utc::now(),
            source_url: source_url.into(),
            payload,
        }
    }

    /// Overrides the fetch timestamp.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }
}

/// A catalog dataset keyed by its upstream `dataset_id`.
///
/// The `dataset_id` is the natural key: re-ingesting the same id updates
/// `title`, `status`, `updated_at` and `raw` in place while `id` and
/// `created_at` keep their first-seen values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub dataset_id: String,
    pub title: String,
    pub status: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub raw: Value,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Creates a new catalog item with a fresh identity.
    pub fn new(dataset_id: impl Into<String>, raw: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset_id: dataset_id.into(),
            title: String::new(),
            status: String::new(),
            updated_at: None,
            raw,
            created_at: Utc::now(),
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the lifecycle status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets the upstream modification time.
    pub fn with_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Overrides the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns true when the natural key is missing or blank.
    pub fn has_empty_key(&self) -> bool {
        self.dataset_id.trim().is_empty()
    }

    /// Copies the mutable fields of `incoming` onto `self`, keeping identity.
    pub fn absorb(&mut self, incoming: &CatalogItem) {
        self.title = incoming.title.clone();
        self.status = incoming.status.clone();
        self.updated_at = incoming.updated_at;
        self.raw = incoming.raw.clone();
    }
}

/// A single spacecraft telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub voltage: f64,
    pub temperature: f64,
    pub source_file: String,
    pub created_at: DateTime<Utc>,
}

impl TelemetrySample {
    /// Creates a new sample.
    pub fn new(
        recorded_at: DateTime<Utc>,
        voltage: f64,
        temperature: f64,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at,
            voltage,
            temperature,
            source_file: source_file.into(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregates over telemetry within a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub count: u64,
    pub avg_voltage: f64,
    pub min_voltage: f64,
    pub max_voltage: f64,
    pub avg_temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
}

impl TelemetryStats {
    /// Computes stats over a slice of samples. Empty input yields zeroes.
    pub fn from_samples(samples: &[TelemetrySample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f64;
        let (mut v_sum, mut t_sum) = (0.0, 0.0);
        let (mut v_min, mut v_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut t_min, mut t_max) = (f64::INFINITY, f64::NEG_INFINITY);

        for s in samples {
            v_sum += s.voltage;
            t_sum += s.temperature;
            v_min = v_min.min(s.voltage);
            v_max = v_max.max(s.voltage);
            t_min = t_min.min(s.temperature);
            t_max = t_max.max(s.temperature);
        }

        Self {
            count: samples.len() as u64,
            avg_voltage: v_sum / n,
            min_voltage: v_min,
            max_voltage: v_max,
            avg_temperature: t_sum / n,
            min_temperature: t_min,
            max_temperature: t_max,
        }
    }
}

/// A raw document captured from a feed channel (APOD, NEO, JWST).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: Value,
}

impl Observation {
    /// Creates a new observation stamped with the current time.
    pub fn new(source: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            fetched_at: Utc::now(),
            payload,
        }
    }

    /// Overrides the fetch timestamp.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }
}

/// An image entry extracted from a feed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedImage {
    pub url: String,
    pub obs: String,
    pub program: String,
    pub suffix: String,
    pub instruments: Vec<String>,
    pub caption: String,
    pub link: String,
}

/// An astronomical event visible from an observer location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstroEvent {
    pub name: String,
    pub kind: String,
    pub when: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}
