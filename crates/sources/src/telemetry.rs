//! Synthetic telemetry generator.
//!
//! Stands in for the on-board CSV export: each batch is a set of readings
//! one second apart, ending at the moment of generation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use orbitsync_core::domain::TelemetrySample;
use orbitsync_core::source::{SourceError, TelemetrySource};
use rand::Rng;

pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const VOLTAGE_RANGE: (f64, f64) = (3.2, 12.6);
pub const TEMPERATURE_RANGE: (f64, f64) = (-50.0, 80.0);

/// Random telemetry within plausible bus voltage and temperature bounds.
#[derive(Debug, Clone)]
pub struct SyntheticTelemetrySource {
    batch_size: usize,
}

impl SyntheticTelemetrySource {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Generates a batch ending at `now`.
    pub fn generate(&self, now: DateTime<Utc>) -> Vec<TelemetrySample> {
        let batch = batch_name(now);
        let mut rng = rand::rng();

        (0..self.batch_size)
            .rev()
            .map(|offset| {
                TelemetrySample::new(
                    now - Duration::seconds(offset as i64),
                    round2(rng.random_range(VOLTAGE_RANGE.0..=VOLTAGE_RANGE.1)),
                    round2(rng.random_range(TEMPERATURE_RANGE.0..=TEMPERATURE_RANGE.1)),
                    batch.clone(),
                )
            })
            .collect()
    }
}

impl Default for SyntheticTelemetrySource {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

#[async_trait]
impl TelemetrySource for SyntheticTelemetrySource {
    async fn read_batch(&self) -> Result<Vec<TelemetrySample>, SourceError> {
        let samples = self.generate(Utc::now());
        tracing::debug!(count = samples.len(), "Generated telemetry batch");
        Ok(samples)
    }
}

/// Batch name in the form `telemetry_YYYYmmdd_HHMMSS`.
pub fn batch_name(at: DateTime<Utc>) -> String {
    format!("telemetry_{}", at.format("%Y%m%d_%H%M%S"))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
