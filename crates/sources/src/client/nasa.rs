//! NASA open API clients: OSDR catalog, APOD and the NEO feed.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use orbitsync_core::source::{Source, SourceError};
use serde_json::Value;

use super::HttpSource;
use crate::error::Result;

pub const DEFAULT_OSDR_URL: &str = "https://visualization.osdr.nasa.gov/biodata/api/v2/datasets/";
pub const DEFAULT_APOD_URL: &str = "https://api.nasa.gov/planetary/apod";
pub const DEFAULT_NEO_URL: &str = "https://api.nasa.gov/neo/rest/v1/feed";

/// The NEO feed only serves windows of up to seven days.
pub const MAX_NEO_DAYS: i64 = 7;

/// OSDR dataset catalog.
pub fn osdr(url: impl Into<String>, api_key: &str) -> Result<HttpSource> {
    Ok(HttpSource::new("nasa:osdr", url)?.with_api_key(api_key))
}

/// Astronomy Picture of the Day, with video thumbnails.
pub fn apod(url: impl Into<String>, api_key: &str) -> Result<HttpSource> {
    Ok(HttpSource::new("apod", url)?
        .with_query("thumbs", "true")
        .with_api_key(api_key))
}

/// Near-Earth objects approaching over the last `days` days.
#[derive(Debug, Clone)]
pub struct NeoFeedSource {
    http: HttpSource,
    days: i64,
}

impl NeoFeedSource {
    /// `days` outside 1..=7 falls back to 7.
    pub fn new(url: impl Into<String>, api_key: &str, days: i64) -> Result<Self> {
        let days = if (1..=MAX_NEO_DAYS).contains(&days) {
            days
        } else {
            MAX_NEO_DAYS
        };
        Ok(Self {
            http: HttpSource::new("neo", url)?.with_api_key(api_key),
            days,
        })
    }

    pub fn days(&self) -> i64 {
        self.days
    }
}

#[async_trait]
impl Source for NeoFeedSource {
    fn id(&self) -> &str {
        self.http.id()
    }

    fn url(&self) -> &str {
        self.http.endpoint()
    }

    async fn fetch(&self) -> std::result::Result<Value, SourceError> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(self.days);
        let window = [
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
        ];
        Ok(self.http.get_json(&window).await?)
    }
}
