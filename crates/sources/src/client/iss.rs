//! ISS position client.

use async_trait::async_trait;
use chrono::Utc;
use orbitsync_core::source::{Source, SourceError};
use serde_json::Value;

use super::HttpSource;
use crate::error::Result;

pub const DEFAULT_ISS_URL: &str = "https://api.wheretheiss.at/v1/satellites/25544";

/// Current ISS position. Stamps `fetched_at` into the returned document.
#[derive(Debug, Clone)]
pub struct IssSource {
    http: HttpSource,
}

impl IssSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new("iss", url)?,
        })
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }
}

#[async_trait]
impl Source for IssSource {
    fn id(&self) -> &str {
        self.http.id()
    }

    fn url(&self) -> &str {
        self.http.endpoint()
    }

    async fn fetch(&self) -> std::result::Result<Value, SourceError> {
        let mut doc = self.http.get_json(&[]).await?;
        match doc.as_object_mut() {
            Some(obj) => {
                obj.insert(
                    "fetched_at".to_string(),
                    Value::String(Utc::now().to_rfc3339()),
                );
                Ok(doc)
            }
            None => Err(SourceError::Decode(
                "ISS position is not a JSON object".to_string(),
            )),
        }
    }
}
