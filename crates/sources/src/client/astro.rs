//! AstronomyAPI client: upcoming events for an observer location.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use orbitsync_core::source::{EventQuery, EventSource, SourceError};
use serde_json::Value;

use super::HttpSource;
use crate::error::Result;

pub const DEFAULT_ASTRO_URL: &str = "https://api.astronomyapi.com/api/v2";

/// Timeout for one events lookup.
pub const ASTRO_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(25);

/// `GET {base}/bodies/events` authenticated with the application id and secret.
#[derive(Debug, Clone)]
pub struct AstroSource {
    http: HttpSource,
}

impl AstroSource {
    pub fn new(base_url: &str, app_id: &str, secret: &str) -> Result<Self> {
        let url = format!("{}/bodies/events", base_url.trim_end_matches('/'));
        let http = HttpSource::new("astro", url)?
            .with_basic_auth(app_id, secret)
            .with_timeout(ASTRO_TIMEOUT);
        Ok(Self { http })
    }

    pub fn url(&self) -> &str {
        self.http.endpoint()
    }
}

#[async_trait]
impl EventSource for AstroSource {
    async fn events(&self, query: &EventQuery) -> std::result::Result<Value, SourceError> {
        let from = Utc::now().date_naive();
        let to = from + Duration::days(i64::from(query.days));
        let params = [
            ("latitude", format!("{:.6}", query.latitude)),
            ("longitude", format!("{:.6}", query.longitude)),
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
        ];
        let doc = self.http.get_json(&params).await?;
        tracing::debug!(source = "astro", days = query.days, "Fetched astronomy events");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_events_sends_credentials_and_window() {
        let server = MockServer::start().await;
        let from = Utc::now().date_naive();
        let to = from + Duration::days(3);
        Mock::given(method("GET"))
            .and(path("/api/v2/bodies/events"))
            .and(header("authorization", "Basic YXBwOnNlY3JldA=="))
            .and(query_param("latitude", "55.755800"))
            .and(query_param("longitude", "37.617600"))
            .and(query_param("from", from.format("%Y-%m-%d").to_string()))
            .and(query_param("to", to.format("%Y-%m-%d").to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"events": []}})))
            .expect(1)
            .mount(&server)
            .await;

        let source = AstroSource::new(&format!("{}/api/v2/", server.uri()), "app", "secret").unwrap();
        let query = EventQuery {
            latitude: 55.7558,
            longitude: 37.6176,
            days: 3,
        };

        assert_eq!(
            source.events(&query).await.unwrap(),
            json!({"data": {"events": []}})
        );
        assert_eq!(source.url(), format!("{}/api/v2/bodies/events", server.uri()));
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
            .mount(&server)
            .await;

        let source = AstroSource::new(&server.uri(), "app", "wrong").unwrap();
        let query = EventQuery {
            latitude: 0.0,
            longitude: 0.0,
            days: 7,
        };
        assert_eq!(
            source.events(&query).await,
            Err(SourceError::Status {
                status: 401,
                body: "invalid credentials".to_string()
            })
        );
    }
}
