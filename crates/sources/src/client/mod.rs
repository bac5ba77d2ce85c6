//! HTTP clients for the upstream APIs.

pub mod astro;
pub mod iss;
pub mod jwst;
pub mod nasa;

use std::time::Duration;

use async_trait::async_trait;
use orbitsync_core::source::{Source, SourceError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde_json::Value;

use crate::error::{ClientError, Result};

pub use astro::AstroSource;
pub use iss::IssSource;
pub use jwst::JwstSource;
pub use nasa::NeoFeedSource;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("orbitsync/", env!("CARGO_PKG_VERSION"));

/// A single GET endpoint returning JSON.
#[derive(Debug, Clone)]
pub struct HttpSource {
    id: String,
    client: reqwest::Client,
    url: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    basic_auth: Option<(String, String)>,
    timeout: Duration,
}

impl HttpSource {
    /// Create a new source for the given URL.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            id: id.into(),
            client,
            url: url.into(),
            query: Vec::new(),
            headers,
            basic_auth: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Add a fixed query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add `api_key` unless the key is blank.
    pub fn with_api_key(self, api_key: &str) -> Self {
        if api_key.trim().is_empty() {
            self
        } else {
            self.with_query("api_key", api_key)
        }
    }

    /// Add a fixed header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::InvalidInput(format!("header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidInput(format!("header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Send HTTP basic credentials with every request.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some((username.to_string(), password.to_string()));
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the source identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.url
    }

    /// Fetch the document, appending `extra` query parameters for this call.
    pub async fn get_json(&self, extra: &[(&str, String)]) -> Result<Value> {
        let mut request = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .query(&self.query)
            .query(extra)
            .timeout(self.timeout);
        if let Some((username, password)) = &self.basic_auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        self.handle_response(response).await
    }

    /// Handle error responses.
    async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(|e| self.classify(e))?;
            if body.is_empty() {
                return Err(ClientError::InvalidResponse("empty body".to_string()));
            }
            serde_json::from_slice(&body).map_err(ClientError::from)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Request(err)
        }
    }
}

#[async_trait]
impl Source for HttpSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> std::result::Result<Value, SourceError> {
        let doc = self.get_json(&[]).await?;
        tracing::debug!(source = %self.id, "Fetched upstream document");
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
    async fn test_fetch_returns_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/osdr"))
            .and(query_param("api_key", "secret"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpSource::new("osdr", format!("{}/osdr", server.uri()))
            .unwrap()
            .with_api_key("secret");

        let doc = source.fetch().await.unwrap();
        assert_eq!(doc, json!({"items": []}));
    }

    #[tokio::test]
    async fn test_blank_api_key_is_not_sent() {
        let source = HttpSource::new("apod", "http://localhost/apod")
            .unwrap()
            .with_api_key("  ");
        assert!(source.query.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
            .mount(&server)
            .await;

        let source = HttpSource::new("iss", server.uri()).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert_eq!(
            err,
            SourceError::Status {
                status: 503,
                body: "down for maintenance".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let source = HttpSource::new("iss", server.uri()).unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(SourceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let source = HttpSource::new("iss", server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        assert_eq!(
            source.fetch().await,
            Err(SourceError::Timeout(Duration::from_millis(50)))
        );
    }

    #[tokio::test]
    async fn test_custom_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpSource::new("jwst", server.uri())
            .unwrap()
            .with_header("x-api-key", "k")
            .unwrap();
        assert!(source.fetch().await.is_ok());
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let result = HttpSource::new("jwst", "http://localhost")
            .unwrap()
            .with_header("bad header", "v");
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }
}
