//! JWST image API client.

use async_trait::async_trait;
use orbitsync_core::source::{Source, SourceError};
use serde_json::Value;

use super::HttpSource;
use crate::error::Result;

pub const DEFAULT_JWST_HOST: &str = "https://api.jwstapi.com";
pub const DEFAULT_JWST_PATH: &str = "all/type/jpg";

/// One page of a JWST listing endpoint.
#[derive(Debug, Clone)]
pub struct JwstSource {
    http: HttpSource,
}

impl JwstSource {
    pub fn new(host: &str, path: &str, api_key: &str, page: u32, per_page: u32) -> Result<Self> {
        let url = format!(
            "{}/{}",
            host.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let http = HttpSource::new("jwst", url)?
            .with_header("x-api-key", api_key)?
            .with_query("page", page.max(1).to_string())
            .with_query("perPage", per_page.max(1).to_string());
        Ok(Self { http })
    }

    /// Adds the `email` header some JWST mirrors require.
    pub fn with_email(mut self, email: &str) -> Result<Self> {
        if !email.trim().is_empty() {
            self.http = self.http.with_header("email", email)?;
        }
        Ok(self)
    }
}

#[async_trait]
impl Source for JwstSource {
    fn id(&self) -> &str {
        self.http.id()
    }

    fn url(&self) -> &str {
        self.http.endpoint()
    }

    async fn fetch(&self) -> std::result::Result<Value, SourceError> {
        Ok(self.http.get_json(&[]).await?)
    }
}
