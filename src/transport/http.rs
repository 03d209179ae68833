//! reqwest-backed transport.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Sends requests with a shared reqwest client against a fixed base URL.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport from the API configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Create with a custom reqwest client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Error::from_transport)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(Error::from_transport)?;

        debug!(
            method = %request.method,
            path = request.path.as_str(),
            status,
            "API response"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let transport = ReqwestTransport::with_client(Client::new(), "http://localhost:8080/");
        assert_eq!(transport.base_url(), "http://localhost:8080");
        assert_eq!(transport.url("/api/v1/ping"), "http://localhost:8080/api/v1/ping");
        assert_eq!(transport.url("health"), "http://localhost:8080/health");
    }

    #[test]
    fn test_new_from_config() {
        let transport = ReqwestTransport::new(&ApiConfig::default()).unwrap();
        assert_eq!(transport.base_url(), crate::config::DEFAULT_BASE_URL);
        assert_eq!(transport.name(), "reqwest");
    }
}
