//! HTTP transport abstraction for the rate-limited fetcher
//!
//! The fetcher only needs "GET this URL with these headers"; keeping that
//! behind a trait lets tests script upstream behaviour (429 storms, slow
//! responses) without a network.

use crate::{
    config::FetcherConfig,
    error::{ConfigError, FetchError},
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderName, HeaderValue, RETRY_AFTER},
    Client,
};

/// Raw upstream response, before JSON parsing
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status
    pub status_text: String,
    /// Raw `Retry-After` header, if the server sent one
    pub retry_after: Option<String>,
    /// Response body
    pub body: String,
}

impl TransportResponse {
    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for HTTP 429 Too Many Requests
    pub fn is_throttled(&self) -> bool {
        self.status == 429
    }
}

/// Trait for issuing upstream GET requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues a GET request
    ///
    /// # Arguments
    /// * `url` - Fully-qualified request URL
    /// * `headers` - Headers to attach
    ///
    /// # Returns
    /// The raw response for any HTTP status, or an error for transport failures
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, FetchError>;

    /// Returns the name of this transport
    fn transport_name(&self) -> &'static str;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with the timeout and user agent from `config`
    ///
    /// Fails with `ConfigError::InvalidHeader` when a configured header (the
    /// API key included) cannot be sent, rather than failing every request.
    pub fn new(config: &FetcherConfig) -> Result<Self, ConfigError> {
        validate_headers(&config.request_headers())?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }
}

/// Checks that every header name and value is encodable
pub fn validate_headers(headers: &[(String, String)]) -> Result<(), ConfigError> {
    for (name, value) in headers {
        let valid = HeaderName::from_bytes(name.as_bytes()).is_ok()
            && HeaderValue::from_str(value).is_ok();
        if !valid {
            return Err(ConfigError::InvalidHeader { name: name.clone() });
        }
    }
    Ok(())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            retry_after,
            body,
        })
    }

    fn transport_name(&self) -> &'static str {
        "reqwest"
    }
}
