//! Runtime configuration for a rate-limited fetcher
//!
//! Defaults come from [`crate::constants`]; the CoinGecko API key and base URL
//! may be supplied through the environment.

use crate::constants::{
    COINGECKO_API_KEY_ENV, COINGECKO_API_KEY_HEADER, COINGECKO_API_URL, COINGECKO_API_URL_ENV,
    GECKOTERMINAL_API_URL, MIN_GAP_MS, REQUEST_TIMEOUT_SECS, USER_AGENT,
};
use std::time::Duration;

/// Settings for one upstream API
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Short name used in logs and metrics ("coingecko", "geckoterminal")
    pub name: &'static str,
    /// Base URL every endpoint is appended to
    pub base_url: String,
    /// Static API key, sent in `api_key_header` when present
    pub api_key: Option<String>,
    /// Header name carrying the API key
    pub api_key_header: &'static str,
    /// Extra static headers sent on every request
    pub headers: Vec<(&'static str, &'static str)>,
    /// Minimum gap between two outbound attempts
    pub min_gap: Duration,
    /// Per-request transport timeout
    pub request_timeout: Duration,
    /// User agent for the HTTP client
    pub user_agent: String,
}

impl FetcherConfig {
    /// CoinGecko defaults, without an API key
    pub fn coingecko() -> Self {
        Self {
            name: "coingecko",
            base_url: COINGECKO_API_URL.to_string(),
            api_key: None,
            api_key_header: COINGECKO_API_KEY_HEADER,
            headers: vec![("accept", "application/json")],
            min_gap: Duration::from_millis(MIN_GAP_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// CoinGecko defaults with the API key and base URL read from the environment
    pub fn coingecko_from_env() -> Self {
        Self::coingecko_from_lookup(|key| std::env::var(key).ok())
    }

    fn coingecko_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::coingecko();

        if let Some(key) = lookup(COINGECKO_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            config.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = lookup(COINGECKO_API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }

        config
    }

    /// GeckoTerminal defaults (no key, JSON content type)
    pub fn geckoterminal() -> Self {
        Self {
            name: "geckoterminal",
            base_url: GECKOTERMINAL_API_URL.to_string(),
            api_key: None,
            api_key_header: COINGECKO_API_KEY_HEADER,
            headers: vec![
                ("accept", "application/json"),
                ("content-type", "application/json"),
            ],
            min_gap: Duration::from_millis(MIN_GAP_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Sets the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the pacing gap
    pub fn with_min_gap(mut self, min_gap: Duration) -> Self {
        self.min_gap = min_gap;
        self
    }

    /// Headers attached to every request, API key included when configured
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        if let Some(key) = &self.api_key {
            headers.push((self.api_key_header.to_string(), key.clone()));
        }

        headers
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::coingecko()
    }
}
