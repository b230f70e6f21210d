//! Error types for the coin market data layer

use thiserror::Error;

/// Errors surfaced by the rate-limited fetcher and the market service
///
/// `Clone` because a single in-flight request fans its result out to every
/// coalesced caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// Upstream kept answering 429 after every retry was spent
    #[error("Rate limit exceeded after {attempts} attempts")]
    ThrottledExceeded { attempts: u32 },

    /// Upstream answered with a non-2xx status other than a retried 429
    #[error("API error: {status} {status_text}")]
    Upstream { status: u16, status_text: String },

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Transport-level failure (DNS, connection reset, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Transport timed out waiting for a response
    #[error("Request timeout")]
    Timeout,

    /// Body was not JSON, or did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Creates an Upstream error
    pub fn upstream(status: u16, status_text: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            status_text: status_text.into(),
        }
    }

    /// Creates an InvalidResponse error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// HTTP status behind this error, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ThrottledExceeded { .. } => Some(429),
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the caller itself aborted the request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when a user-triggered retry could plausibly succeed
    pub fn is_retryable_by_user(&self) -> bool {
        matches!(
            self,
            Self::ThrottledExceeded { .. }
                | Self::Upstream { .. }
                | Self::Network(_)
                | Self::Timeout
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors building a fetcher configuration or HTTP client
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Header value could not be encoded (non-visible ASCII in an API key)
    #[error("Invalid header value for {name}")]
    InvalidHeader { name: String },

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
