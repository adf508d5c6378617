//! Error types for the proxy.

use std::time::Duration;

use lectern_core::AllowlistError;
use thiserror::Error;

/// Proxy error type.
///
/// `Display` is the message returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// No `url` parameter was supplied.
    #[error("Missing url")]
    MissingUrl,

    /// The `url` parameter is not an absolute URL.
    #[error("Invalid url")]
    InvalidUrl,

    /// The URL failed the allowlist.
    #[error("URL not allowed")]
    NotAllowed,

    /// The upstream answered with a non-success status.
    #[error("{host} responded with {status}")]
    Upstream { host: String, status: u16 },

    /// Timeout, connection or body failure.
    #[error("{0}")]
    Gateway(String),
}

impl ProxyError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::MissingUrl | ProxyError::InvalidUrl => 400,
            ProxyError::NotAllowed => 403,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Gateway(_) => 502,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::MissingUrl => "missing_url",
            ProxyError::InvalidUrl => "invalid_url",
            ProxyError::NotAllowed => "url_not_allowed",
            ProxyError::Upstream { .. } => "upstream_status",
            ProxyError::Gateway(_) => "bad_gateway",
        }
    }
}

impl From<AllowlistError> for ProxyError {
    fn from(err: AllowlistError) -> Self {
        match err {
            AllowlistError::Invalid(_) => ProxyError::InvalidUrl,
            AllowlistError::NotAllowed(_) => ProxyError::NotAllowed,
        }
    }
}

impl From<FetchError> for ProxyError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { host, status } => ProxyError::Upstream { host, status },
            other => ProxyError::Gateway(other.to_string()),
        }
    }
}

/// Upstream fetch error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Non-success upstream status.
    #[error("{host} responded with {status}")]
    Status { host: String, status: u16 },

    /// The request did not complete in time.
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// The document is larger than the configured limit.
    #[error("upstream document exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    /// Connection, TLS or body read failure.
    #[error("{0}")]
    Transport(String),
}

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
