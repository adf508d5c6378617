//! Upstream document fetching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lectern_core::Allowlist;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::redirect::Policy;
use url::Url;

use crate::error::FetchError;

/// Default hard timeout for one upstream fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default upper bound on upstream document size (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Fetches raw documents from the asset store.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetches the document body as text.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// HTTP fetcher backed by `reqwest`.
///
/// Redirects are followed only while every hop stays inside the allowlist;
/// a hop leaving it is not followed and its 3xx status is returned as
/// [`FetchError::Status`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: u64,
}

impl HttpFetcher {
    /// Creates a fetcher with the default size limit.
    pub fn new(allowlist: Arc<Allowlist>, timeout: Duration) -> Result<Self, FetchError> {
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if allowlist.check_url(attempt.url()).is_ok() {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(policy)
            .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Sets the maximum accepted document size.
    pub fn with_max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                host: url.host_str().unwrap_or("upstream").to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        // Content-Length may be absent or wrong, so bound the read itself
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(e))? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
