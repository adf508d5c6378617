//! Proxy request orchestration.
//!
//! ```text
//! url param → allowlist check ──reject──→ 400 / 403
//!                  │ ok
//!                  ▼
//!        nocache? ─no─→ cache.get() ──hit──→ respond (HIT)
//!                  │ yes                │ miss
//!                  ▼                    ▼
//!              fetch upstream ──fail──→ upstream status / 502
//!                  │ ok
//!                  ▼
//!        transform → cache.put() (compacts) → respond (MISS | BYPASS)
//! ```

use std::sync::Arc;

use lectern_core::Allowlist;
use tracing::{debug, info, warn};

use crate::cache::ProxyCache;
use crate::error::{ProxyError, Result};
use crate::fetch::DocumentFetcher;
use crate::transform::{base_href, transform};

/// How the response document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache.
    Hit,
    /// Fetched because nothing fresh was cached.
    Miss,
    /// Fetched because the caller asked to skip the cache.
    Bypass,
}

impl CacheStatus {
    /// Header value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// A document ready to serve.
#[derive(Debug, Clone)]
pub struct ProxyDocument {
    pub html: Arc<str>,
    pub cache_status: CacheStatus,
}

/// Validates, caches, fetches and transforms proxied documents.
#[derive(Clone)]
pub struct ProxyService {
    allowlist: Arc<Allowlist>,
    cache: Arc<ProxyCache>,
    fetcher: Arc<dyn DocumentFetcher>,
}

impl std::fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("allowlist", &self.allowlist)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl ProxyService {
    /// Creates a service over shared components.
    pub fn new(
        allowlist: Arc<Allowlist>,
        cache: Arc<ProxyCache>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            allowlist,
            cache,
            fetcher,
        }
    }

    /// Returns the allowlist.
    pub fn allowlist(&self) -> &Arc<Allowlist> {
        &self.allowlist
    }

    /// Returns the cache.
    pub fn cache(&self) -> &Arc<ProxyCache> {
        &self.cache
    }

    /// Serves the document for a raw `url` parameter.
    ///
    /// `bypass` skips the cache lookup; the fresh document still replaces the
    /// stored entry so later callers see it.
    pub async fn serve(&self, url: Option<&str>, bypass: bool) -> Result<ProxyDocument> {
        let raw = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ProxyError::MissingUrl)?;

        let target = self.allowlist.check(raw).map_err(|e| {
            debug!(url = %raw, error = %e, "Rejected proxy request");
            ProxyError::from(e)
        })?;
        let key = target.as_str();

        if bypass {
            debug!(url = %key, cache = "bypass", "Skipping proxy cache");
        } else if let Some(html) = self.cache.get(key) {
            debug!(url = %key, cache = "hit", "Serving cached document");
            return Ok(ProxyDocument {
                html,
                cache_status: CacheStatus::Hit,
            });
        } else {
            debug!(url = %key, cache = "miss", "Document not cached");
        }

        let raw_html = self.fetcher.fetch(&target).await.map_err(|e| {
            warn!(url = %key, error = %e, "Upstream fetch failed");
            ProxyError::from(e)
        })?;

        let html: Arc<str> = transform(&raw_html, &base_href(&target)).into();
        info!(
            url = %key,
            raw_bytes = raw_html.len(),
            bytes = html.len(),
            "Fetched and transformed document"
        );

        self.cache.put(key, html.clone());

        Ok(ProxyDocument {
            html,
            cache_status: if bypass {
                CacheStatus::Bypass
            } else {
                CacheStatus::Miss
            },
        })
    }
}
