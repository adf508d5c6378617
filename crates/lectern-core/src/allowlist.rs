//! Proxy allowlist.
//!
//! Decides whether an external document URL may be fetched and re-served by
//! the iframe proxy. This is the only gate between the proxy and an open
//! relay, so every rule must hold:
//!
//! - the URL parses as an absolute `http`/`https` URL
//! - its host is one of the trusted asset-store hosts
//! - its path contains the trusted path marker (the "raw upload" resource
//!   class), which excludes images and videos served from the same host
//!
//! ## Usage
//!
//! ```
//! use lectern_core::allowlist::Allowlist;
//!
//! let allowlist = Allowlist::default();
//! assert!(allowlist.is_proxyable("https://res.cloudinary.com/x/raw/upload/y.html"));
//! assert!(!allowlist.is_proxyable("https://res.cloudinary.com/x/image/upload/y.png"));
//! assert!(!allowlist.is_proxyable("https://example.com/x/raw/upload/y.html"));
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Host serving the legacy lesson documents.
pub const DEFAULT_ALLOWED_HOST: &str = "res.cloudinary.com";

/// Path segment identifying raw (untransformed) uploads on the asset store.
pub const DEFAULT_PATH_MARKER: &str = "/raw/upload/";

/// Allowlist rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowlistError {
    /// The URL could not be parsed as an absolute URL.
    #[error("invalid url: {0}")]
    Invalid(String),

    /// The URL parsed but falls outside the allowlist.
    #[error("url not allowed: {0}")]
    NotAllowed(String),
}

/// Result type for allowlist checks.
pub type Result<T> = std::result::Result<T, AllowlistError>;

/// Set of trusted hosts plus the path marker every proxied URL must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    hosts: BTreeSet<String>,
    path_marker: String,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::new([DEFAULT_ALLOWED_HOST], DEFAULT_PATH_MARKER)
    }
}

impl Allowlist {
    /// Creates an allowlist from a host list and a path marker.
    ///
    /// Hosts are lowercased, matching how URL parsing normalizes them.
    pub fn new<I, S>(hosts: I, path_marker: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            path_marker: path_marker.into(),
        }
    }

    /// Adds a trusted host.
    pub fn with_host(mut self, host: impl AsRef<str>) -> Self {
        let host = host.as_ref().trim().to_ascii_lowercase();
        if !host.is_empty() {
            self.hosts.insert(host);
        }
        self
    }

    /// Returns the trusted hosts in sorted order.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    /// Returns the trusted path marker.
    pub fn path_marker(&self) -> &str {
        &self.path_marker
    }

    /// Returns true if the URL may be proxied.
    pub fn is_proxyable(&self, url: &str) -> bool {
        self.check(url).is_ok()
    }

    /// Parses the URL and validates it against the allowlist.
    ///
    /// Returns the parsed URL so callers key caches and fetches on the same
    /// canonical form that was validated.
    pub fn check(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url.trim()).map_err(|e| AllowlistError::Invalid(e.to_string()))?;
        self.check_url(&parsed)?;
        Ok(parsed)
    }

    /// Validates an already parsed URL.
    pub fn check_url(&self, url: &Url) -> Result<()> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AllowlistError::NotAllowed(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| AllowlistError::NotAllowed("missing host".to_string()))?;

        if !self.hosts.contains(&host.to_ascii_lowercase()) {
            return Err(AllowlistError::NotAllowed(format!("host '{}'", host)));
        }

        if self.path_marker.is_empty() || !url.path().contains(&self.path_marker) {
            return Err(AllowlistError::NotAllowed(format!("path '{}'", url.path())));
        }

        Ok(())
    }
}
