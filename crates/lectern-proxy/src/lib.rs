//! Lectern Proxy - Fetch, transform, and cache legacy lesson documents.
//!
//! Legacy lesson documents live on a third-party asset store and expect a
//! host page that no longer exists. This crate re-serves them from our own
//! origin so they can be embedded in a sandboxed frame:
//!
//! - [`service::ProxyService`] validates the URL against the allowlist,
//!   consults the cache, and fetches on a miss
//! - [`transform`] injects the base, viewport and error-guard tags
//! - [`cache::ProxyCache`] bounds repeated fetches with a TTL and compaction

pub mod cache;
pub mod error;
pub mod fetch;
pub mod service;
pub mod transform;

pub use cache::{ProxyCache, ProxyCacheConfig};
pub use error::{FetchError, ProxyError, Result};
pub use fetch::{DocumentFetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
pub use service::{CacheStatus, ProxyDocument, ProxyService};
