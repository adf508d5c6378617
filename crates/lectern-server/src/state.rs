//! Application state for the API server.

use std::sync::Arc;

use lectern_core::BlockRenderer;
use lectern_proxy::{HttpFetcher, ProxyCache, ProxyService};

use crate::lessons::{HttpLessonSource, LessonSource};
use crate::{ServerConfig, ServerError, PROXY_ROUTE};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Iframe proxy pipeline (allowlist, cache, fetcher).
    pub proxy: ProxyService,
    /// Block renderer routing allowlisted frames to [`PROXY_ROUTE`].
    pub renderer: Arc<BlockRenderer>,
    /// Lesson backend.
    pub lessons: Arc<dyn LessonSource>,
}

impl AppState {
    /// Creates application state from its components.
    pub fn new(proxy: ProxyService, renderer: BlockRenderer, lessons: Arc<dyn LessonSource>) -> Self {
        Self {
            proxy,
            renderer: Arc::new(renderer),
            lessons,
        }
    }

    /// Builds the production components described by `config`.
    pub fn from_config(config: &ServerConfig) -> std::result::Result<Self, ServerError> {
        let allowlist = Arc::new(config.allowlist.clone());
        let cache = Arc::new(ProxyCache::new(config.cache.clone()));
        let fetcher = HttpFetcher::new(allowlist.clone(), config.fetch_timeout)
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let lessons = HttpLessonSource::new(
            &config.backend_url,
            config.backend_token.clone(),
            config.fetch_timeout,
        )
        .map_err(|e| ServerError::Config(e.to_string()))?;

        let renderer = BlockRenderer::new(allowlist.clone()).with_proxy_endpoint(PROXY_ROUTE);
        let proxy = ProxyService::new(allowlist, cache, Arc::new(fetcher));

        Ok(Self::new(proxy, renderer, Arc::new(lessons)))
    }
}
