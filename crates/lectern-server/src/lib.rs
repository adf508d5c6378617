//! Lectern Server - HTTP API server.
//!
//! This crate exposes the iframe proxy and block rendering over HTTP.
//!
//! ## Endpoints
//!
//! - `GET /api/iframe-proxy?url=...&nocache=1` - Serve an allowlisted legacy document
//! - `POST /api/render` - Render a block list to embeds and HTML
//! - `GET /api/lessons/{id}/render` - Render a lesson fetched from the backend
//!
//! ## Example
//!
//! ```no_run
//! use lectern_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
mod handlers;
pub mod lessons;
pub mod models;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use lectern_core::Allowlist;
use lectern_proxy::{ProxyCache, ProxyCacheConfig, DEFAULT_FETCH_TIMEOUT};

pub use error::{ApiError, Result};
pub use handlers::PROXY_CACHE_HEADER;
pub use lessons::{HttpLessonSource, Lesson, LessonSource, LessonSourceError, DEFAULT_BACKEND_URL};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 3557;

/// Default server host (localhost only for security).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Path of the iframe proxy endpoint.
pub const PROXY_ROUTE: &str = "/api/iframe-proxy";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 3557).
    pub port: u16,
    /// Documents the proxy may fetch.
    pub allowlist: Allowlist,
    /// Hard timeout for upstream and backend requests.
    pub fetch_timeout: Duration,
    /// Proxy cache limits.
    pub cache: ProxyCacheConfig,
    /// Lesson backend base URL.
    pub backend_url: String,
    /// Bearer token for the lesson backend.
    pub backend_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("allowlist", &self.allowlist)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("cache", &self.cache)
            .field("backend_url", &self.backend_url)
            .field("backend_token", &self.backend_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowlist: Allowlist::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cache: ProxyCacheConfig::default(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_token: None,
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the proxy allowlist.
    pub fn with_allowlist(mut self, allowlist: Allowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Sets the upstream fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets the proxy cache limits.
    pub fn with_cache(mut self, cache: ProxyCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the lesson backend base URL.
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Sets the lesson backend bearer token.
    pub fn with_backend_token(mut self, token: impl Into<String>) -> Self {
        self.backend_token = Some(token.into());
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// Builds the API router over `state`.
pub fn build_router(state: AppState) -> Router {
    // Lesson previews are embedded by the admin dashboard on another origin.
    // The proxy stays same-origin only.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let render_routes = Router::new()
        .route("/api/render", post(handlers::render_blocks))
        .route("/api/lessons/{id}/render", get(handlers::render_lesson))
        .layer(cors);

    Router::new()
        .route(PROXY_ROUTE, get(handlers::iframe_proxy))
        .merge(render_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
    cache: Arc<ProxyCache>,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let state = AppState::from_config(&config)?;
        Self::with_state(config, state)
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let cache = state.proxy.cache().clone();
        let router = build_router(state);

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid address: {}", e)))?;

        Ok(Self {
            router,
            addr,
            cache,
        })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until shutdown.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Lectern API server on {}", self.addr);

        // Create socket with SO_REUSEADDR to allow binding even when sockets are lingering
        let socket = Socket::new(Domain::for_address(self.addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Set non-blocking for tokio
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let sweep = tokio::spawn(self.cache.clone().start_sweeping());

        let result = axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()));

        sweep.abort();
        result
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
