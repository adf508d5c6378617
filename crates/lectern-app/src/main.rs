//! Lectern - legacy lesson embedding service.
//!
//! Serves the iframe proxy and block rendering API for the training
//! platform's admin dashboard.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use directories::ProjectDirs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use lectern_core::{Allowlist, DEFAULT_ALLOWED_HOST, DEFAULT_PATH_MARKER};
use lectern_proxy::ProxyCacheConfig;
use lectern_server::{Server, ServerConfig, DEFAULT_BACKEND_URL, DEFAULT_HOST, DEFAULT_PORT};

/// Lectern - proxy and renderer for legacy lesson content
#[derive(Parser, Debug)]
#[command(name = "lectern", version, about)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind to
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host the proxy may fetch from (repeatable; replaces the default)
    #[arg(long = "allow-host", value_name = "HOST")]
    allow_hosts: Vec<String>,

    /// Path marker every proxied URL must contain
    #[arg(long, default_value = DEFAULT_PATH_MARKER)]
    path_marker: String,

    /// Upstream fetch timeout in seconds
    #[arg(long, default_value_t = 15)]
    fetch_timeout_secs: u64,

    /// Proxy cache entry lifetime in seconds
    #[arg(long, default_value_t = 300)]
    cache_ttl_secs: u64,

    /// Lesson backend base URL
    #[arg(long, env = "LECTERN_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,

    /// Bearer token for the lesson backend
    #[arg(long, env = "LECTERN_BACKEND_TOKEN", hide_env_values = true)]
    backend_token: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let allowlist = if self.allow_hosts.is_empty() {
            Allowlist::new([DEFAULT_ALLOWED_HOST], self.path_marker.clone())
        } else {
            Allowlist::new(&self.allow_hosts, self.path_marker.clone())
        };

        let cache = ProxyCacheConfig::default().with_ttl(Duration::from_secs(self.cache_ttl_secs));

        let mut config = ServerConfig::default()
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_allowlist(allowlist)
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_cache(cache)
            .with_backend_url(self.backend_url.clone());

        if let Some(token) = self.backend_token.as_deref().filter(|t| !t.is_empty()) {
            config = config.with_backend_token(token);
        }

        config
    }
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "lectern", "Lectern").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lectern={},tower_http={},warn", log_level, log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("lectern")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    let config = args.server_config();
    tracing::info!("Starting Lectern...");
    tracing::info!("Config: {:?}", config);

    let server = Server::new(config).map_err(|e| anyhow::anyhow!("Server setup failed: {}", e))?;
    server.run().await?;

    tracing::info!("Lectern shutting down");
    Ok(())
}
