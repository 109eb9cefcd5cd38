//! site-guard: admission and abuse mitigation in front of a web application.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ request id / trace / timeout
//!             ──────▶ admission middleware ──── 429 / 423 ───▶ Client
//!                     │ identity → route class → lockout → rate limit → monitor
//!                     ▼
//!             lockout endpoint | /_guard introspection | proxy ──▶ Upstream
//!                     │
//!     ◀────── security headers on every response
//!
//!     Background: sweeper (stale records), config watcher (policy reload),
//!                 Prometheus exporter, signal handler
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use site_guard::config::watcher::ConfigWatcher;
use site_guard::config::{load_config, GuardConfig};
use site_guard::lifecycle::{signals, Shutdown};
use site_guard::observability::{logging, metrics};
use site_guard::{GuardError, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "site-guard", version, about = "Admission and abuse mitigation proxy")]
struct Args {
    /// Path to a TOML config file; watched for policy changes
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path).map_err(GuardError::from)?,
        None => GuardConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "site-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        admin_max_requests = config.rate_limit.admin_max_requests,
        "Configuration loaded"
    );

    let server = HttpServer::new(config.clone()).map_err(GuardError::from)?;

    if config.observability.metrics_enabled {
        let metrics_error = |message: String| GuardError::Metrics {
            addr: config.observability.metrics_address.clone(),
            message,
        };
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e: std::net::AddrParseError| metrics_error(e.to_string()))?;
        metrics::init_metrics(addr).map_err(|e| metrics_error(e.to_string()))?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| GuardError::Bind {
            addr: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher handle must outlive the server for reloads to keep flowing.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path, config.clone());
            (rx, Some(watcher.run()?))
        }
        None => {
            let (_, rx) = mpsc::unbounded_channel();
            (rx, None)
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
