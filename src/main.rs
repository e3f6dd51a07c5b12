//! reqlens server
//!
//! Serves the persona CRUD API, records every request under the configured
//! prefix into an append-only JSON log, and answers report queries over it.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ request id ─▶ trace ─▶ catch panic ─▶ request log ─▶ timeout ─▶ handler
//!                                                                 │
//!                                                                 ▼
//!                                                         LogStore (log.json)
//!                                                                 ▲
//!     GET /api/logs/report/* ─────────────────────▶ ReportEngine ─┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use reqlens::config::{load_config, AppConfig};
use reqlens::http::HttpServer;
use reqlens::lifecycle::{signals, Shutdown};
use reqlens::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "reqlens")]
#[command(about = "Persona API with request logging and reports", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init(&config.observability);

    tracing::info!("reqlens v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        log_file = %config.log_store.path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
