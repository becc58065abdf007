//! Interaction log ingestion API.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace span ─▶ admission pipeline ─────────┐
//!                                                 maintenance (503)           │
//!                                                 origin policy (CORS, 403)   │
//!                                                 rate limit (429)            │
//!                                                                             ▼
//!                      GET  ─▶ probe message                            [route match]
//!                      POST ─▶ API key (403) ─▶ payload (400) ─▶ LogStore insert (500)
//!                                                                             │
//!     Client Response                                                         │
//!     ◀────────────── { status, message } + RateLimit-* + CORS ◀──────────────┘
//!
//!     Counter store: Redis (shared) or in-process
//!     Log store:     Firestore (REST) or in-process
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use interaction_log_api::config::{load_config, ObservabilityConfig};
use interaction_log_api::lifecycle::{initialize, wait_for_signal, Shutdown};
use interaction_log_api::observability::init_logging;
use interaction_log_api::HttpServer;

#[derive(Parser)]
#[command(name = "interaction-log-api")]
#[command(about = "HTTP ingestion endpoint for client interaction logs", long_about = None)]
struct Args {
    /// Optional TOML config file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    init_logging(&config.observability)?;

    tracing::info!("interaction-log-api v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.route.path,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        counter_backend = ?config.rate_limit.backend,
        store_backend = ?config.store.backend,
        "Configuration loaded"
    );

    let bind_address = config.listener.bind_address.clone();
    let context = initialize(config).await?;

    let shutdown = Shutdown::new();
    let background = context.spawn_background(&shutdown);

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(&context);
    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    for handle in background {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
