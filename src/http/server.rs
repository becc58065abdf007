//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router for the single ingestion resource
//! - Wire up middleware (request ID, tracing, admission pipeline, timeout, body limit)
//! - Put the write guard (API key) in front of POST only
//! - Bind server to listener with peer address info
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::http::pipeline::pipeline_middleware;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::ingest::{ingest_handler, not_found, probe_handler};
use crate::lifecycle::ServiceContext;
use crate::store::LogStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LogStore>,
    pub write_timeout: Duration,
}

/// HTTP server for the ingestion API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server around an initialized service context.
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            router: Self::build_router(context),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: request ID → trace span → ID propagation →
    /// admission pipeline → request timeout → body limit → routes.
    #[allow(deprecated)]
    fn build_router(context: &ServiceContext) -> Router {
        let config = &context.config;
        let state = AppState {
            store: context.store.clone(),
            write_timeout: Duration::from_millis(config.store.write_timeout_ms),
        };

        let guarded_ingest = ingest_handler.layer(middleware::from_fn_with_state(
            context.write_guard.clone(),
            pipeline_middleware,
        ));

        Router::new()
            .route(&config.route.path, get(probe_handler).post(guarded_ingest))
            .fallback(not_found)
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(
                context.admission.clone(),
                pipeline_middleware,
            ))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(set_request_id_layer())
    }

    /// The assembled router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
