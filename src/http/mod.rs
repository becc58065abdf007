//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, graceful shutdown)
//!     → request.rs (request ID, tracing span)
//!     → pipeline.rs (admission stages: maintenance, origin, rate limit)
//!     → [route match]
//!     → pipeline.rs (write guard: API key, POST only)
//!     → ingest handler
//!     → response.rs (JSON body, error mapping)
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{Flow, Pipeline, RequestContext, Stage};
pub use request::X_REQUEST_ID;
pub use response::{ApiError, ApiMessage};
pub use server::HttpServer;
