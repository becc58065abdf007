//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → one span per request (http/request.rs) carrying x-request-id
//!
//! Consumers:
//!     → logging.rs (stdout, pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every event inside the request span

pub mod logging;

pub use logging::init_logging;
