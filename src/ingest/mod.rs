//! Ingestion of interaction events.
//!
//! # Data Flow
//! ```text
//! POST body (bytes)
//!     → payload.rs (LogPayload → LogRecord, typed validation)
//!     → handler.rs (store insert under a deadline)
//!     → 200 "Logged successfully." / 400 / 500
//! ```

pub mod handler;
pub mod payload;

pub use handler::{ingest_handler, not_found, probe_handler};
pub use payload::{LogPayload, LogRecord, PayloadError};
