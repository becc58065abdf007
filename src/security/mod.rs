//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → maintenance.rs (503 while maintenance mode is on)
//!     → cors.rs (origin check, preflight answer)
//!     → rate_limit (per-identity window)
//!     → [route match]
//!     → auth.rs (shared API key, POST only)
//!     → Pass to ingestion
//! ```
//!
//! # Design Decisions
//! - Each check is a pipeline `Stage`; order is fixed at startup
//! - Fail closed: limiter store errors reject unless explicitly configured
//! - No trust in client input: forwarded headers only when configured

pub mod auth;
pub mod cors;
pub mod maintenance;
pub mod rate_limit;

pub use auth::KeyAuthenticator;
pub use cors::OriginPolicy;
pub use maintenance::MaintenanceGate;
pub use rate_limit::{RateLimitStage, RateLimiter};
