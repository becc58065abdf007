//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (overlay environment variables)
//!     → validation.rs (semantic checks)
//!     → ApiConfig (validated, immutable)
//!     → owned by the ServiceContext
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets and connection strings usually arrive through the environment

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiConfig, AuthConfig, CorsConfig, CounterBackend, FirestoreConfig, IdentitySource,
    LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig, RouteConfig,
    StoreBackend, StoreConfig, TimeoutConfig,
};
pub use validation::ValidationError;
