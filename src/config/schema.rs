//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the ingestion API.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the ingestion API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Path of the single ingestion resource.
    pub route: RouteConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Shared-secret authentication.
    pub auth: AuthConfig,

    /// Log record store.
    pub store: StoreConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Answer every request with 503 while set.
    pub maintenance: bool,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Resource path serving GET, POST and OPTIONS.
    pub path: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            path: "/api".to_string(),
        }
    }
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// The one origin granted cross-origin access (literal match).
    pub allowed_origin: String,

    /// Answer non-granted requests with 403 instead of only withholding headers.
    pub reject_disallowed: bool,
}

/// Where the rate limiter keeps its counters.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CounterBackend {
    /// In-process table. Single-instance deployments only.
    Memory,
    /// Shared Redis counters, safe across instances.
    #[default]
    Redis,
}

/// How the client identity is derived.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum IdentitySource {
    /// TCP peer address.
    #[default]
    Peer,
    /// Right-most entry of a header set by a trusted proxy.
    ForwardedHeader { header: String },
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Maximum admitted requests per identity per window.
    pub max_requests: u32,

    /// Counter backing store.
    pub backend: CounterBackend,

    /// Redis connection string (required for the redis backend).
    pub redis_url: Option<String>,

    /// Prefix for Redis counter keys.
    pub key_prefix: String,

    /// Identity derivation.
    pub identity: IdentitySource,

    /// Admit requests when the counter store is unreachable.
    pub fail_open: bool,

    /// Interval between sweeps of expired in-memory counters.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 5,
            backend: CounterBackend::Redis,
            redis_url: None,
            key_prefix: "rl:".to_string(),
            identity: IdentitySource::Peer,
            fail_open: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Shared-secret authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header carrying the credential.
    pub header_name: String,

    /// The shared secret.
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header_name: "x-api-key".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local vector, for development and tests.
    Memory,
    #[default]
    Firestore,
}

/// Log record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Collection receiving one document per record.
    pub collection: String,

    /// Deadline for a single insert in milliseconds.
    pub write_timeout_ms: u64,

    pub firestore: FirestoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Firestore,
            collection: "interaction_logs".to_string(),
            write_timeout_ms: 10_000,
            firestore: FirestoreConfig::default(),
        }
    }
}

/// Firestore REST endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FirestoreConfig {
    pub project_id: String,

    /// Database id, "(default)" unless a named database is used.
    pub database: String,

    /// REST base URL. Point at the emulator for local runs.
    pub base_url: String,

    /// OAuth2 bearer token. Omitted for the emulator.
    pub access_token: Option<String>,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            database: "(default)".to_string(),
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            access_token: None,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 100 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.route.path, "/api");
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.rate_limit.backend, CounterBackend::Redis);
        assert_eq!(config.auth.header_name, "x-api-key");
        assert_eq!(config.store.collection, "interaction_logs");
        assert!(!config.maintenance);
    }

    #[test]
    fn test_partial_toml() {
        let config: ApiConfig = toml::from_str(
            r#"
            maintenance = true

            [rate_limit]
            backend = "memory"
            max_requests = 1

            [rate_limit.identity]
            source = "forwarded_header"
            header = "x-forwarded-for"
            "#,
        )
        .unwrap();

        assert!(config.maintenance);
        assert_eq!(config.rate_limit.backend, CounterBackend::Memory);
        assert_eq!(config.rate_limit.max_requests, 1);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(
            config.rate_limit.identity,
            IdentitySource::ForwardedHeader {
                header: "x-forwarded-for".into()
            }
        );
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
