//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject half-configured deployments (missing secret, missing backend URLs)
//! - Validate value ranges (window > 0, max_requests >= 1)
//! - Check the allowed origin is a bare serialized origin
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ApiConfig, CounterBackend, IdentitySource, StoreBackend};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("auth.api_key must be set")]
    MissingApiKey,

    #[error("auth.header_name is not a valid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error("cors.allowed_origin must be set")]
    MissingOrigin,

    #[error("cors.allowed_origin must be a bare origin like https://example.com, got {0:?}")]
    InvalidOrigin(String),

    #[error("listener.bind_address is not a socket address: {0:?}")]
    InvalidBindAddress(String),

    #[error("route.path must start with '/': {0:?}")]
    InvalidRoutePath(String),

    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.max_requests must be at least 1")]
    ZeroMaxRequests,

    #[error("rate_limit.redis_url is required for the redis backend")]
    MissingRedisUrl,

    #[error("rate_limit.redis_url is not a redis:// or rediss:// URL: {0:?}")]
    InvalidRedisUrl(String),

    #[error("rate_limit.identity header name is invalid: {0:?}")]
    InvalidIdentityHeader(String),

    #[error("store.firestore.project_id is required for the firestore backend")]
    MissingFirestoreProject,

    #[error("store.firestore.base_url is not a valid URL: {0:?}")]
    InvalidFirestoreUrl(String),

    #[error("store.write_timeout_ms must be greater than zero")]
    ZeroWriteTimeout,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("store.write_timeout_ms ({write_ms}) must be shorter than timeouts.request_secs ({request_secs}s)")]
    WriteTimeoutExceedsRequest { write_ms: u64, request_secs: u64 },

    #[error("rate_limit.sweep_interval_secs must be greater than zero for the memory backend")]
    ZeroSweepInterval,
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.api_key.is_empty() {
        errors.push(ValidationError::MissingApiKey);
    }
    if !is_header_name(&config.auth.header_name) {
        errors.push(ValidationError::InvalidHeaderName(config.auth.header_name.clone()));
    }

    let origin = &config.cors.allowed_origin;
    if origin.is_empty() {
        errors.push(ValidationError::MissingOrigin);
    } else if !is_bare_origin(origin) {
        errors.push(ValidationError::InvalidOrigin(origin.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if !config.route.path.starts_with('/') {
        errors.push(ValidationError::InvalidRoutePath(config.route.path.clone()));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.window_secs == 0 {
            errors.push(ValidationError::ZeroWindow);
        }
        if rl.max_requests == 0 {
            errors.push(ValidationError::ZeroMaxRequests);
        }
        if rl.backend == CounterBackend::Redis {
            match rl.redis_url.as_deref() {
                None | Some("") => errors.push(ValidationError::MissingRedisUrl),
                Some(raw) => {
                    let scheme_ok = Url::parse(raw)
                        .map(|u| matches!(u.scheme(), "redis" | "rediss"))
                        .unwrap_or(false);
                    if !scheme_ok {
                        errors.push(ValidationError::InvalidRedisUrl(raw.to_string()));
                    }
                }
            }
        }
        if let IdentitySource::ForwardedHeader { header } = &rl.identity {
            if !is_header_name(header) {
                errors.push(ValidationError::InvalidIdentityHeader(header.clone()));
            }
        }
    }
    // the sweeper runs whenever in-process counters exist
    if rl.backend == CounterBackend::Memory && rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    let write_ms = config.store.write_timeout_ms;
    let request_secs = config.timeouts.request_secs;
    if write_ms == 0 {
        errors.push(ValidationError::ZeroWriteTimeout);
    }
    if request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    } else if write_ms >= request_secs.saturating_mul(1000) {
        // the store deadline has to fire before the whole-request deadline
        errors.push(ValidationError::WriteTimeoutExceedsRequest {
            write_ms,
            request_secs,
        });
    }
    if config.store.backend == StoreBackend::Firestore {
        let fs = &config.store.firestore;
        if fs.project_id.is_empty() {
            errors.push(ValidationError::MissingFirestoreProject);
        }
        if Url::parse(&fs.base_url).is_err() {
            errors.push(ValidationError::InvalidFirestoreUrl(fs.base_url.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// True when `raw` round-trips through URL origin serialization unchanged,
/// so no path, trailing slash, query or whitespace is present.
fn is_bare_origin(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            url.origin().ascii_serialization() == raw
        }
        _ => false,
    }
}

fn is_header_name(raw: &str) -> bool {
    axum::http::HeaderName::from_bytes(raw.as_bytes()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StoreBackend;

    fn valid() -> ApiConfig {
        let mut config = ApiConfig::default();
        config.auth.api_key = "secret".into();
        config.cors.allowed_origin = "https://example.github.io".into();
        config.rate_limit.redis_url = Some("redis://127.0.0.1:6379".into());
        config.store.firestore.project_id = "demo".into();
        config
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = valid();
        config.auth.api_key.clear();
        config.rate_limit.max_requests = 0;
        config.rate_limit.redis_url = None;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingApiKey,
                ValidationError::ZeroMaxRequests,
                ValidationError::MissingRedisUrl,
            ]
        );
    }

    #[test]
    fn test_origin_must_be_bare() {
        for bad in [
            "https://example.github.io/",
            "https://example.github.io ",
            "https://example.github.io/app",
            "example.github.io",
            "ftp://example.github.io",
        ] {
            let mut config = valid();
            config.cors.allowed_origin = bad.into();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors, vec![ValidationError::InvalidOrigin(bad.into())], "{bad}");
        }
    }

    #[test]
    fn test_memory_backends_need_no_urls() {
        let mut config = valid();
        config.rate_limit.backend = CounterBackend::Memory;
        config.rate_limit.redis_url = None;
        config.store.backend = StoreBackend::Memory;
        config.store.firestore.project_id.clear();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_redis_url_scheme() {
        let mut config = valid();
        config.rate_limit.redis_url = Some("http://127.0.0.1:6379".into());
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidRedisUrl("http://127.0.0.1:6379".into())]
        );
    }

    #[test]
    fn test_request_timeout_must_be_positive() {
        let mut config = valid();
        config.timeouts.request_secs = 0;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::ZeroRequestTimeout]
        );
    }

    #[test]
    fn test_write_timeout_below_request_timeout() {
        let mut config = valid();
        config.store.write_timeout_ms = 60_000;
        config.timeouts.request_secs = 5;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::WriteTimeoutExceedsRequest {
                write_ms: 60_000,
                request_secs: 5,
            }]
        );

        config.store.write_timeout_ms = 5_000;
        assert!(validate_config(&config).is_err());

        config.store.write_timeout_ms = 4_999;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_memory_counters_need_sweep_interval() {
        let mut config = valid();
        config.rate_limit.backend = CounterBackend::Memory;
        config.rate_limit.sweep_interval_secs = 0;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::ZeroSweepInterval]
        );

        config.rate_limit.backend = CounterBackend::Redis;
        assert_eq!(validate_config(&config), Ok(()));
    }
}
