//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{ApiConfig, CounterBackend, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, overlay the process
/// environment, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<ApiConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => ApiConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<ApiConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Overlay environment-provided values onto `config`.
///
/// `lookup` abstracts the environment so tests can supply their own.
pub fn apply_env_overrides<F>(config: &mut ApiConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("API_KEY") {
        config.auth.api_key = v;
    }
    if let Some(v) = lookup("ALLOWED_ORIGIN") {
        config.cors.allowed_origin = v;
    }
    if let Some(v) = lookup("PORT") {
        let port: u16 = parse_env("PORT", v)?;
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    if let Some(v) = lookup("REDIS_URL") {
        config.rate_limit.redis_url = Some(v);
    }
    if let Some(v) = lookup("RATE_LIMIT_BACKEND") {
        config.rate_limit.backend = match v.as_str() {
            "memory" => CounterBackend::Memory,
            "redis" => CounterBackend::Redis,
            _ => return Err(ConfigError::InvalidEnv { key: "RATE_LIMIT_BACKEND", value: v }),
        };
    }
    if let Some(v) = lookup("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX", v)?;
    }
    if let Some(v) = lookup("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SECS", v)?;
    }
    if let Some(v) = lookup("FIRESTORE_PROJECT_ID") {
        config.store.firestore.project_id = v;
    }
    if let Some(v) = lookup("FIRESTORE_ACCESS_TOKEN") {
        config.store.firestore.access_token = Some(v);
    }
    if let Some(v) = lookup("FIRESTORE_BASE_URL") {
        config.store.firestore.base_url = v;
    }
    if let Some(v) = lookup("LOG_COLLECTION") {
        config.store.collection = v;
    }
    if let Some(v) = lookup("MAINTENANCE_MODE") {
        config.maintenance = match v.as_str() {
            "1" | "true" => true,
            "0" | "false" => false,
            _ => return Err(ConfigError::InvalidEnv { key: "MAINTENANCE_MODE", value: v }),
        };
    }
    if let Some(v) = lookup("LOG_FORMAT") {
        config.observability.log_format = match v.as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => return Err(ConfigError::InvalidEnv { key: "LOG_FORMAT", value: v }),
        };
    }

    Ok(())
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
