//! Response bodies and the API error taxonomy.
//!
//! # Responsibilities
//! - Define the JSON `{status, message}` body every response uses
//! - Map each admission/ingestion failure to a fixed status and message
//! - Keep internal error detail out of response bodies
//!
//! # Design Decisions
//! - Errors are converted to a terminal response where they are detected
//! - Store and limiter failures are logged with full detail, clients see
//!   only "Server error."

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::payload::PayloadError;
use crate::security::rate_limit::LimiterError;
use crate::store::StoreError;

pub const MSG_LOGGED: &str = "Logged successfully.";
pub const MSG_PROBE: &str = "This is the API endpoint. Use POST to log data.";
pub const MSG_INVALID: &str = "Invalid log data.";
pub const MSG_FORBIDDEN: &str = "Forbidden: Invalid API Key";
pub const MSG_RATE_LIMITED: &str = "Too many requests from this IP. Please try again later.";
pub const MSG_SERVER_ERROR: &str = "Server error.";
pub const MSG_MAINTENANCE: &str = "Server is under maintenance. Please try again later.";
pub const MSG_ORIGIN: &str = "Origin not allowed.";
pub const MSG_NOT_FOUND: &str = "Not found.";

/// Body of every JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub status: u16,
    pub message: String,
}

impl ApiMessage {
    pub fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status: status.as_u16(),
            message: message.to_string(),
        }
    }
}

/// `(status, Json(ApiMessage))` for a fixed message.
pub fn json_message(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiMessage::new(status, message))).into_response()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("origin not allowed")]
    OriginRejected,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("missing or invalid API key")]
    Forbidden,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("store write exceeded {0} ms")]
    StoreTimeout(u64),

    #[error("rate limiter unavailable: {0}")]
    LimiterUnavailable(#[from] LimiterError),

    #[error("maintenance mode")]
    Maintenance,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::OriginRejected | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) | ApiError::StoreTimeout(_) | ApiError::LimiterUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::OriginRejected => MSG_ORIGIN,
            ApiError::RateLimited => MSG_RATE_LIMITED,
            ApiError::Forbidden => MSG_FORBIDDEN,
            ApiError::InvalidPayload(_) => MSG_INVALID,
            ApiError::Store(_) | ApiError::StoreTimeout(_) | ApiError::LimiterUnavailable(_) => {
                MSG_SERVER_ERROR
            }
            ApiError::Maintenance => MSG_MAINTENANCE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Store(_) | ApiError::StoreTimeout(_) | ApiError::LimiterUnavailable(_) => {
                tracing::error!(error = %self, "Request failed");
            }
            ApiError::InvalidPayload(_) => {
                tracing::debug!(error = %self, "Rejected payload");
            }
            _ => {}
        }
        json_message(self.status(), self.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> ApiMessage {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_store_error_hides_detail() {
        let err = ApiError::Store(StoreError::Rejected {
            status: 403,
            body: "PERMISSION_DENIED: secret project detail".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(response).await,
            ApiMessage::new(StatusCode::INTERNAL_SERVER_ERROR, MSG_SERVER_ERROR)
        );
    }

    #[tokio::test]
    async fn test_fixed_messages() {
        let cases = [
            (ApiError::RateLimited, 429, MSG_RATE_LIMITED),
            (ApiError::Forbidden, 403, MSG_FORBIDDEN),
            (ApiError::InvalidPayload(PayloadError::MissingType), 400, MSG_INVALID),
            (ApiError::StoreTimeout(10), 500, MSG_SERVER_ERROR),
            (ApiError::Maintenance, 503, MSG_MAINTENANCE),
        ];
        for (err, status, message) in cases {
            let response = err.into_response();
            assert_eq!(response.status().as_u16(), status);
            let body = body_of(response).await;
            assert_eq!(body.status, status);
            assert_eq!(body.message, message);
        }
    }
}
