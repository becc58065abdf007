//! Cross-origin policy stage.
//!
//! # Responsibilities
//! - Grant the single configured origin, by literal byte comparison
//! - Answer `OPTIONS` preflights before any other stage runs
//! - Attach the allow-origin/methods/headers trio to granted responses
//!
//! # Design Decisions
//! - No prefix, suffix or case folding: `https://a.io/` is not `https://a.io`
//! - Requests without an `Origin` header (non-browser callers) are granted;
//!   enforcement for browsers happens client-side through absent headers
//! - Optional hard rejection (403) for deployments that want it

use async_trait::async_trait;
use axum::{
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY,
        },
        header::InvalidHeaderValue,
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    response::IntoResponse,
};

use crate::config::CorsConfig;
use crate::http::pipeline::{Flow, RequestContext, Stage};
use crate::http::response::ApiError;

pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, x-api-key";

const PERMITTED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginDecision {
    Granted,
    Denied,
}

/// The origin allow-list (of one).
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed_origin: HeaderValue,
    reject_disallowed: bool,
}

impl OriginPolicy {
    pub fn new(config: &CorsConfig) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            allowed_origin: HeaderValue::from_str(&config.allowed_origin)?,
            reject_disallowed: config.reject_disallowed,
        })
    }

    /// Decide whether a request may see the permissive headers.
    pub fn evaluate(&self, origin: Option<&HeaderValue>, method: &Method) -> OriginDecision {
        if !PERMITTED_METHODS.contains(method) {
            return OriginDecision::Denied;
        }
        match origin {
            None => OriginDecision::Granted,
            Some(origin) if origin.as_bytes() == self.allowed_origin.as_bytes() => {
                OriginDecision::Granted
            }
            Some(_) => OriginDecision::Denied,
        }
    }

    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allowed_origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(VARY, HeaderValue::from_static("Origin"));
    }
}

#[async_trait]
impl Stage for OriginPolicy {
    fn name(&self) -> &'static str {
        "origin_policy"
    }

    async fn process(&self, ctx: &mut RequestContext) -> Flow {
        match self.evaluate(ctx.headers.get(ORIGIN), &ctx.method) {
            OriginDecision::Granted => self.apply_headers(ctx.response_headers_mut()),
            OriginDecision::Denied => {
                tracing::debug!(
                    origin = ?ctx.header(ORIGIN.as_str()),
                    method = %ctx.method,
                    "Origin not granted"
                );
                if self.reject_disallowed {
                    return Flow::Respond(ApiError::OriginRejected.into_response());
                }
            }
        }

        if ctx.method == Method::OPTIONS {
            return Flow::Respond(StatusCode::OK.into_response());
        }
        Flow::Continue
    }
}
