//! Fixed-window rate limiting per client identity.
//!
//! # Architecture
//!
//! - [`RateLimitStage`]: pipeline stage. Resolves the identity, asks the
//!   limiter, attaches `RateLimit-*` headers, rejects with 429.
//! - [`RateLimiter`]: turns a counter hit into a [`Decision`].
//! - [`CounterStore`]: where counts live. [`memory::MemoryCounterStore`] for a
//!   single instance, [`redis::RedisCounterStore`] when several instances
//!   share one quota.
//!
//! Every hit is counted, including rejected ones; a request is admitted when
//! the post-increment count is within `max_requests`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use thiserror::Error;

use crate::config::{IdentitySource, RateLimitConfig};
use crate::http::pipeline::{Flow, RequestContext, Stage};
use crate::http::response::ApiError;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

pub const RATELIMIT_POLICY: &str = "ratelimit-policy";
pub const RATELIMIT_LIMIT: &str = "ratelimit-limit";
pub const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "ratelimit-reset";

#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("unexpected counter store reply: {0}")]
    Protocol(String),
}

/// State of one identity's window after counting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Requests counted in the current window, this one included.
    pub count: u64,
    /// Time until the window resets.
    pub reset_after: Duration,
}

/// Backing store for per-identity counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Atomically count one request for `identity`, starting a new window
    /// of length `window` if none is open.
    async fn hit(&self, identity: &str, window: Duration) -> Result<Hit, LimiterError>;
}

/// Quota disclosure for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
    pub window: Duration,
}

impl Quota {
    /// Seconds until reset, rounded up.
    pub fn reset_secs(&self) -> u64 {
        let millis = self.reset_after.as_millis() as u64;
        millis.div_ceil(1000)
    }

    /// Standard `RateLimit-*` headers. The legacy `X-RateLimit-*` set is never sent.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let policy = format!("{};w={}", self.limit, self.window.as_secs());
        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(RATELIMIT_POLICY, value);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_secs()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed(Quota),
    Limited(Quota),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }

    pub fn quota(&self) -> &Quota {
        match self {
            Decision::Allowed(q) | Decision::Limited(q) => q,
        }
    }
}

/// Fixed-window limiter over a [`CounterStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn check(&self, identity: &str) -> Result<Decision, LimiterError> {
        let hit = self.store.hit(identity, self.window).await?;
        let max = u64::from(self.max_requests);
        let quota = Quota {
            limit: self.max_requests,
            remaining: max.saturating_sub(hit.count) as u32,
            reset_after: hit.reset_after,
            window: self.window,
        };

        if hit.count <= max {
            Ok(Decision::Allowed(quota))
        } else {
            Ok(Decision::Limited(quota))
        }
    }
}

/// Derives the counter key from a request.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    source: IdentitySource,
}

impl IdentityResolver {
    pub fn new(source: IdentitySource) -> Self {
        Self { source }
    }

    pub fn resolve(&self, ctx: &RequestContext) -> String {
        if let IdentitySource::ForwardedHeader { header } = &self.source {
            // The right-most entry was appended by the trusted proxy; anything
            // left of it is client-controlled.
            let forwarded = ctx
                .header(header)
                .and_then(|v| v.rsplit(',').map(str::trim).find(|s| !s.is_empty()));
            if let Some(entry) = forwarded {
                return normalize(entry);
            }
            tracing::debug!(header = %header, "Forwarded header missing, using peer address");
        }

        match ctx.peer {
            Some(addr) => addr.ip().to_string(),
            None => "unknown".to_string(),
        }
    }
}

fn normalize(entry: &str) -> String {
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return ip.to_string();
    }
    if let Ok(addr) = entry.parse::<std::net::SocketAddr>() {
        return addr.ip().to_string();
    }
    entry.to_string()
}

/// Pipeline stage enforcing the limiter.
pub struct RateLimitStage {
    limiter: RateLimiter,
    identity: IdentityResolver,
    fail_open: bool,
}

impl RateLimitStage {
    pub fn new(limiter: RateLimiter, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            identity: IdentityResolver::new(config.identity.clone()),
            fail_open: config.fail_open,
        }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, ctx: &mut RequestContext) -> Flow {
        let identity = self.identity.resolve(ctx);

        let decision = match self.limiter.check(&identity).await {
            Ok(decision) => decision,
            Err(e) if self.fail_open => {
                tracing::warn!(
                    client = %identity,
                    backend = self.limiter.backend(),
                    error = %e,
                    "Counter store failed, admitting request"
                );
                return Flow::Continue;
            }
            Err(e) => return Flow::Respond(ApiError::LimiterUnavailable(e).into_response()),
        };

        decision.quota().apply_headers(ctx.response_headers_mut());

        match decision {
            Decision::Allowed(_) => Flow::Continue,
            Decision::Limited(quota) => {
                tracing::warn!(client = %identity, limit = quota.limit, "Rate limit exceeded");
                ctx.response_headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(quota.reset_secs()));
                Flow::Respond(ApiError::RateLimited.into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use std::net::SocketAddr;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }

        async fn hit(&self, _identity: &str, _window: Duration) -> Result<Hit, LimiterError> {
            Err(LimiterError::Protocol("connection reset".into()))
        }
    }

    fn ctx_from(peer: &str, forwarded: Option<&str>) -> RequestContext {
        let mut builder = Request::builder().uri("/api");
        if let Some(v) = forwarded {
            builder = builder.header("x-forwarded-for", v);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        RequestContext::from_request(&req)
    }

    fn config(max_requests: u32, fail_open: bool) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            fail_open,
            ..RateLimitConfig::default()
        }
    }

    #[test]
    fn test_quota_headers() {
        let quota = Quota {
            limit: 5,
            remaining: 2,
            reset_after: Duration::from_millis(1_500),
            window: Duration::from_secs(900),
        };
        let mut headers = HeaderMap::new();
        quota.apply_headers(&mut headers);

        assert_eq!(headers[RATELIMIT_POLICY], "5;w=900");
        assert_eq!(headers[RATELIMIT_LIMIT], "5");
        assert_eq!(headers[RATELIMIT_REMAINING], "2");
        assert_eq!(headers[RATELIMIT_RESET], "2");
        assert!(headers.get("x-ratelimit-limit").is_none());
    }

    #[test]
    fn test_identity_sources() {
        let peer = IdentityResolver::new(IdentitySource::Peer);
        let forwarded = IdentityResolver::new(IdentitySource::ForwardedHeader {
            header: "x-forwarded-for".into(),
        });

        let ctx = ctx_from("10.0.0.1:4000", Some("1.1.1.1, 203.0.113.9"));
        assert_eq!(peer.resolve(&ctx), "10.0.0.1");
        assert_eq!(forwarded.resolve(&ctx), "203.0.113.9");

        let ctx = ctx_from("10.0.0.1:4000", None);
        assert_eq!(forwarded.resolve(&ctx), "10.0.0.1");
    }

    #[tokio::test]
    async fn test_stage_rejects_after_max() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            2,
            Duration::from_secs(900),
        );
        let stage = RateLimitStage::new(limiter, &config(2, false));

        for remaining in ["1", "0"] {
            let mut ctx = ctx_from("10.0.0.1:4000", None);
            assert!(matches!(stage.process(&mut ctx).await, Flow::Continue));
            assert_eq!(ctx.response_headers()[RATELIMIT_REMAINING], remaining);
        }

        let mut ctx = ctx_from("10.0.0.1:4001", None);
        match stage.process(&mut ctx).await {
            Flow::Respond(r) => assert_eq!(r.status(), StatusCode::TOO_MANY_REQUESTS),
            Flow::Continue => panic!("third request must be limited"),
        }
        assert!(ctx.response_headers().contains_key(RETRY_AFTER));

        // A different identity has its own window.
        let mut ctx = ctx_from("10.0.0.2:4000", None);
        assert!(matches!(stage.process(&mut ctx).await, Flow::Continue));
    }

    #[tokio::test]
    async fn test_store_failure_policy() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), 1, Duration::from_secs(60));

        let closed = RateLimitStage::new(limiter.clone(), &config(1, false));
        let mut ctx = ctx_from("10.0.0.1:4000", None);
        match closed.process(&mut ctx).await {
            Flow::Respond(r) => assert_eq!(r.status(), StatusCode::INTERNAL_SERVER_ERROR),
            Flow::Continue => panic!("fail-closed must reject"),
        }

        let open = RateLimitStage::new(limiter, &config(1, true));
        let mut ctx = ctx_from("10.0.0.1:4000", None);
        assert!(matches!(open.process(&mut ctx).await, Flow::Continue));
        assert!(ctx.response_headers().get(RATELIMIT_LIMIT).is_none());
    }
}
