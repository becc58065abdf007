//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, Uri},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;

use interaction_log_api::config::{ApiConfig, CounterBackend, StoreBackend};
use interaction_log_api::lifecycle::{Counters, ServiceContext};
use interaction_log_api::security::rate_limit::MemoryCounterStore;
use interaction_log_api::store::{LogStore, MemoryLogStore};
use interaction_log_api::HttpServer;

pub const ORIGIN: &str = "https://app.example.com";
pub const API_KEY: &str = "test-key";
pub const PATH: &str = "/api";
pub const MAX_REQUESTS: u32 = 5;
pub const WINDOW_SECS: u64 = 900;

/// Memory backends, a known key and origin, the default quota.
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.cors.allowed_origin = ORIGIN.into();
    config.auth.api_key = API_KEY.into();
    config.rate_limit.backend = CounterBackend::Memory;
    config.rate_limit.max_requests = MAX_REQUESTS;
    config.rate_limit.window_secs = WINDOW_SECS;
    config.store.backend = StoreBackend::Memory;
    config
}

/// Router over a fresh in-memory store, returned for inspection.
pub fn build_app(config: ApiConfig) -> (Router, Arc<MemoryLogStore>) {
    let store = Arc::new(MemoryLogStore::new());
    let router = build_app_with_store(config, store.clone());
    (router, store)
}

pub fn build_app_with_store(config: ApiConfig, store: Arc<dyn LogStore>) -> Router {
    let counters = Counters::Memory(Arc::new(MemoryCounterStore::new()));
    let context = ServiceContext::with_backends(config, store, counters).unwrap();
    HttpServer::new(&context).router()
}

pub fn peer(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last_octet], 40000))
}

fn with_peer(mut request: Request<Body>, addr: SocketAddr) -> Request<Body> {
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// POST `body` to the ingestion path from `addr`.
pub fn post_log(body: &str, key: Option<&str>, addr: SocketAddr) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(PATH)
        .header("content-type", "application/json")
        .header("origin", ORIGIN);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    with_peer(builder.body(Body::from(body.to_string())).unwrap(), addr)
}

pub fn get_probe(addr: SocketAddr) -> Request<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(PATH)
        .header("origin", ORIGIN)
        .body(Body::empty())
        .unwrap();
    with_peer(request, addr)
}

pub fn preflight(origin: &str, addr: SocketAddr) -> Request<Body> {
    let request = Request::builder()
        .method("OPTIONS")
        .uri(PATH)
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type, x-api-key")
        .body(Body::empty())
        .unwrap();
    with_peer(request, addr)
}

pub const CLICK: &str = r#"{"type":"click","data":{"x":10,"y":20}}"#;

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// A commit received by the mock document store.
#[derive(Debug, Clone)]
pub struct RecordedCommit {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    commits: Arc<Mutex<Vec<RecordedCommit>>>,
}

async fn record_commit(
    State(state): State<MockState>,
    uri: Uri,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let commit = RecordedCommit {
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    state.commits.lock().unwrap().push(commit);

    let body = if state.status.is_success() {
        r#"{"writeResults":[{}],"commitTime":"2024-01-01T00:00:00Z"}"#.to_string()
    } else {
        r#"{"error":{"code":409,"status":"ALREADY_EXISTS"}}"#.to_string()
    };
    (state.status, body)
}

/// Start a mock Firestore REST endpoint answering every request with `status`.
///
/// Returns its base URL (ending in `/v1`) and the commits it receives.
pub async fn start_mock_firestore(status: StatusCode) -> (String, Arc<Mutex<Vec<RecordedCommit>>>) {
    let commits = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        commits: commits.clone(),
    };
    let app = Router::new().fallback(record_commit).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{addr}/v1"), commits)
}
