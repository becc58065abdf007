//! Ordered request-processing stages.
//!
//! # Responsibilities
//! - Define the `Stage` contract: continue, or terminate with a response
//! - Run stages in order with a sequential driver
//! - Carry response headers produced by stages (CORS, quota) onto whatever
//!   response ends the request, short-circuited or not
//!
//! # Design Decisions
//! - Stages see a snapshot of the request head, never the body
//! - The first `Respond` wins; later stages do not run
//! - A pipeline is mounted as ordinary axum middleware, so route matching
//!   still happens between the admission and write-guard pipelines

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::Response,
};

/// Outcome of a single stage.
pub enum Flow {
    /// Hand the request to the next stage (or the handler).
    Continue,
    /// Stop here and answer with this response.
    Respond(Response),
}

/// Request state visible to stages.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// TCP peer, when the server was started with connect info.
    pub peer: Option<SocketAddr>,
    response_headers: HeaderMap,
}

impl RequestContext {
    pub fn from_request(req: &Request<Body>) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            headers: req.headers().clone(),
            peer: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            response_headers: HeaderMap::new(),
        }
    }

    /// Header value as a string, if present and valid ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Headers to attach to the final response.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Attach the collected headers to `response`.
    pub fn finish(self, mut response: Response) -> Response {
        let headers = response.headers_mut();
        for (name, value) in self.response_headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        response
    }
}

/// One step of request admission.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn process(&self, ctx: &mut RequestContext) -> Flow;
}

/// A fixed, ordered list of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; stages run in insertion order.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage until one responds.
    pub async fn drive(&self, ctx: &mut RequestContext) -> Flow {
        for stage in &self.stages {
            if let Flow::Respond(response) = stage.process(ctx).await {
                tracing::debug!(
                    stage = stage.name(),
                    status = %response.status(),
                    path = %ctx.path,
                    "Pipeline short-circuited"
                );
                return Flow::Respond(response);
            }
        }
        Flow::Continue
    }
}

/// Axum middleware running a pipeline in front of the inner service.
pub async fn pipeline_middleware(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut ctx = RequestContext::from_request(&request);
    match pipeline.drive(&mut ctx).await {
        Flow::Respond(response) => ctx.finish(response),
        Flow::Continue => {
            let response = next.run(request).await;
            ctx.finish(response)
        }
    }
}
