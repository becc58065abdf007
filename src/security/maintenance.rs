//! Maintenance gate.

use async_trait::async_trait;
use axum::response::IntoResponse;

use crate::http::pipeline::{Flow, RequestContext, Stage};
use crate::http::response::ApiError;

/// Answers every request with 503. Mounted first, only when maintenance is on.
pub struct MaintenanceGate;

#[async_trait]
impl Stage for MaintenanceGate {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    async fn process(&self, _ctx: &mut RequestContext) -> Flow {
        Flow::Respond(ApiError::Maintenance.into_response())
    }
}
