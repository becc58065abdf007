//! Route handlers for the ingestion resource.

use axum::{body::Bytes, extract::State, http::StatusCode, response::Response, Json};

use crate::http::response::{json_message, ApiError, ApiMessage, MSG_LOGGED, MSG_NOT_FOUND, MSG_PROBE};
use crate::http::server::AppState;
use crate::ingest::payload::{LogPayload, LogRecord};

/// POST: validate the body and persist one record.
///
/// Runs behind the admission pipeline and the API key check, so by the time
/// the body is read the caller is within quota and authenticated.
pub async fn ingest_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiMessage>, ApiError> {
    let record = LogPayload::parse(&body).and_then(LogRecord::try_from)?;

    let id = match tokio::time::timeout(state.write_timeout, state.store.insert(&record)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ApiError::StoreTimeout(
                state.write_timeout.as_millis() as u64,
            ))
        }
    };

    tracing::debug!(
        record_id = %id,
        event_type = record.event_type(),
        backend = state.store.backend(),
        "Log record stored"
    );

    Ok(Json(ApiMessage::new(StatusCode::OK, MSG_LOGGED)))
}

/// GET: static description, doubles as a liveness probe.
pub async fn probe_handler() -> Json<ApiMessage> {
    Json(ApiMessage::new(StatusCode::OK, MSG_PROBE))
}

pub async fn not_found() -> Response {
    json_message(StatusCode::NOT_FOUND, MSG_NOT_FOUND)
}
