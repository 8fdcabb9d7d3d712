//! Ingest Routes
//!
//! - POST /ingest - Publish one event to the bus
//!
//! The server fills `id` and `ts` when the producer leaves them out. Success
//! means the event is on the bus, not that it is searchable yet.

use axum::{body::Bytes, extract::State, http::StatusCode};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::{Event, EventPayload};

/// POST /ingest
pub async fn ingest(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<StatusCode> {
    let sink = state.ingest.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("ingest is not enabled on this instance".into())
    })?;

    let payload = EventPayload::from_bytes(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid JSON: {}", e)))?;

    let event = Event::from_payload(payload);
    let bytes = event
        .to_payload()
        .to_bytes()
        .map_err(|e| ApiError::Internal(format!("Failed to encode event: {}", e)))?;

    let offset = sink.publish(bytes).await?;
    tracing::debug!(id = %event.id, source = %event.source, offset, "Event published");

    Ok(StatusCode::OK)
}
