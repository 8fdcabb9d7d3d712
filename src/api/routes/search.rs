//! Search Routes
//!
//! - GET /search?source=..&contains=.. - Full scan over all flushed segments
//!
//! The response body is fixed by the public protocol. The number of segments
//! skipped as unreadable travels in the `x-chronos-unreadable-segments`
//! header instead.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{SearchParams, SearchResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

pub const UNREADABLE_SEGMENTS_HEADER: &str = "x-chronos-unreadable-segments";

/// GET /search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .coordinator
        .query(params.source, params.contains)
        .await?;

    let unreadable = result.stats.unreadable_segments.to_string();
    Ok((
        [(UNREADABLE_SEGMENTS_HEADER, unreadable)],
        Json(SearchResponse::from(result)),
    ))
}
