//! Handlers for per-owner source checkouts.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CloneRequest {
    #[serde(default)]
    pub force: bool,
}

/// GET /api/v1/sources/{owner}
pub async fn source_status(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> AppResult<impl IntoResponse> {
    let status = state.sources.status(&owner).await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/sources/{owner}/clone?force=
///
/// Progress is streamed as `clone_*` events; the response carries the
/// final outcome.
pub async fn clone_source(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(request): Query<CloneRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.sources.clone_source(&owner, request.force).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/sources/{owner}/feeds
pub async fn update_feeds(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.sources.update_feeds(&owner).await?;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "owner": owner, "updated": true }),
    }))
}

/// POST /api/v1/sources/{owner}/pull
pub async fn pull_source(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.sources.pull_source(&owner).await?;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "owner": owner, "updated": true }),
    }))
}
