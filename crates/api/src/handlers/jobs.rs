//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use buildcast_core::error::CoreError;
use buildcast_core::status::JobStatus;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitJob {
    pub owner: String,
    /// Build options; must be a JSON object.
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Deserialize)]
pub struct OutputQuery {
    pub last_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SubmittedJob {
    pub job_id: String,
}

fn not_found(job_id: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "job",
        id: job_id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Queue a build job. Returns 201 with the new job id.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let job_id = state.orchestrator.submit(&input.owner, input.config).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedJob { job_id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.orchestrator.list().await,
    })
}

/// GET /api/v1/jobs/current
pub async fn current_job(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.orchestrator.current().await,
    })
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .orchestrator
        .get(&job_id)
        .await
        .ok_or_else(|| not_found(&job_id))?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/jobs/{id}/output?last_n=
pub async fn job_output(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<OutputQuery>,
) -> AppResult<impl IntoResponse> {
    let lines = state
        .orchestrator
        .output(&job_id, query.last_n)
        .await
        .ok_or_else(|| not_found(&job_id))?;
    Ok(Json(DataResponse { data: lines }))
}

// ---------------------------------------------------------------------------
// Cancel / retry
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Returns 204 on success, 409 if the job already finished.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.cancel(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/jobs/{id}/retry
///
/// Queue a new job with a failed job's owner and config.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let original = state
        .orchestrator
        .get(&job_id)
        .await
        .ok_or_else(|| not_found(&job_id))?;

    if original.status != JobStatus::Failed {
        return Err(AppError::BadRequest(
            "Only failed jobs can be retried".into(),
        ));
    }

    let new_job_id = state
        .orchestrator
        .submit(&original.owner, original.config)
        .await?;
    tracing::info!(original_job_id = %job_id, job_id = %new_job_id, "Job retried");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedJob { job_id: new_job_id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// DELETE /api/v1/jobs/finished
pub async fn prune_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.orchestrator.prune_finished().await;
    Json(DataResponse {
        data: serde_json::json!({ "removed": removed }),
    })
}
