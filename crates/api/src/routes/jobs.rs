//! Route definitions for the `/jobs` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> submit_job
/// GET    /current         -> current_job
/// DELETE /finished        -> prune_jobs
/// GET    /{id}            -> get_job
/// GET    /{id}/output     -> job_output
/// POST   /{id}/cancel     -> cancel_job
/// POST   /{id}/retry      -> retry_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::submit_job))
        .route("/current", get(jobs::current_job))
        .route("/finished", delete(jobs::prune_jobs))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/output", get(jobs::job_output))
        .route("/{id}/cancel", post(jobs::cancel_job))
        .route("/{id}/retry", post(jobs::retry_job))
}
