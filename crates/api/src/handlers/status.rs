//! Introspection of the gateway, bus and supervisor.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/status
pub async fn server_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: json!({
            "server_time": chrono::Utc::now(),
            "gateway": state.ws_manager.stats().await,
            "bus": state.event_bus.stats().await,
            "queued_jobs": state.orchestrator.queue_depth().await,
            "current_job": state.orchestrator.current().await,
        }),
    })
}

/// GET /api/v1/status/sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: json!({
            "sessions": state.ws_manager.sessions().await,
            "rooms": state.ws_manager.rooms().await,
        }),
    })
}

/// GET /api/v1/status/processes
pub async fn list_processes(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.supervisor.list().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub count: Option<usize>,
}

/// GET /api/v1/status/events?count=
pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    Json(DataResponse {
        data: state.event_bus.recent(query.count.unwrap_or(50)).await,
    })
}

