use axum::routing::get;
use axum::Router;

use crate::handlers::status;
use crate::state::AppState;

/// Routes mounted at `/status`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(status::server_status))
        .route("/sessions", get(status::list_sessions))
        .route("/processes", get(status::list_processes))
        .route("/events", get(status::recent_events))
}
