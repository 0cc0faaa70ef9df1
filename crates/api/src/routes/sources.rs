use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sources;
use crate::state::AppState;

/// Routes mounted at `/sources`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{owner}", get(sources::source_status))
        .route("/{owner}/clone", post(sources::clone_source))
        .route("/{owner}/feeds", post(sources::update_feeds))
        .route("/{owner}/pull", post(sources::pull_source))
}
