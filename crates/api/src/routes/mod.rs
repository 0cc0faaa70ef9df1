pub mod health;
pub mod jobs;
pub mod sources;
pub mod status;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                               WebSocket
///
/// /jobs                             list, submit
/// /jobs/current                     running job
/// /jobs/finished                    prune finished (DELETE)
/// /jobs/{id}                        get
/// /jobs/{id}/output                 recorded output
/// /jobs/{id}/cancel                 cancel (POST)
/// /jobs/{id}/retry                  retry a failed job (POST)
///
/// /sources/{owner}                  repository status (GET)
/// /sources/{owner}/clone            clone checkout (POST)
/// /sources/{owner}/feeds            update feeds (POST)
/// /sources/{owner}/pull             pull checkout (POST)
///
/// /status                           gateway, bus and queue counters
/// /status/sessions                  sessions and rooms
/// /status/processes                 supervised processes
/// /status/events                    recent bus messages
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/jobs", jobs::router())
        .nest("/sources", sources::router())
        .nest("/status", status::router())
}
