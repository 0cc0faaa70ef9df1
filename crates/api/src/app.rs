//! Component wiring shared by the binary and the integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::Router;
use buildcast_events::{BusConfig, EventBus};
use buildcast_pipeline::{Collaborators, JobOrchestrator, SourceManager};
use buildcast_process::ProcessSupervisor;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::{routes, ws};

/// Running background components plus the state handed to handlers.
pub struct Services {
    pub state: AppState,
    heartbeat: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Services {
    /// Start the supervisor, bus, gateway, heartbeat and orchestrator.
    pub async fn start(config: ServerConfig, collaborators: Collaborators) -> Self {
        let supervisor = Arc::new(ProcessSupervisor::new(config.supervisor.clone()));
        let event_bus = EventBus::start(BusConfig::default());
        let ws_manager = Arc::new(ws::WsManager::new());

        ws::register_gateway(&event_bus, Arc::clone(&ws_manager)).await;

        let cancel = CancellationToken::new();
        let heartbeat = ws::start_heartbeat(
            Arc::clone(&ws_manager),
            config.heartbeat_interval,
            config.heartbeat_timeout,
            cancel.child_token(),
        );

        let sources = Arc::new(SourceManager::new(
            config.pipeline.clone(),
            Arc::clone(&supervisor),
            Arc::clone(&event_bus),
            Arc::clone(&collaborators.workspace),
        ));
        let orchestrator = JobOrchestrator::start(
            config.pipeline.clone(),
            Arc::clone(&supervisor),
            Arc::clone(&event_bus),
            collaborators,
        );

        let state = AppState {
            config: Arc::new(config),
            ws_manager,
            event_bus,
            supervisor,
            orchestrator,
            sources,
        };

        Self {
            state,
            heartbeat,
            cancel,
        }
    }

    /// Stop everything in dependency order: jobs first, sessions last.
    pub async fn shutdown(self) {
        self.state.orchestrator.shutdown().await;
        self.state.supervisor.shutdown().await;
        self.state.event_bus.shutdown().await;

        self.cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.heartbeat).await;
        tracing::info!("Heartbeat task stopped");

        let ws_count = self.state.ws_manager.connection_count().await;
        tracing::info!(ws_count, "Closing remaining WebSocket connections");
        self.state.ws_manager.shutdown_all().await;
    }
}

/// Build the HTTP router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer. Origins that are not valid header values are
/// skipped with a warning.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
