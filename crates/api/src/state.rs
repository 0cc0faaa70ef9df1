use std::sync::Arc;

use buildcast_events::EventBus;
use buildcast_pipeline::{JobOrchestrator, SourceManager};
use buildcast_process::ProcessSupervisor;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every component is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// WebSocket session registry (browser clients).
    pub ws_manager: Arc<WsManager>,
    pub event_bus: Arc<EventBus>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub orchestrator: Arc<JobOrchestrator>,
    /// Per-owner source checkouts.
    pub sources: Arc<SourceManager>,
}
