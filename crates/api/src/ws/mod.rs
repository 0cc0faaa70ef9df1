//! WebSocket infrastructure for real-time communication.
//!
//! Provides session management, heartbeat eviction, the HTTP upgrade
//! handler used by Axum routes, and the event bus gateway.

pub mod gateway;
mod handler;
mod heartbeat;
pub mod manager;

pub use gateway::{register_gateway, GatewayHandler};
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{event_frame, SessionInfo, WsManager, WsStats};
