//! HTTP and WebSocket surface of the build server.
//!
//! The [`ws`] module holds the transport gateway: the session registry,
//! the heartbeat task, the upgrade handler and the event bus bridge.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;
