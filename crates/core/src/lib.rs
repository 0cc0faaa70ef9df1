//! Shared domain types for the buildcast engine.
//!
//! Everything in this crate is pure (no tasks, no channels) so that the
//! process supervisor, event bus, orchestrator and gateway crates can all
//! depend on it without pulling in each other.

pub mod artifacts;
pub mod error;
pub mod format;
pub mod job_events;
pub mod progress;
pub mod status;
pub mod types;
