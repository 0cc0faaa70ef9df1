//! Process supervisor: spawns shell commands, streams their merged output
//! line by line and enforces timeouts and cancellation.

pub mod error;
mod signal;
pub mod supervisor;

pub use error::ProcessError;
pub use supervisor::{OutputStream, ProcessInfo, ProcessSpec, ProcessSupervisor, SupervisorConfig};
