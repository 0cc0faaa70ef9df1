//! Build job orchestration.
//!
//! [`JobOrchestrator`] runs submitted jobs one at a time through the
//! prepare, download, configure, compile and package stages, streaming
//! progress and output onto the event bus. [`SourceManager`] prepares the
//! per-owner source checkout the stages operate on.
//!
//! External systems (git checkouts, build config templating, session
//! bookkeeping, notifications) are reached through the traits in
//! [`collaborators`].

pub mod collaborators;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod source;
pub mod stages;

pub use collaborators::Collaborators;
pub use config::PipelineConfig;
pub use error::{SourceError, StageError};
pub use job::{EventScope, JobSnapshot};
pub use orchestrator::JobOrchestrator;
pub use source::{CloneOutcome, RepositoryStatus, SourceManager};
pub use stages::Stage;
