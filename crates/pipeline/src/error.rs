use std::path::PathBuf;
use std::time::Duration;

use buildcast_core::format::format_duration;
use buildcast_core::status::{JobStatus, ProcessStatus};
use buildcast_process::ProcessError;

use crate::collaborators::CollaboratorError;
use crate::stages::Stage;

/// Why a job stopped before completing.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{stage} stage failed to start: {source}")]
    Spawn {
        stage: Stage,
        #[source]
        source: ProcessError,
    },

    #[error("{stage} stage {}", exit_label(.code))]
    Exit { stage: Stage, code: Option<i32> },

    #[error("{stage} stage timed out after {}", duration_label(.timeout))]
    Timeout { stage: Stage, timeout: Duration },

    #[error("Job was cancelled")]
    Cancelled,

    #[error("prepare stage failed: {0}")]
    Workspace(String),

    #[error("{stage} stage I/O error: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Errors from [`SourceManager`](crate::SourceManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Invalid owner name: {0}")]
    InvalidOwner(String),

    #[error("Source checkout not found at {}", .0.display())]
    MissingCheckout(PathBuf),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Command `{command}` ended with status {status}")]
    Command {
        command: String,
        status: ProcessStatus,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

fn duration_label(timeout: &Duration) -> String {
    format_duration(*timeout)
}
