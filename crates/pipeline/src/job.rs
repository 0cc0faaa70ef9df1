//! Job records and how their events are addressed.

use std::collections::VecDeque;

use buildcast_core::artifacts::Artifact;
use buildcast_core::job_events::owner_room;
use buildcast_core::status::JobStatus;
use buildcast_core::types::Timestamp;
use buildcast_events::Target;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Device name used when the job config does not name one.
pub const DEFAULT_DEVICE_NAME: &str = "unknown";

/// Who receives a job's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    /// Every connected session.
    #[default]
    Broadcast,
    /// Sessions in the owner's room (`user:<owner>`).
    OwnerRoom,
}

impl EventScope {
    pub fn target_for(self, owner: &str) -> Target {
        match self {
            EventScope::Broadcast => Target::Broadcast,
            EventScope::OwnerRoom => Target::Room(owner_room(owner)),
        }
    }
}

impl std::str::FromStr for EventScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" => Ok(EventScope::Broadcast),
            "owner_room" | "owner" | "room" => Ok(EventScope::OwnerRoom),
            other => Err(format!("unknown event scope '{other}'")),
        }
    }
}

/// A build job owned by the orchestrator.
pub(crate) struct Job {
    pub id: String,
    pub owner: String,
    pub config: serde_json::Value,
    pub device_name: String,
    pub status: JobStatus,
    pub progress: f64,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub output: VecDeque<String>,
    pub output_capacity: usize,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
    pub session_id: Option<String>,
    /// Child of the orchestrator's master token.
    pub cancel: CancellationToken,
}

impl Job {
    pub fn new(
        id: String,
        owner: String,
        config: serde_json::Value,
        output_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let device_name = config
            .get("device_name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DEVICE_NAME)
            .to_string();
        Self {
            id,
            owner,
            config,
            device_name,
            status: JobStatus::Idle,
            progress: 0.0,
            created_at: chrono::Utc::now(),
            started_at: None,
            ended_at: None,
            output: VecDeque::new(),
            output_capacity: output_capacity.max(1),
            artifacts: Vec::new(),
            error: None,
            session_id: None,
            cancel,
        }
    }

    pub fn push_line(&mut self, line: String) {
        if self.output.len() == self.output_capacity {
            self.output.pop_front();
        }
        self.output.push_back(line);
    }

    /// Raise progress to `value` if higher. Returns the new value on change.
    pub fn raise_progress(&mut self, value: f64) -> Option<f64> {
        let value = value.clamp(0.0, 100.0);
        if value > self.progress {
            self.progress = value;
            Some(value)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            owner: self.owner.clone(),
            config: self.config.clone(),
            device_name: self.device_name.clone(),
            status: self.status,
            progress: self.progress,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            output_lines: self.output.len(),
            artifacts: self.artifacts.clone(),
            error: self.error.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Read-only view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub owner: String,
    pub config: serde_json::Value,
    pub device_name: String,
    pub status: JobStatus,
    pub progress: f64,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub output_lines: usize,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
    pub session_id: Option<String>,
}
