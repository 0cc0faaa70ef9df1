//! Pipeline stages and their fixed properties.

use std::fmt;

use buildcast_core::status::JobStatus;
use serde::Serialize;

/// One phase of a build job, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prepare,
    Download,
    Configure,
    Compile,
    Package,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Prepare,
        Stage::Download,
        Stage::Configure,
        Stage::Compile,
        Stage::Package,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Download => "download",
            Stage::Configure => "configure",
            Stage::Compile => "compile",
            Stage::Package => "package",
        }
    }

    /// Job status while this stage runs.
    pub fn status(self) -> JobStatus {
        match self {
            Stage::Prepare => JobStatus::Preparing,
            Stage::Download => JobStatus::Downloading,
            Stage::Configure => JobStatus::Configuring,
            Stage::Compile => JobStatus::Compiling,
            Stage::Package => JobStatus::Packaging,
        }
    }

    /// Progress reported when the stage begins.
    pub fn progress_floor(self) -> f64 {
        match self {
            Stage::Prepare => 0.0,
            Stage::Download => 5.0,
            Stage::Configure => 25.0,
            Stage::Compile => 30.0,
            Stage::Package => 90.0,
        }
    }

    /// Human-readable message published with the stage's progress event.
    pub fn message(self) -> &'static str {
        match self {
            Stage::Prepare => "Preparing workspace",
            Stage::Download => "Downloading dependencies",
            Stage::Configure => "Applying build configuration",
            Stage::Compile => "Compiling firmware",
            Stage::Package => "Collecting artifacts",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_statuses_follow_the_state_machine() {
        let mut current = JobStatus::Idle;
        for stage in Stage::ALL {
            assert!(current.can_transition_to(stage.status()));
            current = stage.status();
        }
        assert!(current.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn floors_are_increasing() {
        let floors: Vec<f64> = Stage::ALL.iter().map(|s| s.progress_floor()).collect();
        assert!(floors.windows(2).all(|w| w[0] <= w[1]));
    }
}
