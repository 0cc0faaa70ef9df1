//! Lifecycle status enums for jobs and supervised processes.
//!
//! Both are closed sets with their wire names fixed by the macro below;
//! transitions are validated with [`JobStatus::can_transition_to`] and
//! [`ProcessStatus::can_transition_to`].

use serde::{Deserialize, Serialize};

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire name used in event payloads and snapshots.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Compile job lifecycle status.
    JobStatus {
        Idle => "idle",
        Preparing => "preparing",
        Downloading => "downloading",
        Configuring => "configuring",
        Compiling => "compiling",
        Packaging => "packaging",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

define_status_enum! {
    /// Supervised OS process status.
    ProcessStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        TimedOut => "timeout",
    }
}

impl JobStatus {
    /// `true` for statuses from which no further transition occurs.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// `true` while the job occupies a pipeline stage.
    pub fn is_active(self) -> bool {
        !self.is_terminal() && self != Self::Idle
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match self {
            Idle => matches!(next, Preparing | Cancelled),
            Preparing => matches!(next, Downloading | Failed | Cancelled),
            Downloading => matches!(next, Configuring | Failed | Cancelled),
            Configuring => matches!(next, Compiling | Failed | Cancelled),
            Compiling => matches!(next, Packaging | Failed | Cancelled),
            Packaging => matches!(next, Completed | Failed | Cancelled),
            Completed | Failed | Cancelled => false,
        }
    }
}

impl ProcessStatus {
    /// `true` for statuses from which no further transition occurs.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// Whether a handle in `self` may move to `next`.
    pub fn can_transition_to(self, next: ProcessStatus) -> bool {
        use ProcessStatus::*;
        match self {
            Pending => matches!(next, Running | Failed | Cancelled),
            Running => matches!(next, Completed | Failed | Cancelled | TimedOut),
            Completed | Failed | Cancelled | TimedOut => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_happy_path_is_allowed() {
        let path = [
            JobStatus::Idle,
            JobStatus::Preparing,
            JobStatus::Downloading,
            JobStatus::Configuring,
            JobStatus::Compiling,
            JobStatus::Packaging,
            JobStatus::Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn job_cannot_skip_stages() {
        assert!(!JobStatus::Idle.can_transition_to(JobStatus::Compiling));
        assert!(!JobStatus::Downloading.can_transition_to(JobStatus::Packaging));
        assert!(!JobStatus::Preparing.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn job_terminal_states_are_final() {
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in JobStatus::ALL {
                assert!(!terminal.can_transition_to(*next));
            }
        }
    }

    #[test]
    fn every_active_stage_can_fail_or_cancel() {
        for status in JobStatus::ALL.iter().filter(|s| s.is_active()) {
            assert!(status.can_transition_to(JobStatus::Failed));
            assert!(status.can_transition_to(JobStatus::Cancelled));
        }
    }

    #[test]
    fn idle_is_neither_active_nor_terminal() {
        assert!(!JobStatus::Idle.is_active());
        assert!(!JobStatus::Idle.is_terminal());
    }

    #[test]
    fn process_terminal_states_are_final() {
        for status in ProcessStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for next in ProcessStatus::ALL {
                assert!(!status.can_transition_to(*next));
            }
        }
        assert!(!ProcessStatus::Running.is_terminal());
    }

    #[test]
    fn wire_names_round_trip_through_serde() {
        let json = serde_json::to_string(&ProcessStatus::TimedOut).expect("serialize");
        assert_eq!(json, "\"timeout\"");
        let parsed: JobStatus = serde_json::from_str("\"compiling\"").expect("deserialize");
        assert_eq!(parsed, JobStatus::Compiling);
        assert_eq!(JobStatus::Packaging.to_string(), "packaging");
    }
}
