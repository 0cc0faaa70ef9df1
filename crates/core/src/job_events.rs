//! Event names published on the bus and delivered to WebSocket clients.
//!
//! The `*_ALIAS` names are accepted by the gateway for clients that still
//! listen on the short forms.

/// A job left the queue and entered its first stage.
pub const EVENT_COMPILE_STARTED: &str = "compile_started";

/// Progress estimate increased or a stage began.
pub const EVENT_COMPILE_PROGRESS: &str = "compile_progress";

/// One line of build output.
pub const EVENT_COMPILE_LOG: &str = "compile_log";

/// Status snapshot of a job (emitted on terminal transitions).
pub const EVENT_COMPILE_STATUS: &str = "compile_status";

/// Job finished successfully; carries the artifact list.
pub const EVENT_COMPILE_COMPLETED: &str = "compile_completed";

/// Short form of [`EVENT_COMPILE_COMPLETED`].
pub const EVENT_COMPILE_COMPLETE_ALIAS: &str = "compile_complete";

/// Job failed; carries the error message.
pub const EVENT_COMPILE_FAILED: &str = "compile_failed";

/// Short form of [`EVENT_COMPILE_FAILED`].
pub const EVENT_COMPILE_ERROR_ALIAS: &str = "compile_error";

/// Source checkout clone progress.
pub const EVENT_CLONE_PROGRESS: &str = "clone_progress";

/// Source checkout clone finished.
pub const EVENT_CLONE_COMPLETE: &str = "clone_complete";

/// Source checkout clone failed.
pub const EVENT_CLONE_ERROR: &str = "clone_error";

/// One line of feed update output.
pub const EVENT_FEEDS_LOG: &str = "feeds_log";

/// Every event name the gateway delivers to clients.
pub const GATEWAY_EVENTS: &[&str] = &[
    EVENT_COMPILE_STARTED,
    EVENT_COMPILE_PROGRESS,
    EVENT_COMPILE_LOG,
    EVENT_COMPILE_STATUS,
    EVENT_COMPILE_COMPLETED,
    EVENT_COMPILE_COMPLETE_ALIAS,
    EVENT_COMPILE_FAILED,
    EVENT_COMPILE_ERROR_ALIAS,
    EVENT_CLONE_PROGRESS,
    EVENT_CLONE_COMPLETE,
    EVENT_CLONE_ERROR,
    EVENT_FEEDS_LOG,
];

/// Room joined by every session of a given owner.
pub fn owner_room(owner: &str) -> String {
    format!("user:{owner}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_events_are_unique() {
        let mut names = GATEWAY_EVENTS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), GATEWAY_EVENTS.len());
    }

    #[test]
    fn owner_room_is_prefixed() {
        assert_eq!(owner_room("alice"), "user:alice");
    }
}
