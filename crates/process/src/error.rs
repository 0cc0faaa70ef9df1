/// Errors returned by [`ProcessSupervisor::start`](crate::ProcessSupervisor::start).
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Process {0} is already running")]
    AlreadyRunning(String),

    #[error("Failed to spawn process {id}: {source}")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },
}
