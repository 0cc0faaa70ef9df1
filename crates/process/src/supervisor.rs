//! [`ProcessSupervisor`]: registry of running shell commands.
//!
//! Each [`ProcessSupervisor::start`] spawns `sh -c <command>` as the leader
//! of a new process group and launches three tasks:
//!
//! - two reader tasks (stdout, stderr) that append every line to the
//!   handle's bounded buffer and forward it into the caller's
//!   [`OutputStream`];
//! - one monitor task that owns the child, polls it every
//!   [`SupervisorConfig::poll_interval`], enforces the timeout and carries out
//!   cancellation. When the shell exits on its own, whatever is left of its
//!   process group is killed.
//!
//! Once a handle is terminal its [`OutputStream`] ends as soon as the pipes
//! close, or after [`SupervisorConfig::drain_timeout`] without a new line,
//! whichever comes first.
//!
//! Status lives in a `watch` channel per handle. Transitions go through
//! [`ProcessStatus::can_transition_to`], so a terminal status is never
//! overwritten.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use buildcast_core::status::ProcessStatus;
use buildcast_core::types::Timestamp;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;
use crate::signal;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables shared by every supervised process.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often the monitor checks liveness and the deadline.
    pub poll_interval: Duration,
    /// Time between SIGTERM and SIGKILL on cancellation.
    pub grace_period: Duration,
    /// Lines retained per handle.
    pub buffer_lines: usize,
    /// Capacity of each [`OutputStream`] channel.
    pub stream_capacity: usize,
    /// Idle wait for trailing output after the process is terminal.
    pub drain_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            grace_period: Duration::from_secs(5),
            buffer_lines: 10_000,
            stream_capacity: 1024,
            drain_timeout: Duration::from_secs(2),
        }
    }
}

/// What to run.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    /// Shell command line, passed to `sh -c`.
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Wall-clock limit; `None` runs until exit or cancellation.
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ---------------------------------------------------------------------------
// Public snapshot and stream types
// ---------------------------------------------------------------------------

/// Point-in-time view of a handle.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub id: String,
    pub pid: Option<u32>,
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub status: ProcessStatus,
    pub started_at: Timestamp,
    pub deadline: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub exit_code: Option<i32>,
    pub buffered_lines: usize,
}

/// Merged stdout/stderr lines of one process.
///
/// Yields `None` once both pipes are closed, or once the process is terminal
/// and no line arrived for the drain timeout. A detached descendant holding
/// a pipe open therefore cannot keep the stream alive. Dropping the stream
/// does not affect the process; lines keep accumulating in the handle
/// buffer.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::Receiver<String>,
    status: watch::Receiver<ProcessStatus>,
    drain_timeout: Duration,
    exited: bool,
    done: bool,
}

impl OutputStream {
    /// Next output line, or `None` at end of output.
    pub async fn next_line(&mut self) -> Option<String> {
        let Self {
            rx,
            status,
            drain_timeout,
            exited,
            done,
        } = self;
        if *done {
            return None;
        }

        if !*exited {
            tokio::select! {
                line = rx.recv() => {
                    *done = line.is_none();
                    return line;
                }
                _ = wait_terminal(status) => *exited = true,
            }
        }

        match tokio::time::timeout(*drain_timeout, rx.recv()).await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                *done = true;
                None
            }
            Err(_) => {
                tracing::debug!("Output still open after process exit, closing stream");
                *done = true;
                None
            }
        }
    }
}

/// Resolve once the status is terminal or the handle is gone.
async fn wait_terminal(status: &mut watch::Receiver<ProcessStatus>) {
    let _ = status.wait_for(|s| s.is_terminal()).await.map(|_| ());
}

// ---------------------------------------------------------------------------
// Handle internals
// ---------------------------------------------------------------------------

struct ProcessHandle {
    id: String,
    pid: Option<u32>,
    command: String,
    working_dir: Option<PathBuf>,
    started_at: Timestamp,
    deadline: Option<Timestamp>,
    timeout: Option<Duration>,
    status: watch::Sender<ProcessStatus>,
    state: Mutex<HandleState>,
    /// Child of the supervisor's master token.
    cancel: CancellationToken,
}

struct HandleState {
    exit_code: Option<i32>,
    ended_at: Option<Timestamp>,
    output: VecDeque<String>,
    capacity: usize,
}

impl ProcessHandle {
    fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    async fn push_line(&self, line: String) {
        let mut state = self.state.lock().await;
        if state.output.len() == state.capacity {
            state.output.pop_front();
        }
        state.output.push_back(line);
    }

    /// Move to a terminal status unless one was already reached.
    async fn finish(&self, next: ProcessStatus, exit_code: Option<i32>) -> bool {
        {
            let mut state = self.state.lock().await;
            if self.status().is_terminal() {
                return false;
            }
            state.exit_code = exit_code;
            state.ended_at = Some(chrono::Utc::now());
        }
        let changed = self.status.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(
                process_id = %self.id,
                status = %next,
                exit_code = ?exit_code,
                "Process finished",
            );
        }
        changed
    }

    async fn snapshot(&self) -> ProcessInfo {
        let state = self.state.lock().await;
        ProcessInfo {
            id: self.id.clone(),
            pid: self.pid,
            command: self.command.clone(),
            working_dir: self.working_dir.clone(),
            status: self.status(),
            started_at: self.started_at,
            deadline: self.deadline,
            ended_at: state.ended_at,
            exit_code: state.exit_code,
            buffered_lines: state.output.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Registry of supervised processes keyed by caller-chosen id.
pub struct ProcessSupervisor {
    processes: RwLock<HashMap<String, Arc<ProcessHandle>>>,
    config: SupervisorConfig,
    /// Master cancellation token, cancelled by [`shutdown`](Self::shutdown).
    cancel: CancellationToken,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            processes: RwLock::new(HashMap::new()),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Spawn `spec` under `id` and return its output stream.
    ///
    /// Fails if `id` is still running. A finished handle that was never
    /// cleaned up is replaced.
    pub async fn start(&self, id: &str, spec: ProcessSpec) -> Result<OutputStream, ProcessError> {
        let mut processes = self.processes.write().await;
        if let Some(existing) = processes.get(id) {
            if !existing.status().is_terminal() {
                return Err(ProcessError::AlreadyRunning(id.to_string()));
            }
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            id: id.to_string(),
            source,
        })?;

        let started_at = chrono::Utc::now();
        let deadline = spec
            .timeout
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .map(|t| started_at + t);
        let (status_tx, _) = watch::channel(ProcessStatus::Pending);

        let handle = Arc::new(ProcessHandle {
            id: id.to_string(),
            pid: child.id(),
            command: spec.command.clone(),
            working_dir: spec.working_dir.clone(),
            started_at,
            deadline,
            timeout: spec.timeout,
            status: status_tx,
            state: Mutex::new(HandleState {
                exit_code: None,
                ended_at: None,
                output: VecDeque::new(),
                capacity: self.config.buffer_lines.max(1),
            }),
            cancel: self.cancel.child_token(),
        });
        handle.status.send_replace(ProcessStatus::Running);

        let (tx, rx) = mpsc::channel(self.config.stream_capacity.max(1));
        let stream = OutputStream {
            rx,
            status: handle.status.subscribe(),
            drain_timeout: self.config.drain_timeout,
            exited: false,
            done: false,
        };
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(Arc::clone(&handle), stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(Arc::clone(&handle), stderr, tx));
        }
        tokio::spawn(monitor(Arc::clone(&handle), child, self.config.clone()));

        tracing::info!(
            process_id = %id,
            pid = ?handle.pid,
            command = %spec.command,
            timeout_secs = ?spec.timeout.map(|t| t.as_secs()),
            "Process started",
        );

        processes.insert(id.to_string(), handle);
        Ok(stream)
    }

    /// Terminate a running process: SIGTERM, then SIGKILL after the grace
    /// period. Resolves once the handle is terminal.
    ///
    /// Returns `false` for unknown or already-terminal handles.
    pub async fn cancel(&self, id: &str) -> bool {
        let Some(handle) = self.get(id).await else {
            return false;
        };
        if handle.status().is_terminal() {
            return false;
        }

        tracing::info!(process_id = %id, "Cancelling process");
        handle.cancel.cancel();
        let mut rx = handle.status.subscribe();
        let _ = rx.wait_for(|s| s.is_terminal()).await;
        true
    }

    pub async fn status(&self, id: &str) -> Option<ProcessStatus> {
        self.get(id).await.map(|h| h.status())
    }

    /// Buffered output, optionally limited to the newest `last_n` lines.
    pub async fn output(&self, id: &str, last_n: Option<usize>) -> Option<Vec<String>> {
        let handle = self.get(id).await?;
        let state = handle.state.lock().await;
        let skip = match last_n {
            Some(n) => state.output.len().saturating_sub(n),
            None => 0,
        };
        Some(state.output.iter().skip(skip).cloned().collect())
    }

    /// Wait for the handle to reach a terminal status.
    pub async fn wait(&self, id: &str) -> Option<ProcessStatus> {
        let handle = self.get(id).await?;
        let mut rx = handle.status.subscribe();
        let outcome = rx.wait_for(|s| s.is_terminal()).await.map(|s| *s);
        Some(outcome.unwrap_or_else(|_| handle.status()))
    }

    pub async fn info(&self, id: &str) -> Option<ProcessInfo> {
        match self.get(id).await {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        }
    }

    pub async fn list(&self) -> Vec<ProcessInfo> {
        let handles: Vec<_> = self.processes.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            infos.push(handle.snapshot().await);
        }
        infos.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        infos
    }

    /// Drop a terminal handle. Running handles are kept and `false` is
    /// returned.
    pub async fn cleanup(&self, id: &str) -> bool {
        let mut processes = self.processes.write().await;
        match processes.get(id) {
            Some(handle) if handle.status().is_terminal() => {
                processes.remove(id);
                tracing::debug!(process_id = %id, "Process handle removed");
                true
            }
            _ => false,
        }
    }

    /// Cancel every live handle and wait for them to stop.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down process supervisor");
        self.cancel.cancel();

        let handles: Vec<_> = self.processes.read().await.values().cloned().collect();
        let limit = self.config.grace_period + Duration::from_secs(5);
        for handle in handles {
            let mut rx = handle.status.subscribe();
            if tokio::time::timeout(limit, rx.wait_for(|s| s.is_terminal()))
                .await
                .is_err()
            {
                tracing::warn!(process_id = %handle.id, "Process did not stop in time");
            }
        }

        tracing::info!("Process supervisor shut down complete");
    }

    async fn get(&self, id: &str) -> Option<Arc<ProcessHandle>> {
        self.processes.read().await.get(id).cloned()
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Read `pipe` line by line into the handle buffer and the stream.
async fn read_lines<R>(handle: Arc<ProcessHandle>, pipe: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    let mut forwarding = true;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                handle.push_line(line.clone()).await;
                if forwarding && tx.send(line).await.is_err() {
                    // Consumer went away; keep buffering.
                    forwarding = false;
                }
            }
            Err(e) => {
                tracing::warn!(process_id = %handle.id, error = %e, "Output read failed");
                break;
            }
        }
    }
}

/// Own the child until it reaches a terminal status.
async fn monitor(handle: Arc<ProcessHandle>, mut child: Child, config: SupervisorConfig) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = handle.cancel.cancelled() => {
                let code = terminate(&mut child, config.grace_period).await;
                handle.finish(ProcessStatus::Cancelled, code).await;
                return;
            }
            _ = ticker.tick() => {
                match child.try_wait() {
                    Ok(Some(exit)) => {
                        let next = if exit.success() {
                            ProcessStatus::Completed
                        } else {
                            ProcessStatus::Failed
                        };
                        // Background children of the shell die with it.
                        if let Some(pid) = handle.pid {
                            signal::kill_group(pid);
                        }
                        handle.finish(next, exit.code()).await;
                        return;
                    }
                    Ok(None) => {
                        if let Some(limit) = handle.timeout {
                            if started.elapsed() >= limit {
                                tracing::warn!(
                                    process_id = %handle.id,
                                    timeout_secs = limit.as_secs_f64(),
                                    "Process timed out, killing",
                                );
                                let code = kill(&mut child).await;
                                handle.finish(ProcessStatus::TimedOut, code).await;
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(process_id = %handle.id, error = %e, "Failed to poll process");
                        let code = kill(&mut child).await;
                        handle.finish(ProcessStatus::Failed, code).await;
                        return;
                    }
                }
            }
        }
    }
}

/// SIGTERM the group, then SIGKILL if it outlives `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> Option<i32> {
    let signalled = child.id().map(signal::terminate_group).unwrap_or(false);
    if !signalled {
        return kill(child).await;
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(exit)) => exit.code(),
        _ => kill(child).await,
    }
}

/// SIGKILL the group and reap the leader.
async fn kill(child: &mut Child) -> Option<i32> {
    let signalled = child.id().map(signal::kill_group).unwrap_or(false);
    if !signalled {
        let _ = child.start_kill();
    }
    child.wait().await.ok().and_then(|exit| exit.code())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: Duration::from_millis(20),
            grace_period: Duration::from_millis(500),
            buffer_lines: 3,
            stream_capacity: 4,
            drain_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn buffer_keeps_newest_lines() {
        let sup = ProcessSupervisor::new(fast_config());
        let mut stream = sup
            .start("ring", ProcessSpec::new("for i in 1 2 3 4 5; do echo $i; done"))
            .await
            .expect("start");
        while stream.next_line().await.is_some() {}

        assert_eq!(sup.wait("ring").await, Some(ProcessStatus::Completed));
        let lines = sup.output("ring", None).await.expect("output");
        assert_eq!(lines, vec!["3", "4", "5"]);
        let last = sup.output("ring", Some(1)).await.expect("output");
        assert_eq!(last, vec!["5"]);
    }

    #[tokio::test]
    async fn finish_never_overwrites_terminal_status() {
        let sup = ProcessSupervisor::new(fast_config());
        let _stream = sup.start("final", ProcessSpec::new("true")).await.expect("start");
        assert_eq!(sup.wait("final").await, Some(ProcessStatus::Completed));

        let handle = sup.get("final").await.expect("handle");
        assert!(!handle.finish(ProcessStatus::Failed, Some(1)).await);
        assert_eq!(handle.status(), ProcessStatus::Completed);
    }

    #[tokio::test]
    async fn dropped_stream_keeps_buffering() {
        let sup = ProcessSupervisor::new(SupervisorConfig {
            buffer_lines: 100,
            stream_capacity: 1,
            ..fast_config()
        });
        let stream = sup
            .start("dropped", ProcessSpec::new("for i in $(seq 1 20); do echo $i; done"))
            .await
            .expect("start");
        drop(stream);

        assert_eq!(sup.wait("dropped").await, Some(ProcessStatus::Completed));
        // Readers may still be draining the pipe right after exit.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let lines = sup.output("dropped", None).await.expect("output");
        assert_eq!(lines.len(), 20);
    }
}
