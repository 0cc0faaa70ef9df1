//! Serialized build job execution.
//!
//! [`JobOrchestrator`] accepts jobs through [`submit`](JobOrchestrator::submit)
//! and runs them on a single worker task, so at most one job is ever past
//! `Idle` and not yet terminal. Each job walks the [`Stage`] sequence;
//! command stages run through the [`ProcessSupervisor`] and their output is
//! recorded on the job, fed to the progress estimator and published on the
//! [`EventBus`].
//!
//! Cancelling a queued job finalizes it immediately. Cancelling the running
//! job trips its token; the worker then cancels the live process and
//! finalizes the job as `Cancelled`.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use buildcast_core::artifacts::{scan_artifacts, Artifact};
use buildcast_core::error::CoreError;
use buildcast_core::format::format_duration;
use buildcast_core::job_events::{
    EVENT_COMPILE_COMPLETED, EVENT_COMPILE_FAILED, EVENT_COMPILE_LOG, EVENT_COMPILE_PROGRESS,
    EVENT_COMPILE_STARTED, EVENT_COMPILE_STATUS,
};
use buildcast_core::progress::ProgressEstimator;
use buildcast_core::status::{JobStatus, ProcessStatus};
use buildcast_events::{EventBus, Priority};
use buildcast_process::{ProcessSpec, ProcessSupervisor};
use futures::FutureExt;
use serde_json::json;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{Collaborators, JobOutcome};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::job::{Job, JobSnapshot};
use crate::stages::Stage;

/// Owner names become path components, so only a safe alphabet is allowed.
pub fn is_safe_owner(owner: &str) -> bool {
    !owner.is_empty()
        && owner.len() <= 64
        && owner != "."
        && owner != ".."
        && owner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Longest `target` value accepted in a job config.
const MAX_TARGET_LEN: usize = 256;

/// The `target` config value is appended to a shell command line, so it is
/// limited to space-separated make targets and `VAR=value` words.
pub fn is_safe_target(target: &str) -> bool {
    target.len() <= MAX_TARGET_LEN
        && target
            .split(' ')
            .all(|word| !word.starts_with('-') && word.chars().all(is_target_char))
}

fn is_target_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '+' | '=' | ':' | ',')
}

/// How a job ended.
enum Terminal {
    Completed(Vec<Artifact>),
    Failed(String),
    Cancelled,
}

impl Terminal {
    fn status(&self) -> JobStatus {
        match self {
            Terminal::Completed(_) => JobStatus::Completed,
            Terminal::Failed(_) => JobStatus::Failed,
            Terminal::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// Single-worker build job runner.
pub struct JobOrchestrator {
    jobs: RwLock<HashMap<String, Job>>,
    queue_tx: mpsc::UnboundedSender<String>,
    current: RwLock<Option<String>>,
    supervisor: Arc<ProcessSupervisor>,
    bus: Arc<EventBus>,
    collaborators: Collaborators,
    config: PipelineConfig,
    /// Master token; every job token is a child of it.
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobOrchestrator {
    /// Create the orchestrator and spawn its worker task.
    pub fn start(
        config: PipelineConfig,
        supervisor: Arc<ProcessSupervisor>,
        bus: Arc<EventBus>,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            queue_tx,
            current: RwLock::new(None),
            supervisor,
            bus,
            collaborators,
            config,
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        });

        let handle = tokio::spawn(Arc::clone(&orchestrator).run_worker(queue_rx));
        if let Ok(mut worker) = orchestrator.worker.try_lock() {
            *worker = Some(handle);
        }

        tracing::info!(
            workspace_root = %orchestrator.config.workspace_root.display(),
            "Job orchestrator started",
        );
        orchestrator
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ---- public API ----

    /// Queue a new job for `owner`. Returns the job id.
    pub async fn submit(&self, owner: &str, config: serde_json::Value) -> Result<String, CoreError> {
        if !is_safe_owner(owner) {
            return Err(CoreError::Validation(format!("invalid owner name '{owner}'")));
        }
        if !config.is_object() {
            return Err(CoreError::Validation(
                "job config must be a JSON object".to_string(),
            ));
        }
        match config.get("target") {
            None | Some(serde_json::Value::Null) => {}
            Some(serde_json::Value::String(target)) if is_safe_target(target) => {}
            Some(serde_json::Value::String(target)) => {
                return Err(CoreError::Validation(format!(
                    "invalid build target '{target}'"
                )));
            }
            Some(_) => {
                return Err(CoreError::Validation(
                    "build target must be a string".to_string(),
                ));
            }
        }
        if self.cancel.is_cancelled() {
            return Err(CoreError::Conflict("orchestrator is shutting down".to_string()));
        }

        let id = format!(
            "compile_{owner}_{}_{}",
            chrono::Utc::now().timestamp(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let mut job = Job::new(
            id.clone(),
            owner.to_string(),
            config,
            self.config.output_lines,
            self.cancel.child_token(),
        );

        match self
            .collaborators
            .recorder
            .begin_session(owner, &id, &job.config)
            .await
        {
            Ok(session_id) => job.session_id = Some(session_id),
            Err(e) => {
                tracing::warn!(job_id = %id, owner, error = %e, "Failed to begin build session");
            }
        }

        self.jobs.write().await.insert(id.clone(), job);
        self.queue_tx
            .send(id.clone())
            .map_err(|_| CoreError::Internal("job worker is not running".to_string()))?;

        tracing::info!(job_id = %id, owner, "Job queued");
        Ok(id)
    }

    /// Cancel a queued or running job.
    pub async fn cancel(&self, job_id: &str) -> Result<(), CoreError> {
        let token = {
            let jobs = self.jobs.read().await;
            let job = jobs.get(job_id).ok_or_else(|| CoreError::NotFound {
                entity: "job",
                id: job_id.to_string(),
            })?;
            if job.status.is_terminal() {
                return Err(CoreError::Conflict(format!(
                    "job {job_id} already {}",
                    job.status
                )));
            }
            job.cancel.clone()
        };

        tracing::info!(job_id, "Cancelling job");
        token.cancel();
        // A queued job is finalized here; a running one by the worker.
        self.finalize(job_id, Terminal::Cancelled, JobStatus::Idle).await;
        Ok(())
    }

    pub async fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.read().await.get(job_id).map(Job::snapshot)
    }

    /// Every job, oldest first.
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().map(Job::snapshot).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Recorded output, optionally limited to the newest `last_n` lines.
    pub async fn output(&self, job_id: &str, last_n: Option<usize>) -> Option<Vec<String>> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(job_id)?;
        let skip = last_n.map_or(0, |n| job.output.len().saturating_sub(n));
        Some(job.output.iter().skip(skip).cloned().collect())
    }

    /// The job the worker is running, if any.
    pub async fn current(&self) -> Option<JobSnapshot> {
        let id = self.current.read().await.clone()?;
        self.get(&id).await
    }

    /// Jobs waiting for the worker.
    pub async fn queue_depth(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Idle)
            .count()
    }

    /// Drop terminal jobs. Returns how many were removed.
    pub async fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !job.status.is_terminal());
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned finished jobs");
        }
        removed
    }

    /// Cancel the running job, stop the worker and cancel every job still
    /// waiting in the queue.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job orchestrator");
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            let limit = self.supervisor.config().grace_period + Duration::from_secs(5);
            if tokio::time::timeout(limit, handle).await.is_err() {
                tracing::warn!("Job worker did not stop in time");
            }
        }

        let queued: Vec<String> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Idle)
            .map(|j| j.id.clone())
            .collect();
        if !queued.is_empty() {
            tracing::info!(count = queued.len(), "Cancelling queued jobs");
        }
        for job_id in queued {
            self.finalize(&job_id, Terminal::Cancelled, JobStatus::Idle)
                .await;
        }
        tracing::info!("Job orchestrator shut down complete");
    }

    // ---- worker ----

    async fn run_worker(self: Arc<Self>, mut queue_rx: mpsc::UnboundedReceiver<String>) {
        tracing::info!("Job worker started");
        loop {
            let job_id = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = queue_rx.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            let runnable = self
                .jobs
                .read()
                .await
                .get(&job_id)
                .is_some_and(|j| j.status == JobStatus::Idle);
            if !runnable {
                continue;
            }

            *self.current.write().await = Some(job_id.clone());
            let outcome = AssertUnwindSafe(self.execute(&job_id)).catch_unwind().await;
            if let Err(panic) = outcome {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(job_id = %job_id, reason = %reason, "Job worker panicked");
                let from = self.status_of(&job_id).await;
                self.finalize(&job_id, Terminal::Failed(format!("internal error: {reason}")), from)
                    .await;
            }
            *self.current.write().await = None;
        }
        tracing::info!("Job worker stopped");
    }

    async fn execute(&self, job_id: &str) {
        let Some((owner, config, token)) = self.jobs.read().await.get(job_id).map(|j| {
            (j.owner.clone(), j.config.clone(), j.cancel.clone())
        }) else {
            return;
        };

        let result = self.run_stages(job_id, &owner, &config, &token).await;
        let from = self.status_of(job_id).await;
        let terminal = match result {
            Ok(artifacts) => Terminal::Completed(artifacts),
            Err(StageError::Cancelled) => Terminal::Cancelled,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Job failed");
                Terminal::Failed(e.to_string())
            }
        };
        self.finalize(job_id, terminal, from).await;
    }

    async fn run_stages(
        &self,
        job_id: &str,
        owner: &str,
        config: &serde_json::Value,
        token: &CancellationToken,
    ) -> Result<Vec<Artifact>, StageError> {
        let checkout = self.config.checkout_dir(owner);

        // Prepare
        self.enter_stage(job_id, Stage::Prepare).await?;
        self.publish_job(job_id, EVENT_COMPILE_STARTED, Priority::High, |job| {
            json!({
                "job_id": job.id,
                "owner": job.owner,
                "status": job.status,
                "progress": job.progress,
                "device_name": job.device_name,
                "message": "Build started",
            })
        })
        .await;
        if !self.collaborators.workspace.checkout_exists(&checkout).await {
            return Err(StageError::Workspace(format!(
                "source checkout not found at {}",
                checkout.display()
            )));
        }
        clean_previous_build(&checkout).await;
        check_cancelled(token)?;

        // Download
        self.enter_stage(job_id, Stage::Download).await?;
        self.run_command_stage(
            job_id,
            token,
            Stage::Download,
            self.config.download_command_line(),
            &checkout,
            self.config.download_timeout,
        )
        .await?;

        // Configure
        self.enter_stage(job_id, Stage::Configure).await?;
        if let Err(e) = self
            .collaborators
            .config_applier
            .apply(owner, config, &checkout)
            .await
        {
            tracing::warn!(job_id, error = %e, "Build configuration not applied, continuing");
            self.record_line(
                job_id,
                format!("warning: build configuration not applied: {e}"),
                None,
            )
            .await;
        }
        check_cancelled(token)?;

        // Compile
        self.enter_stage(job_id, Stage::Compile).await?;
        let target = config.get("target").and_then(|v| v.as_str());
        self.run_command_stage(
            job_id,
            token,
            Stage::Compile,
            self.config.compile_command_line(target),
            &checkout,
            self.config.compile_timeout,
        )
        .await?;

        // Package
        self.enter_stage(job_id, Stage::Package).await?;
        let scan_root = checkout.clone();
        let artifacts = tokio::task::spawn_blocking(move || scan_artifacts(&scan_root))
            .await
            .map_err(|e| StageError::Io {
                stage: Stage::Package,
                source: std::io::Error::other(e.to_string()),
            })?
            .map_err(|source| StageError::Io {
                stage: Stage::Package,
                source,
            })?;
        check_cancelled(token)?;

        tracing::info!(job_id, artifacts = artifacts.len(), "Artifacts collected");
        Ok(artifacts)
    }

    /// Run one command stage to completion, recording and publishing output.
    async fn run_command_stage(
        &self,
        job_id: &str,
        token: &CancellationToken,
        stage: Stage,
        command: String,
        checkout: &Path,
        timeout: Duration,
    ) -> Result<(), StageError> {
        check_cancelled(token)?;

        let process_id = format!("{stage}_{job_id}");
        let spec = ProcessSpec::new(command)
            .working_dir(checkout)
            .timeout(timeout);
        let mut stream = self
            .supervisor
            .start(&process_id, spec)
            .await
            .map_err(|source| StageError::Spawn { stage, source })?;

        let start_progress = self.progress_of(job_id).await;
        let mut estimator = ProgressEstimator::starting_at(start_progress);
        let mut cancel_sent = false;

        loop {
            tokio::select! {
                line = stream.next_line() => match line {
                    Some(line) => self.record_line(job_id, line, Some(&mut estimator)).await,
                    None => break,
                },
                _ = token.cancelled(), if !cancel_sent => {
                    cancel_sent = true;
                    self.supervisor.cancel(&process_id).await;
                }
            }
        }

        let status = self
            .supervisor
            .wait(&process_id)
            .await
            .unwrap_or(ProcessStatus::Failed);
        let exit_code = self
            .supervisor
            .info(&process_id)
            .await
            .and_then(|info| info.exit_code);
        self.supervisor.cleanup(&process_id).await;

        match status {
            ProcessStatus::Completed => Ok(()),
            ProcessStatus::Cancelled => Err(StageError::Cancelled),
            ProcessStatus::TimedOut => Err(StageError::Timeout { stage, timeout }),
            _ if token.is_cancelled() => Err(StageError::Cancelled),
            _ => Err(StageError::Exit {
                stage,
                code: exit_code,
            }),
        }
    }

    // ---- job mutation helpers ----

    async fn status_of(&self, job_id: &str) -> JobStatus {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map_or(JobStatus::Idle, |j| j.status)
    }

    async fn progress_of(&self, job_id: &str) -> f64 {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map_or(0.0, |j| j.progress)
    }

    /// Move the job into `stage` and announce it.
    async fn enter_stage(&self, job_id: &str, stage: Stage) -> Result<(), StageError> {
        {
            let mut jobs = self.jobs.write().await;
            let Some(job) = jobs.get_mut(job_id) else {
                return Err(StageError::Cancelled);
            };
            let next = stage.status();
            if job.status == JobStatus::Cancelled || job.cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            if !job.status.can_transition_to(next) {
                return Err(StageError::InvalidTransition {
                    from: job.status,
                    to: next,
                });
            }
            job.status = next;
            if stage == Stage::Prepare {
                job.started_at = Some(chrono::Utc::now());
            }
            job.raise_progress(stage.progress_floor());
        }

        tracing::info!(job_id, stage = %stage, "Stage started");
        self.publish_job(job_id, EVENT_COMPILE_PROGRESS, Priority::High, |job| {
            json!({
                "job_id": job.id,
                "owner": job.owner,
                "status": job.status,
                "progress": job.progress,
                "stage": stage,
                "message": stage.message(),
            })
        })
        .await;
        Ok(())
    }

    /// Append one output line, publish it, and update progress.
    async fn record_line(
        &self,
        job_id: &str,
        line: String,
        estimator: Option<&mut ProgressEstimator>,
    ) {
        let estimate = estimator.and_then(|e| e.observe(&line));
        let (log_payload, progress_payload, target) = {
            let mut jobs = self.jobs.write().await;
            let Some(job) = jobs.get_mut(job_id) else {
                return;
            };
            let raised = estimate.and_then(|p| job.raise_progress(p));
            let log = json!({
                "job_id": job.id,
                "owner": job.owner,
                "line": line,
                "progress": job.progress,
            });
            let progress = raised.map(|p| {
                json!({
                    "job_id": job.id,
                    "owner": job.owner,
                    "status": job.status,
                    "progress": p,
                    "message": line,
                })
            });
            job.push_line(line);
            (log, progress, self.config.event_scope.target_for(&job.owner))
        };

        self.bus
            .publish(EVENT_COMPILE_LOG, log_payload, Priority::High, target.clone())
            .await;
        if let Some(payload) = progress_payload {
            self.bus
                .publish(EVENT_COMPILE_PROGRESS, payload, Priority::High, target)
                .await;
        }
    }

    /// Publish an event whose payload is built from the current job state.
    async fn publish_job<F>(&self, job_id: &str, event: &str, priority: Priority, build: F)
    where
        F: FnOnce(&Job) -> serde_json::Value,
    {
        let built = {
            let jobs = self.jobs.read().await;
            jobs.get(job_id).map(|job| {
                (
                    build(job),
                    self.config.event_scope.target_for(&job.owner),
                )
            })
        };
        if let Some((mut payload, target)) = built {
            if let Some(obj) = payload.as_object_mut() {
                obj.insert("timestamp".into(), json!(chrono::Utc::now()));
            }
            self.bus.publish(event, payload, priority, target).await;
        }
    }

    /// Apply a terminal status exactly once, then publish and notify.
    ///
    /// `expected` is the status the caller observed; the transition is
    /// skipped when the job has moved on (e.g. a queued job picked up by the
    /// worker between `cancel` reading and finalizing it).
    async fn finalize(&self, job_id: &str, terminal: Terminal, expected: JobStatus) {
        let next = terminal.status();
        let outcome = {
            let mut jobs = self.jobs.write().await;
            let Some(job) = jobs.get_mut(job_id) else {
                return;
            };
            if job.status.is_terminal() || job.status != expected {
                return;
            }
            if !job.status.can_transition_to(next) {
                tracing::error!(
                    job_id,
                    from = %job.status,
                    to = %next,
                    "Rejected terminal transition",
                );
                return;
            }

            job.status = next;
            job.ended_at = Some(chrono::Utc::now());
            match terminal {
                Terminal::Completed(artifacts) => {
                    job.progress = 100.0;
                    job.artifacts = artifacts;
                }
                Terminal::Failed(error) => job.error = Some(error),
                Terminal::Cancelled => {}
            }

            let elapsed = job
                .started_at
                .zip(job.ended_at)
                .and_then(|(start, end)| (end - start).to_std().ok())
                .unwrap_or_default();
            JobOutcome {
                job_id: job.id.clone(),
                owner: job.owner.clone(),
                status: job.status,
                device_name: job.device_name.clone(),
                duration: format_duration(elapsed),
                artifacts: job.artifacts.clone(),
                error: job.error.clone(),
            }
        };

        tracing::info!(
            job_id,
            status = %outcome.status,
            duration = %outcome.duration,
            "Job finished",
        );

        self.publish_job(job_id, EVENT_COMPILE_STATUS, Priority::High, |job| {
            json!({
                "job_id": job.id,
                "owner": job.owner,
                "status": job.status,
                "progress": job.progress,
                "started_at": job.started_at,
                "ended_at": job.ended_at,
                "error": job.error,
            })
        })
        .await;

        match outcome.status {
            JobStatus::Completed => {
                self.publish_job(job_id, EVENT_COMPILE_COMPLETED, Priority::Critical, |job| {
                    json!({
                        "job_id": job.id,
                        "owner": job.owner,
                        "device_name": job.device_name,
                        "duration": outcome.duration,
                        "artifacts": job.artifacts,
                    })
                })
                .await;
            }
            JobStatus::Failed => {
                self.publish_job(job_id, EVENT_COMPILE_FAILED, Priority::Critical, |job| {
                    json!({
                        "job_id": job.id,
                        "owner": job.owner,
                        "device_name": job.device_name,
                        "error": job.error,
                    })
                })
                .await;
            }
            _ => {}
        }

        self.close_out(job_id, &outcome).await;
    }

    /// End the recorder session and notify the owner.
    async fn close_out(&self, job_id: &str, outcome: &JobOutcome) {
        let session_id = self
            .jobs
            .read()
            .await
            .get(job_id)
            .and_then(|j| j.session_id.clone());

        if let Some(session_id) = session_id {
            if let Err(e) = self
                .collaborators
                .recorder
                .end_session(&session_id, outcome.success(), outcome)
                .await
            {
                tracing::warn!(job_id, session_id = %session_id, error = %e, "Failed to end build session");
            }
        }

        if let Err(e) = self
            .collaborators
            .notifier
            .notify(&outcome.owner, outcome)
            .await
        {
            tracing::warn!(job_id, owner = %outcome.owner, error = %e, "Failed to notify owner");
        }
    }
}

fn check_cancelled(token: &CancellationToken) -> Result<(), StageError> {
    if token.is_cancelled() {
        Err(StageError::Cancelled)
    } else {
        Ok(())
    }
}

/// Remove stale `bin/` and `tmp/` trees. Failures are logged only.
async fn clean_previous_build(checkout: &Path) {
    for dir in ["bin", "tmp"] {
        let path = checkout.join(dir);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed previous build output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to clean previous build")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_names_are_path_safe() {
        assert!(is_safe_owner("alice"));
        assert!(is_safe_owner("build-bot_2.0"));
        assert!(!is_safe_owner(""));
        assert!(!is_safe_owner(".."));
        assert!(!is_safe_owner("a/b"));
        assert!(!is_safe_owner("a b"));
    }

    #[test]
    fn targets_are_plain_make_words() {
        assert!(is_safe_target(""));
        assert!(is_safe_target("world"));
        assert!(is_safe_target("package/feeds/luci/compile V=s"));
        assert!(is_safe_target("target/linux/x86/image-1.0+git"));
        assert!(!is_safe_target("world; rm -rf ~"));
        assert!(!is_safe_target("$(reboot)"));
        assert!(!is_safe_target("`id`"));
        assert!(!is_safe_target("a|b"));
        assert!(!is_safe_target("world\nreboot"));
        assert!(!is_safe_target("--eval=x"));
        assert!(!is_safe_target(&"x".repeat(MAX_TARGET_LEN + 1)));
    }

    #[test]
    fn terminal_statuses() {
        assert_eq!(Terminal::Cancelled.status(), JobStatus::Cancelled);
        assert_eq!(Terminal::Failed(String::new()).status(), JobStatus::Failed);
        assert_eq!(
            Terminal::Completed(Vec::new()).status(),
            JobStatus::Completed
        );
    }
}
