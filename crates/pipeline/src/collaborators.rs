//! Traits for the systems a job touches outside this crate.
//!
//! Only [`WorkspaceProvider::checkout_exists`] gates a job; every other
//! collaborator failure is logged as a warning and the job carries on.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use buildcast_core::artifacts::Artifact;
use buildcast_core::status::JobStatus;
use serde::Serialize;
use tokio::process::Command;

/// Failure reported by a collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Terminal summary of a job, handed to the recorder and notifier.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub owner: String,
    pub status: JobStatus,
    pub device_name: String,
    /// Human-readable run time, e.g. `"1h 12m"`.
    pub duration: String,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
}

/// Head commit of a checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// Abbreviated hash (8 characters).
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

/// What a [`WorkspaceProvider`] can tell about an existing checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryInfo {
    pub branch: Option<String>,
    pub last_commit: Option<CommitInfo>,
}

impl JobOutcome {
    pub fn success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source checkout management.
#[async_trait]
pub trait WorkspaceProvider: Send + Sync {
    /// Whether `path` holds a usable checkout.
    async fn checkout_exists(&self, path: &Path) -> bool;

    async fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        branch: Option<&str>,
    ) -> Result<(), CollaboratorError>;

    async fn pull(&self, path: &Path) -> Result<(), CollaboratorError>;

    /// Branch and head commit of the checkout at `path`.
    async fn describe(&self, _path: &Path) -> Result<RepositoryInfo, CollaboratorError> {
        Ok(RepositoryInfo::default())
    }
}

/// Writes the job's build configuration into the checkout.
#[async_trait]
pub trait ConfigApplier: Send + Sync {
    async fn apply(
        &self,
        owner: &str,
        config: &serde_json::Value,
        checkout: &Path,
    ) -> Result<(), CollaboratorError>;
}

/// Per-owner build session bookkeeping.
#[async_trait]
pub trait SessionRecorder: Send + Sync {
    /// Returns the new session id.
    async fn begin_session(
        &self,
        owner: &str,
        job_id: &str,
        config: &serde_json::Value,
    ) -> Result<String, CollaboratorError>;

    async fn end_session(
        &self,
        session_id: &str,
        success: bool,
        outcome: &JobOutcome,
    ) -> Result<(), CollaboratorError>;
}

/// Out-of-band notification (e.g. email) when a job finishes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner: &str, outcome: &JobOutcome) -> Result<(), CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The collaborators handed to the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub workspace: Arc<dyn WorkspaceProvider>,
    pub config_applier: Arc<dyn ConfigApplier>,
    pub recorder: Arc<dyn SessionRecorder>,
    pub notifier: Arc<dyn Notifier>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            workspace: Arc::new(LocalGitWorkspace::default()),
            config_applier: Arc::new(NoopConfigApplier),
            recorder: Arc::new(NoopSessionRecorder),
            notifier: Arc::new(NoopNotifier),
        }
    }
}

// ---------------------------------------------------------------------------
// Local git checkout
// ---------------------------------------------------------------------------

/// Default git timeout for clone and pull.
const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// [`WorkspaceProvider`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct LocalGitWorkspace {
    pub timeout: Duration,
}

impl Default for LocalGitWorkspace {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }
}

impl LocalGitWorkspace {
    async fn git(&self, args: &[&str], cwd: Option<&Path>) -> Result<(), CollaboratorError> {
        self.git_output(args, cwd).await.map(|_| ())
    }

    /// Run git and return its trimmed stdout.
    async fn git_output(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<String, CollaboratorError> {
        let mut cmd = Command::new("git");
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        tracing::info!(args = ?args, "Running git");
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(Ok(output)) => Err(CollaboratorError(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Ok(Err(e)) => Err(CollaboratorError(format!("failed to run git: {e}"))),
            Err(_) => Err(CollaboratorError(format!(
                "git {} timed out",
                args.first().copied().unwrap_or_default()
            ))),
        }
    }
}

#[async_trait]
impl WorkspaceProvider for LocalGitWorkspace {
    async fn checkout_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path.join(".git")).await.unwrap_or(false)
    }

    async fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        branch: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CollaboratorError(format!("cannot create {}: {e}", parent.display())))?;
        }
        let target = path.to_string_lossy();
        let mut args = vec!["clone", "--depth", "1"];
        if let Some(branch) = branch {
            args.extend(["--branch", branch]);
        }
        args.extend([url, target.as_ref()]);
        self.git(&args, None).await
    }

    async fn pull(&self, path: &Path) -> Result<(), CollaboratorError> {
        self.git(&["pull", "--ff-only"], Some(path)).await
    }

    async fn describe(&self, path: &Path) -> Result<RepositoryInfo, CollaboratorError> {
        let branch = self
            .git_output(&["branch", "--show-current"], Some(path))
            .await?;
        let log = self
            .git_output(
                &["log", "-1", "--format=%H%x1f%an%x1f%ad%x1f%s", "--date=short"],
                Some(path),
            )
            .await
            .ok();
        Ok(RepositoryInfo {
            branch: Some(branch).filter(|b| !b.is_empty()),
            last_commit: log.as_deref().and_then(parse_commit_line),
        })
    }
}

/// Parse hash, author, date and subject separated by `0x1f`, subject last.
fn parse_commit_line(line: &str) -> Option<CommitInfo> {
    let mut fields = line.splitn(4, '\x1f');
    let hash = fields.next().filter(|h| !h.is_empty())?;
    let author = fields.next().unwrap_or_default();
    let date = fields.next().unwrap_or_default();
    let message = fields.next().unwrap_or_default();
    Some(CommitInfo {
        hash: hash.chars().take(8).collect(),
        message: message.to_string(),
        author: author.to_string(),
        date: date.to_string(),
    })
}

// ---------------------------------------------------------------------------
// No-op implementations
// ---------------------------------------------------------------------------

pub struct NoopConfigApplier;

#[async_trait]
impl ConfigApplier for NoopConfigApplier {
    async fn apply(
        &self,
        _owner: &str,
        _config: &serde_json::Value,
        _checkout: &Path,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

pub struct NoopSessionRecorder;

#[async_trait]
impl SessionRecorder for NoopSessionRecorder {
    async fn begin_session(
        &self,
        _owner: &str,
        job_id: &str,
        _config: &serde_json::Value,
    ) -> Result<String, CollaboratorError> {
        Ok(format!("session_{job_id}"))
    }

    async fn end_session(
        &self,
        _session_id: &str,
        _success: bool,
        _outcome: &JobOutcome,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _owner: &str, _outcome: &JobOutcome) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkout_exists_requires_git_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let workspace = LocalGitWorkspace::default();
        assert!(!workspace.checkout_exists(dir.path()).await);

        std::fs::create_dir(dir.path().join(".git")).expect("mkdir");
        assert!(workspace.checkout_exists(dir.path()).await);
    }

    #[test]
    fn parses_git_log_line() {
        let commit = parse_commit_line(
            "0123456789abcdef\x1fJane Doe\x1f2024-05-01\x1fUpdate feeds | luci",
        )
        .expect("commit");
        assert_eq!(commit.hash, "01234567");
        assert_eq!(commit.author, "Jane Doe");
        assert_eq!(commit.date, "2024-05-01");
        assert_eq!(commit.message, "Update feeds | luci");
        assert!(parse_commit_line("").is_none());
    }

    #[tokio::test]
    async fn noop_recorder_derives_session_id() {
        let recorder = NoopSessionRecorder;
        let id = recorder
            .begin_session("alice", "compile_alice_1", &serde_json::json!({}))
            .await
            .expect("session");
        assert_eq!(id, "session_compile_alice_1");
    }
}
