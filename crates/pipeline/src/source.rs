//! Per-owner source checkout management: clone, feed update, pull, status.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildcast_core::job_events::{
    EVENT_CLONE_COMPLETE, EVENT_CLONE_ERROR, EVENT_CLONE_PROGRESS, EVENT_FEEDS_LOG,
};
use buildcast_core::status::ProcessStatus;
use buildcast_events::{EventBus, Priority};
use buildcast_process::{ProcessSpec, ProcessSupervisor};
use serde::Serialize;
use serde_json::json;

use crate::collaborators::{RepositoryInfo, WorkspaceProvider};
use crate::config::PipelineConfig;
use crate::error::SourceError;
use crate::orchestrator::is_safe_owner;

/// Result of [`SourceManager::clone_source`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CloneOutcome {
    /// A checkout was already present and `force` was not set.
    AlreadyPresent { path: PathBuf },
    Cloned { path: PathBuf },
}

/// Feed list file inside a checkout.
const FEEDS_CONF: &str = "feeds.conf.default";

/// Result of [`SourceManager::status`].
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStatus {
    pub owner: String,
    pub path: PathBuf,
    pub exists: bool,
    pub repo_url: String,
    /// Branch and head commit; `None` when there is no checkout or git
    /// could not describe it.
    pub repository: Option<RepositoryInfo>,
}

pub struct SourceManager {
    supervisor: Arc<ProcessSupervisor>,
    bus: Arc<EventBus>,
    workspace: Arc<dyn WorkspaceProvider>,
    config: PipelineConfig,
}

impl SourceManager {
    pub fn new(
        config: PipelineConfig,
        supervisor: Arc<ProcessSupervisor>,
        bus: Arc<EventBus>,
        workspace: Arc<dyn WorkspaceProvider>,
    ) -> Self {
        Self {
            supervisor,
            bus,
            workspace,
            config,
        }
    }

    fn checkout(&self, owner: &str) -> Result<PathBuf, SourceError> {
        if !is_safe_owner(owner) {
            return Err(SourceError::InvalidOwner(owner.to_string()));
        }
        Ok(self.config.checkout_dir(owner))
    }

    async fn emit(&self, event: &str, owner: &str, priority: Priority, payload: serde_json::Value) {
        let target = self.config.event_scope.target_for(owner);
        self.bus.publish(event, payload, priority, target).await;
    }

    /// Clone the configured repository into the owner's checkout.
    ///
    /// An existing checkout is kept unless `force` is set, in which case it
    /// is removed and cloned again.
    pub async fn clone_source(&self, owner: &str, force: bool) -> Result<CloneOutcome, SourceError> {
        let path = self.checkout(owner)?;

        if self.workspace.checkout_exists(&path).await {
            if !force {
                return Ok(CloneOutcome::AlreadyPresent { path });
            }
            tracing::info!(owner, path = %path.display(), "Removing existing checkout");
            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                let message = format!("failed to remove existing checkout: {e}");
                self.emit(
                    EVENT_CLONE_ERROR,
                    owner,
                    Priority::High,
                    json!({ "owner": owner, "success": false, "message": message }),
                )
                .await;
                return Err(SourceError::Io(e));
            }
        }

        self.emit(
            EVENT_CLONE_PROGRESS,
            owner,
            Priority::High,
            json!({
                "owner": owner,
                "progress": 0,
                "message": format!("Cloning {}", self.config.repo_url),
            }),
        )
        .await;

        let result = self
            .workspace
            .clone_repo(&self.config.repo_url, &path, self.config.branch.as_deref())
            .await;

        match result {
            Ok(()) => {
                tracing::info!(owner, path = %path.display(), "Source cloned");
                self.emit(
                    EVENT_CLONE_PROGRESS,
                    owner,
                    Priority::High,
                    json!({ "owner": owner, "progress": 100, "message": "Clone finished" }),
                )
                .await;
                self.emit(
                    EVENT_CLONE_COMPLETE,
                    owner,
                    Priority::Normal,
                    json!({ "owner": owner, "success": true, "path": path }),
                )
                .await;
                Ok(CloneOutcome::Cloned { path })
            }
            Err(e) => {
                tracing::error!(owner, error = %e, "Source clone failed");
                self.emit(
                    EVENT_CLONE_ERROR,
                    owner,
                    Priority::High,
                    json!({ "owner": owner, "success": false, "message": e.to_string() }),
                )
                .await;
                Err(e.into())
            }
        }
    }

    /// Whether the owner's checkout exists and, if so, its branch and head
    /// commit.
    pub async fn status(&self, owner: &str) -> Result<RepositoryStatus, SourceError> {
        let path = self.checkout(owner)?;
        let exists = self.workspace.checkout_exists(&path).await;
        let repository = if exists {
            match self.workspace.describe(&path).await {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::warn!(owner, error = %e, "Failed to describe checkout");
                    None
                }
            }
        } else {
            None
        };

        Ok(RepositoryStatus {
            owner: owner.to_string(),
            path,
            exists,
            repo_url: self.config.repo_url.clone(),
            repository,
        })
    }

    /// Run the configured feed commands in order, stopping at the first
    /// one that does not complete.
    ///
    /// The configured extra feed, if any, is added to the feed list first.
    pub async fn update_feeds(&self, owner: &str) -> Result<(), SourceError> {
        let path = self.checkout(owner)?;
        if !self.workspace.checkout_exists(&path).await {
            return Err(SourceError::MissingCheckout(path));
        }

        if let Some(feed) = &self.config.extra_feed {
            if ensure_feed(&path, feed).await? {
                tracing::info!(owner, feed = %feed, "Extra feed source added");
                self.emit(
                    EVENT_FEEDS_LOG,
                    owner,
                    Priority::Normal,
                    json!({ "owner": owner, "line": format!("Added feed source: {feed}") }),
                )
                .await;
            }
        }

        for (index, command) in self.config.feed_commands.iter().enumerate() {
            let process_id = format!("feeds_{owner}_{index}");
            tracing::info!(owner, process_id = %process_id, command = %command, "Running feed command");

            let spec = ProcessSpec::new(command.clone())
                .working_dir(&path)
                .timeout(self.config.feed_timeout);
            let mut stream = self.supervisor.start(&process_id, spec).await?;
            while let Some(line) = stream.next_line().await {
                self.emit(
                    EVENT_FEEDS_LOG,
                    owner,
                    Priority::Normal,
                    json!({ "owner": owner, "process_id": process_id, "line": line }),
                )
                .await;
            }

            let status = self
                .supervisor
                .wait(&process_id)
                .await
                .unwrap_or(ProcessStatus::Failed);
            self.supervisor.cleanup(&process_id).await;
            if status != ProcessStatus::Completed {
                tracing::error!(owner, command = %command, status = %status, "Feed command failed");
                return Err(SourceError::Command {
                    command: command.clone(),
                    status,
                });
            }
        }

        tracing::info!(owner, "Feeds updated");
        Ok(())
    }

    /// Fast-forward the owner's checkout.
    pub async fn pull_source(&self, owner: &str) -> Result<(), SourceError> {
        let path = self.checkout(owner)?;
        if !self.workspace.checkout_exists(&path).await {
            return Err(SourceError::MissingCheckout(path));
        }
        self.workspace.pull(&path).await?;
        tracing::info!(owner, "Source updated");
        Ok(())
    }
}

/// Append `feed` to the checkout's feed list unless a feed with the same
/// name is already listed. Returns whether the file changed.
async fn ensure_feed(checkout: &Path, feed: &str) -> Result<bool, SourceError> {
    let Some(name) = feed.split_whitespace().nth(1) else {
        tracing::warn!(feed, "Ignoring malformed extra feed line");
        return Ok(false);
    };

    let conf = checkout.join(FEEDS_CONF);
    let current = match tokio::fs::read_to_string(&conf).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let listed = current
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .any(|line| line.split_whitespace().nth(1) == Some(name));
    if listed {
        return Ok(false);
    }

    let mut updated = current;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(feed.trim());
    updated.push('\n');
    tokio::fs::write(&conf, updated).await?;
    Ok(true)
}
