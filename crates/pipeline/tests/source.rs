//! Integration tests for `SourceManager`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use buildcast_core::job_events::{
    EVENT_CLONE_COMPLETE, EVENT_CLONE_ERROR, EVENT_CLONE_PROGRESS, EVENT_FEEDS_LOG,
};
use buildcast_core::status::ProcessStatus;
use buildcast_events::{handler_fn, BusConfig, EventBus};
use buildcast_pipeline::collaborators::{
    CollaboratorError, CommitInfo, RepositoryInfo, WorkspaceProvider,
};
use buildcast_pipeline::{CloneOutcome, PipelineConfig, SourceError, SourceManager};
use buildcast_process::{ProcessSupervisor, SupervisorConfig};

/// Creates `.git` on clone; fails for URLs containing "broken".
#[derive(Default)]
struct FakeGit {
    pulls: Mutex<u32>,
}

#[async_trait]
impl WorkspaceProvider for FakeGit {
    async fn checkout_exists(&self, path: &Path) -> bool {
        path.join(".git").is_dir()
    }

    async fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        _branch: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        if url.contains("broken") {
            return Err(CollaboratorError::new("repository not found"));
        }
        std::fs::create_dir_all(path.join(".git")).map_err(|e| CollaboratorError::new(e.to_string()))
    }

    async fn pull(&self, _path: &Path) -> Result<(), CollaboratorError> {
        *self.pulls.lock().expect("pulls") += 1;
        Ok(())
    }

    async fn describe(&self, _path: &Path) -> Result<RepositoryInfo, CollaboratorError> {
        Ok(RepositoryInfo {
            branch: Some("master".to_string()),
            last_commit: Some(CommitInfo {
                hash: "0badc0de".to_string(),
                message: "Initial import".to_string(),
                ..CommitInfo::default()
            }),
        })
    }
}

struct Setup {
    manager: SourceManager,
    bus: Arc<EventBus>,
    git: Arc<FakeGit>,
    events: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    config: PipelineConfig,
    _dir: tempfile::TempDir,
}

async fn setup(repo_url: &str, feed_commands: &[&str]) -> Setup {
    setup_with(repo_url, feed_commands, None).await
}

async fn setup_with(repo_url: &str, feed_commands: &[&str], extra_feed: Option<&str>) -> Setup {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = PipelineConfig {
        workspace_root: dir.path().to_path_buf(),
        repo_url: repo_url.to_string(),
        feed_commands: feed_commands.iter().map(|c| c.to_string()).collect(),
        extra_feed: extra_feed.map(str::to_string),
        ..PipelineConfig::default()
    };
    let supervisor = Arc::new(ProcessSupervisor::new(SupervisorConfig {
        poll_interval: Duration::from_millis(20),
        ..SupervisorConfig::default()
    }));
    let bus = EventBus::start(BusConfig::default());
    let events = Arc::new(Mutex::new(Vec::new()));
    for event in [
        EVENT_CLONE_PROGRESS,
        EVENT_CLONE_COMPLETE,
        EVENT_CLONE_ERROR,
        EVENT_FEEDS_LOG,
    ] {
        let log = events.clone();
        bus.register_handler(
            event,
            handler_fn(move |msg| {
                log.lock()
                    .expect("events")
                    .push((msg.event.clone(), msg.payload.clone()));
                Ok(())
            }),
        )
        .await;
    }
    let git = Arc::new(FakeGit::default());
    let manager = SourceManager::new(config.clone(), supervisor, bus.clone(), git.clone());
    Setup {
        manager,
        bus,
        git,
        events,
        config,
        _dir: dir,
    }
}

async fn settle(bus: &EventBus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let q = bus.stats().await.queues;
            if q.critical + q.high + q.normal + q.low == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("bus did not drain");
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn clone_then_keep_then_force() {
    let s = setup("https://example.invalid/lede.git", &[]).await;
    let path = s.config.checkout_dir("alice");

    let outcome = s.manager.clone_source("alice", false).await.expect("clone");
    assert_eq!(outcome, CloneOutcome::Cloned { path: path.clone() });

    let outcome = s.manager.clone_source("alice", false).await.expect("clone");
    assert_eq!(outcome, CloneOutcome::AlreadyPresent { path: path.clone() });

    std::fs::write(path.join("local-change"), b"x").expect("write");
    let outcome = s.manager.clone_source("alice", true).await.expect("clone");
    assert_eq!(outcome, CloneOutcome::Cloned { path: path.clone() });
    assert!(!path.join("local-change").exists());

    settle(&s.bus).await;
    let names: Vec<String> = s
        .events
        .lock()
        .expect("events")
        .iter()
        .map(|(n, _)| n.clone())
        .collect();
    assert_eq!(
        names.iter().filter(|n| *n == EVENT_CLONE_COMPLETE).count(),
        2
    );
}

#[tokio::test]
async fn clone_failure_publishes_error() {
    let s = setup("https://example.invalid/broken.git", &[]).await;
    let err = s.manager.clone_source("alice", false).await.unwrap_err();
    assert_matches!(err, SourceError::Collaborator(_));

    settle(&s.bus).await;
    let events = s.events.lock().expect("events").clone();
    let (_, payload) = events
        .iter()
        .find(|(n, _)| n == EVENT_CLONE_ERROR)
        .expect("clone_error event");
    assert_eq!(payload["message"], "repository not found");
}

#[tokio::test]
async fn feeds_stream_output_and_stop_on_failure() {
    let s = setup(
        "https://example.invalid/lede.git",
        &["echo updating", "echo installing; exit 4", "echo never"],
    )
    .await;
    s.manager.clone_source("alice", false).await.expect("clone");

    let err = s.manager.update_feeds("alice").await.unwrap_err();
    assert_matches!(
        err,
        SourceError::Command { ref command, status: ProcessStatus::Failed }
            if command == "echo installing; exit 4"
    );

    settle(&s.bus).await;
    let lines: Vec<String> = s
        .events
        .lock()
        .expect("events")
        .iter()
        .filter(|(n, _)| n == EVENT_FEEDS_LOG)
        .filter_map(|(_, p)| p["line"].as_str().map(str::to_string))
        .collect();
    assert_eq!(lines, vec!["updating", "installing"]);
}

#[tokio::test]
async fn feeds_and_pull_require_checkout() {
    let s = setup("https://example.invalid/lede.git", &["true"]).await;
    assert_matches!(
        s.manager.update_feeds("alice").await,
        Err(SourceError::MissingCheckout(_))
    );
    assert_matches!(
        s.manager.pull_source("alice").await,
        Err(SourceError::MissingCheckout(_))
    );
    assert_matches!(
        s.manager.clone_source("../root", false).await,
        Err(SourceError::InvalidOwner(_))
    );

    s.manager.clone_source("alice", false).await.expect("clone");
    s.manager.update_feeds("alice").await.expect("feeds");
    s.manager.pull_source("alice").await.expect("pull");
    assert_eq!(*s.git.pulls.lock().expect("pulls"), 1);
}

#[tokio::test]
async fn status_reports_checkout_and_head() {
    let s = setup("https://example.invalid/lede.git", &[]).await;

    let status = s.manager.status("alice").await.expect("status");
    assert!(!status.exists);
    assert!(status.repository.is_none());
    assert_eq!(status.repo_url, "https://example.invalid/lede.git");

    s.manager.clone_source("alice", false).await.expect("clone");
    let status = s.manager.status("alice").await.expect("status");
    assert!(status.exists);
    assert_eq!(status.path, s.config.checkout_dir("alice"));
    let repository = status.repository.expect("repository info");
    assert_eq!(repository.branch.as_deref(), Some("master"));
    assert_eq!(repository.last_commit.expect("commit").hash, "0badc0de");

    assert_matches!(
        s.manager.status("../root").await,
        Err(SourceError::InvalidOwner(_))
    );
}

#[tokio::test]
async fn extra_feed_is_added_before_feed_commands() {
    let feed = "src-git istore https://github.com/linkease/istore;main";
    let s = setup_with(
        "https://example.invalid/lede.git",
        &["grep -c istore feeds.conf.default"],
        Some(feed),
    )
    .await;
    s.manager.clone_source("alice", false).await.expect("clone");
    let conf = s.config.checkout_dir("alice").join("feeds.conf.default");
    std::fs::write(&conf, "src-git packages https://example.org/packages.git\n").expect("write");

    s.manager.update_feeds("alice").await.expect("feeds");
    s.manager.update_feeds("alice").await.expect("feeds again");

    let text = std::fs::read_to_string(&conf).expect("read");
    assert_eq!(text.matches("istore").count(), 2, "feed line added once: {text}");

    settle(&s.bus).await;
    let lines: Vec<String> = s
        .events
        .lock()
        .expect("events")
        .iter()
        .filter(|(n, _)| n == EVENT_FEEDS_LOG)
        .filter_map(|(_, p)| p["line"].as_str().map(str::to_string))
        .collect();
    assert_eq!(
        lines,
        vec![format!("Added feed source: {feed}"), "1".to_string(), "1".to_string()]
    );
}
