//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::job::EventScope;

/// Default parallel jobs for `make download`.
pub const DEFAULT_DOWNLOAD_JOBS: u32 = 8;

/// Default wall-clock limit of the download stage (1 hour).
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default wall-clock limit of the compile stage (8 hours).
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(8 * 3600);

/// Default wall-clock limit of each feed command (30 minutes).
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(1800);

/// Settings for [`JobOrchestrator`](crate::JobOrchestrator) and
/// [`SourceManager`](crate::SourceManager).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which `users/<owner>/<source_dir>` checkouts live.
    pub workspace_root: PathBuf,
    /// Checkout directory name inside each owner's workspace.
    pub source_dir: String,
    pub repo_url: String,
    pub branch: Option<String>,

    /// Dependency-fetch command; `{jobs}` is replaced by `download_jobs`.
    pub download_command: String,
    pub download_jobs: u32,
    pub download_timeout: Duration,

    /// Build command; `{jobs}` is replaced by `compile_jobs`. The job's
    /// `target` config value, if any, is appended.
    pub compile_command: String,
    pub compile_jobs: u32,
    pub compile_timeout: Duration,

    /// Commands run in order by [`SourceManager::update_feeds`](crate::SourceManager::update_feeds).
    pub feed_commands: Vec<String>,
    pub feed_timeout: Duration,
    /// Extra `src-git <name> <url>` line that `update_feeds` appends to
    /// `feeds.conf.default` when no feed of that name is listed.
    pub extra_feed: Option<String>,

    /// Output lines retained per job.
    pub output_lines: usize,
    pub event_scope: EventScope,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("./workspace"),
            source_dir: "lede".to_string(),
            repo_url: "https://github.com/coolsnowwolf/lede".to_string(),
            branch: None,
            download_command: "make download -j{jobs}".to_string(),
            download_jobs: DEFAULT_DOWNLOAD_JOBS,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            compile_command: "make -j{jobs} V=s".to_string(),
            compile_jobs: default_compile_jobs(),
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            feed_commands: vec![
                "./scripts/feeds update -a".to_string(),
                "./scripts/feeds install -a".to_string(),
            ],
            feed_timeout: DEFAULT_FEED_TIMEOUT,
            extra_feed: None,
            output_lines: 50_000,
            event_scope: EventScope::Broadcast,
        }
    }
}

impl PipelineConfig {
    /// `<workspace_root>/users/<owner>/<source_dir>`.
    pub fn checkout_dir(&self, owner: &str) -> PathBuf {
        self.workspace_root
            .join("users")
            .join(owner)
            .join(&self.source_dir)
    }

    pub fn download_command_line(&self) -> String {
        self.download_command
            .replace("{jobs}", &self.download_jobs.to_string())
    }

    /// Build command line, with `target` appended when given.
    pub fn compile_command_line(&self, target: Option<&str>) -> String {
        let base = self
            .compile_command
            .replace("{jobs}", &self.compile_jobs.to_string());
        match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(target) => format!("{base} {target}"),
            None => base,
        }
    }
}

/// One build job per available core, falling back to 1.
pub fn default_compile_jobs() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
