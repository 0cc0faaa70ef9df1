use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use buildcast_pipeline::{EventScope, PipelineConfig};
use buildcast_process::SupervisorConfig;

/// Errors raised while reading [`ServerConfig`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// How often the heartbeat task runs.
    pub heartbeat_interval: Duration,
    /// Sessions silent for longer than this are evicted.
    pub heartbeat_timeout: Duration,
    pub pipeline: PipelineConfig,
    pub supervisor: SupervisorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
            pipeline: PipelineConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                               |
    /// |----------------------------|---------------------------------------|
    /// | `HOST`                     | `0.0.0.0`                             |
    /// | `PORT`                     | `3000`                                |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`               |
    /// | `HEARTBEAT_INTERVAL_SECS`  | `30`                                  |
    /// | `HEARTBEAT_TIMEOUT_SECS`   | `60`                                  |
    /// | `WORKSPACE_ROOT`           | `./workspace`                         |
    /// | `SOURCE_REPO_URL`          | `https://github.com/coolsnowwolf/lede`|
    /// | `SOURCE_BRANCH`            | (repository default)                  |
    /// | `DOWNLOAD_JOBS`            | `8`                                   |
    /// | `COMPILE_JOBS`             | available parallelism                 |
    /// | `DOWNLOAD_TIMEOUT_SECS`    | `3600`                                |
    /// | `COMPILE_TIMEOUT_SECS`     | `28800`                               |
    /// | `PROCESS_POLL_INTERVAL_MS` | `1000`                                |
    /// | `EXTRA_FEED`               | (none), e.g. `src-git istore <url>`   |
    /// | `EVENT_SCOPE`              | `broadcast` (or `owner_room`)         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut pipeline = defaults.pipeline;
        let mut supervisor = defaults.supervisor;

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse(&lookup, "PORT")?.unwrap_or(defaults.port);

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let heartbeat_interval = parse(&lookup, "HEARTBEAT_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_interval);
        let heartbeat_timeout = parse(&lookup, "HEARTBEAT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_timeout);

        if let Some(root) = lookup("WORKSPACE_ROOT") {
            pipeline.workspace_root = PathBuf::from(root);
        }
        if let Some(url) = lookup("SOURCE_REPO_URL") {
            pipeline.repo_url = url;
        }
        if let Some(branch) = lookup("SOURCE_BRANCH").filter(|b| !b.trim().is_empty()) {
            pipeline.branch = Some(branch);
        }
        if let Some(jobs) = parse(&lookup, "DOWNLOAD_JOBS")? {
            pipeline.download_jobs = jobs;
        }
        if let Some(jobs) = parse(&lookup, "COMPILE_JOBS")? {
            pipeline.compile_jobs = jobs;
        }
        if let Some(secs) = parse(&lookup, "DOWNLOAD_TIMEOUT_SECS")? {
            pipeline.download_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "COMPILE_TIMEOUT_SECS")? {
            pipeline.compile_timeout = Duration::from_secs(secs);
        }
        if let Some(feed) = lookup("EXTRA_FEED").filter(|f| !f.trim().is_empty()) {
            pipeline.extra_feed = Some(feed.trim().to_string());
        }
        if let Some(scope) = parse::<EventScope, _>(&lookup, "EVENT_SCOPE")? {
            pipeline.event_scope = scope;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, "PROCESS_POLL_INTERVAL_MS")? {
            supervisor.poll_interval = Duration::from_millis(ms.max(1));
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            heartbeat_interval,
            heartbeat_timeout,
            pipeline,
            supervisor,
        })
    }
}

fn parse<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(60));
        assert_eq!(config.pipeline.event_scope, EventScope::Broadcast);
        assert_eq!(config.supervisor.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("PORT", "8080"),
            ("CORS_ORIGINS", "http://a.test, ,http://b.test"),
            ("HEARTBEAT_TIMEOUT_SECS", "90"),
            ("WORKSPACE_ROOT", "/srv/builds"),
            ("SOURCE_BRANCH", "openwrt-23.05"),
            ("COMPILE_JOBS", "4"),
            ("COMPILE_TIMEOUT_SECS", "600"),
            ("PROCESS_POLL_INTERVAL_MS", "250"),
            ("EVENT_SCOPE", "owner_room"),
            ("EXTRA_FEED", " src-git istore https://github.com/linkease/istore;main "),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, ["http://a.test", "http://b.test"]);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(90));
        assert_eq!(config.pipeline.workspace_root, PathBuf::from("/srv/builds"));
        assert_eq!(config.pipeline.branch.as_deref(), Some("openwrt-23.05"));
        assert_eq!(config.pipeline.compile_jobs, 4);
        assert_eq!(config.pipeline.compile_timeout, Duration::from_secs(600));
        assert_eq!(config.supervisor.poll_interval, Duration::from_millis(250));
        assert_eq!(config.pipeline.event_scope, EventScope::OwnerRoom);
        assert_eq!(
            config.pipeline.extra_feed.as_deref(),
            Some("src-git istore https://github.com/linkease/istore;main")
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_matches!(
            load(&[("PORT", "http")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        );
        assert_matches!(
            load(&[("EVENT_SCOPE", "everyone")]),
            Err(ConfigError::Invalid { name: "EVENT_SCOPE", .. })
        );
    }
}
