//! Runner configuration
//!
//! Defines all configurable parameters for the runner including
//! polling intervals, registration settings, and orchestrator connection settings.

use gantry_core::domain::runner::RunnerScope;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Runner configuration
///
/// All intervals are configurable to allow tuning for different deployment
/// scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Orchestrator base URL (e.g., "http://localhost:8080")
    pub orchestrator_url: String,

    /// Token of an already registered runner; registers a new one when absent
    pub token: Option<String>,

    /// Description used when registering
    pub description: String,

    /// Tags advertised when registering
    pub tags: BTreeSet<String>,

    pub run_untagged: bool,

    pub scope: RunnerScope,

    /// How often to poll the orchestrator for new jobs
    pub poll_interval: Duration,

    /// How often to send buffered trace entries to the orchestrator
    pub log_send_interval: Duration,

    /// How often to send heartbeats
    pub heartbeat_interval: Duration,

    /// Max parallel jobs the runner can handle
    pub max_parallel_jobs: usize,

    /// Parent directory of per-job working directories
    pub builds_dir: PathBuf,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(orchestrator_url: String) -> Self {
        Self {
            orchestrator_url,
            token: None,
            description: hostname_or_default(),
            tags: BTreeSet::new(),
            run_untagged: true,
            scope: RunnerScope::Shared,
            poll_interval: Duration::from_secs(5),
            log_send_interval: Duration::from_secs(3),
            heartbeat_interval: Duration::from_secs(30),
            max_parallel_jobs: 2,
            builds_dir: std::env::temp_dir().join("gantry-builds"),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - GANTRY_URL (optional, default: http://localhost:8080)
    /// - GANTRY_RUNNER_TOKEN (optional, registers a new runner when unset)
    /// - GANTRY_RUNNER_DESCRIPTION (optional, default: hostname)
    /// - GANTRY_RUNNER_TAGS (optional, comma separated)
    /// - GANTRY_RUNNER_RUN_UNTAGGED (optional, default: true)
    /// - GANTRY_RUNNER_SCOPE (optional, "shared" or comma separated project ids)
    /// - POLL_INTERVAL (optional, seconds, default: 5)
    /// - LOG_SEND_INTERVAL (optional, seconds, default: 3)
    /// - HEARTBEAT_INTERVAL (optional, seconds, default: 30)
    /// - MAX_PARALLEL_JOBS (optional, default: 2)
    /// - GANTRY_BUILDS_DIR (optional, default: $TMPDIR/gantry-builds)
    pub fn from_env() -> anyhow::Result<Self> {
        let orchestrator_url = std::env::var("GANTRY_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let defaults = Self::new(orchestrator_url);

        let scope = match std::env::var("GANTRY_RUNNER_SCOPE") {
            Ok(value) => parse_scope(&value)?,
            Err(_) => defaults.scope.clone(),
        };

        let run_untagged = match std::env::var("GANTRY_RUNNER_RUN_UNTAGGED") {
            Ok(value) => parse_bool(&value).ok_or_else(|| {
                anyhow::anyhow!("GANTRY_RUNNER_RUN_UNTAGGED must be true or false")
            })?,
            Err(_) => defaults.run_untagged,
        };

        Ok(Self {
            token: std::env::var("GANTRY_RUNNER_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            description: std::env::var("GANTRY_RUNNER_DESCRIPTION")
                .unwrap_or(defaults.description.clone()),
            tags: std::env::var("GANTRY_RUNNER_TAGS")
                .map(|s| parse_tags(&s))
                .unwrap_or_default(),
            run_untagged,
            scope,
            poll_interval: env_secs("POLL_INTERVAL").unwrap_or(defaults.poll_interval),
            log_send_interval: env_secs("LOG_SEND_INTERVAL").unwrap_or(defaults.log_send_interval),
            heartbeat_interval: env_secs("HEARTBEAT_INTERVAL")
                .unwrap_or(defaults.heartbeat_interval),
            max_parallel_jobs: std::env::var("MAX_PARALLEL_JOBS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.max_parallel_jobs),
            builds_dir: std::env::var("GANTRY_BUILDS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.builds_dir.clone()),
            ..defaults
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.orchestrator_url.is_empty() {
            anyhow::bail!("orchestrator_url cannot be empty");
        }

        if !self.orchestrator_url.starts_with("http://")
            && !self.orchestrator_url.starts_with("https://")
        {
            anyhow::bail!("orchestrator_url must start with http:// or https://");
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.log_send_interval.as_secs() == 0 {
            anyhow::bail!("log_send_interval must be greater than 0");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if !self.run_untagged && self.tags.is_empty() {
            anyhow::bail!("a runner without tags must run untagged jobs");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string())
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_tags(value: &str) -> BTreeSet<String> {
    value.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// `shared`, or a comma separated list of project ids
fn parse_scope(value: &str) -> anyhow::Result<RunnerScope> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("shared") {
        return Ok(RunnerScope::Shared);
    }

    let project_ids = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| anyhow::anyhow!("invalid project id in scope: {}", s))
        })
        .collect::<anyhow::Result<BTreeSet<Uuid>>>()?;

    Ok(RunnerScope::Project { project_ids })
}

fn hostname_or_default() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "gantry-runner".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.scope, RunnerScope::Shared);
        assert!(config.run_untagged);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.orchestrator_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.orchestrator_url = "http://localhost:8080".to_string();
        config.run_untagged = false;
        assert!(config.validate().is_err());

        config.tags.insert("docker".to_string());
        assert!(config.validate().is_ok());

        config.max_parallel_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(" docker, linux,,gpu ");
        assert_eq!(tags.len(), 3);
        assert!(tags.contains("linux"));
    }

    #[test]
    fn test_parse_scope() {
        assert_eq!(parse_scope("shared").unwrap(), RunnerScope::Shared);

        let id = Uuid::new_v4();
        match parse_scope(&format!("{}", id)).unwrap() {
            RunnerScope::Project { project_ids } => assert!(project_ids.contains(&id)),
            other => panic!("unexpected scope {:?}", other),
        }

        assert!(parse_scope("not-a-uuid").is_err());
    }
}
