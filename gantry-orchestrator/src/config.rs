//! Orchestrator configuration
//!
//! Every tunable is an explicit field; services receive the config instead
//! of reading the environment themselves.

use gantry_core::domain::quota::QuotaPolicy;
use gantry_core::feature::FeatureSet;
use gantry_core::validation::{validate_expire_in, validate_timeout};
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Postgres connection string; the in-memory store is used when absent
    pub database_url: Option<String>,

    /// A runner without contact for this long is offline
    pub runner_offline_after: Duration,

    /// How often the maintenance loop runs
    pub maintenance_interval: Duration,

    /// Extra time granted past a job's timeout before the watchdog fails it
    pub timeout_grace: Duration,

    /// Used when neither the job nor the project sets a timeout
    pub default_job_timeout: Duration,

    /// Applied to artifacts uploaded without an expiry
    pub artifact_expire_in: Duration,

    pub quota_policy: QuotaPolicy,

    /// Count minutes of jobs on project runners too, not only shared ones
    pub quota_all_runners: bool,

    pub features: FeatureSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            runner_offline_after: Duration::from_secs(120),
            maintenance_interval: Duration::from_secs(30),
            timeout_grace: Duration::from_secs(60),
            default_job_timeout: Duration::from_secs(3600),
            artifact_expire_in: Duration::from_secs(30 * 24 * 3600),
            quota_policy: QuotaPolicy::default(),
            quota_all_runners: false,
            features: FeatureSet::default(),
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - GANTRY_BIND_ADDR (default: 0.0.0.0:8080)
    /// - DATABASE_URL (default: in-memory store)
    /// - GANTRY_RUNNER_OFFLINE_AFTER (seconds, default: 120)
    /// - GANTRY_MAINTENANCE_INTERVAL (seconds, default: 30)
    /// - GANTRY_TIMEOUT_GRACE (seconds, default: 60)
    /// - GANTRY_DEFAULT_JOB_TIMEOUT (seconds, default: 3600)
    /// - GANTRY_ARTIFACT_EXPIRE_IN (seconds, default: 30 days)
    /// - GANTRY_QUOTA_NEAR_LIMIT (ratio, default: 0.8)
    /// - GANTRY_QUOTA_ALL_RUNNERS (bool, default: false)
    /// - GANTRY_FEATURES (e.g. "-retry_resets_skipped")
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let near_limit_ratio = match std::env::var("GANTRY_QUOTA_NEAR_LIMIT") {
            Ok(value) => value
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("GANTRY_QUOTA_NEAR_LIMIT must be a number"))?,
            Err(_) => defaults.quota_policy.near_limit_ratio,
        };

        let features = match std::env::var("GANTRY_FEATURES") {
            Ok(value) => FeatureSet::parse_overrides(&value).map_err(|e| anyhow::anyhow!(e))?,
            Err(_) => defaults.features.clone(),
        };

        let quota_all_runners = std::env::var("GANTRY_QUOTA_ALL_RUNNERS")
            .ok()
            .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.quota_all_runners);

        Ok(Self {
            bind_addr: std::env::var("GANTRY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            runner_offline_after: env_secs("GANTRY_RUNNER_OFFLINE_AFTER")
                .unwrap_or(defaults.runner_offline_after),
            maintenance_interval: env_secs("GANTRY_MAINTENANCE_INTERVAL")
                .unwrap_or(defaults.maintenance_interval),
            timeout_grace: env_secs("GANTRY_TIMEOUT_GRACE").unwrap_or(defaults.timeout_grace),
            default_job_timeout: env_secs("GANTRY_DEFAULT_JOB_TIMEOUT")
                .unwrap_or(defaults.default_job_timeout),
            artifact_expire_in: env_secs("GANTRY_ARTIFACT_EXPIRE_IN")
                .unwrap_or(defaults.artifact_expire_in),
            quota_policy: QuotaPolicy { near_limit_ratio },
            quota_all_runners,
            features,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.runner_offline_after.as_secs() == 0 {
            anyhow::bail!("runner_offline_after must be greater than 0");
        }

        if self.maintenance_interval.as_secs() == 0 {
            anyhow::bail!("maintenance_interval must be greater than 0");
        }

        validate_timeout("default_job_timeout", self.default_job_timeout.as_secs())?;
        validate_expire_in(self.artifact_expire_in.as_secs())?;

        let ratio = self.quota_policy.near_limit_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            anyhow::bail!("quota near-limit ratio must be in (0, 1]");
        }

        Ok(())
    }

    pub fn runner_offline_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.runner_offline_after).unwrap_or(chrono::Duration::MAX)
    }

    pub fn timeout_grace_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.timeout_grace).unwrap_or(chrono::Duration::MAX)
    }
}
