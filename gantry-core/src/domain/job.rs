//! Job domain types
//!
//! A job is the smallest unit of CI work. Its status only moves along the
//! edges allowed by [`JobStatus::can_transition_to`]; terminal states are
//! left only by creating a new job through [`Job::retry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TransitionError;

/// Job execution record
///
/// Structure shared between orchestrator (persists) and runner (executes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub stage: String,
    pub stage_idx: u32,
    pub status: JobStatus,
    pub when: When,
    pub allow_failure: bool,
    pub tags: BTreeSet<String>,
    pub script: Vec<String>,
    pub timeout_seconds: u64,
    pub artifacts: Option<ArtifactsSpec>,
    pub failure_reason: Option<FailureReason>,
    pub exit_code: Option<i32>,
    pub runner_id: Option<Uuid>,
    /// The job this one replaces, when created by a retry
    pub retried_from: Option<Uuid>,
    /// Set once a newer job has replaced this one
    pub retried: bool,
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    /// Manual action waiting to be played
    Manual,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Created,
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Success,
        JobStatus::Failed,
        JobStatus::Canceled,
        JobStatus::Skipped,
        JobStatus::Manual,
    ];

    /// Returns true for states with no outgoing edge
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Returns true when the job holds a runner slot or waits for one
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// States that a pipeline cancellation sweeps to `canceled`
    pub fn is_cancelable(self) -> bool {
        matches!(
            self,
            JobStatus::Created | JobStatus::Pending | JobStatus::Running | JobStatus::Manual
        )
    }

    /// The lifecycle graph
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, to),
            (Created, Pending | Manual | Skipped | Canceled)
                | (Manual, Pending | Canceled)
                | (Skipped, Pending | Created)
                | (Pending, Running | Canceled | Skipped)
                | (Running, Success | Failed | Canceled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Skipped => "skipped",
            JobStatus::Manual => "manual",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status '{}'", s))
    }
}

/// When a job runs relative to the outcome of earlier stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum When {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
    Manual,
}

impl When {
    pub fn as_str(self) -> &'static str {
        match self {
            When::OnSuccess => "on_success",
            When::OnFailure => "on_failure",
            When::Always => "always",
            When::Manual => "manual",
        }
    }
}

impl FromStr for When {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_success" => Ok(When::OnSuccess),
            "on_failure" => Ok(When::OnFailure),
            "always" => Ok(When::Always),
            "manual" => Ok(When::Manual),
            other => Err(format!("unknown when value '{}'", other)),
        }
    }
}

/// Why a job ended in `failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ScriptFailure,
    ExecutionTimeout,
    RunnerSystemFailure,
    UnknownFailure,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::ScriptFailure => "script_failure",
            FailureReason::ExecutionTimeout => "execution_timeout",
            FailureReason::RunnerSystemFailure => "runner_system_failure",
            FailureReason::UnknownFailure => "unknown_failure",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "script_failure" => Ok(FailureReason::ScriptFailure),
            "execution_timeout" => Ok(FailureReason::ExecutionTimeout),
            "runner_system_failure" => Ok(FailureReason::RunnerSystemFailure),
            "unknown_failure" => Ok(FailureReason::UnknownFailure),
            other => Err(format!("unknown failure reason '{}'", other)),
        }
    }
}

/// Terminal outcome reported by the runner that executed a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    Failed { reason: FailureReason },
}

impl JobOutcome {
    pub fn status(self) -> JobStatus {
        match self {
            JobOutcome::Success => JobStatus::Success,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Artifact collected from the job workspace after a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsSpec {
    /// Path relative to the job workspace
    pub path: String,
    pub expire_in_seconds: Option<u64>,
}

impl Job {
    /// Moves the job to `to`, stamping the matching timestamp
    ///
    /// Returns the previous status.
    pub fn transition(
        &mut self,
        to: JobStatus,
        now: DateTime<Utc>,
    ) -> Result<JobStatus, TransitionError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition {
                job_id: self.id,
                from,
                to,
            });
        }

        match to {
            JobStatus::Pending => self.queued_at = Some(now),
            JobStatus::Running => self.started_at = Some(now),
            JobStatus::Created => {
                self.queued_at = None;
                self.finished_at = None;
            }
            status if status.is_terminal() || status == JobStatus::Skipped => {
                self.finished_at = Some(now)
            }
            _ => {}
        }

        self.status = to;
        Ok(from)
    }

    /// Builds the replacement job for a failed or canceled one
    ///
    /// The caller is responsible for marking `self` as retried once the new
    /// record is stored.
    pub fn retry(&self, now: DateTime<Utc>) -> Result<Job, TransitionError> {
        if self.retried {
            return Err(TransitionError::AlreadyRetried(self.id));
        }

        if !matches!(self.status, JobStatus::Failed | JobStatus::Canceled) {
            return Err(TransitionError::NotRetryable {
                job_id: self.id,
                status: self.status,
            });
        }

        Ok(Job {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            failure_reason: None,
            exit_code: None,
            runner_id: None,
            retried_from: Some(self.id),
            retried: false,
            created_at: now,
            queued_at: Some(now),
            started_at: None,
            finished_at: None,
            ..self.clone()
        })
    }

    pub fn is_manual(&self) -> bool {
        self.when == When::Manual
    }

    /// Whole minutes spent running, rounded up
    pub fn duration_minutes(&self) -> Option<u64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        let seconds = (finished - started).num_seconds().max(0) as u64;
        Some(seconds.div_ceil(60))
    }

    /// Returns true when the job has been running longer than its timeout
    pub fn timed_out(&self, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
        match (self.status, self.started_at) {
            (JobStatus::Running, Some(started)) => {
                let deadline = i64::try_from(self.timeout_seconds)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .and_then(|timeout| timeout.checked_add(&grace))
                    .and_then(|limit| started.checked_add_signed(limit));
                // A deadline past the representable range is never reached
                deadline.is_some_and(|deadline| now > deadline)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn job(name: &str, stage_idx: u32) -> Job {
        Job {
            id: Uuid::new_v4(),
            pipeline_id: Uuid::nil(),
            project_id: Uuid::nil(),
            name: name.to_string(),
            stage: format!("stage-{}", stage_idx),
            stage_idx,
            status: JobStatus::Created,
            when: When::OnSuccess,
            allow_failure: false,
            tags: BTreeSet::new(),
            script: vec!["true".to_string()],
            timeout_seconds: 3600,
            artifacts: None,
            failure_reason: None,
            exit_code: None,
            runner_id: None,
            retried_from: None,
            retried: false,
            created_at: Utc::now(),
            queued_at: None,
            started_at: None,
            finished_at: None,
        }
    }
}
