//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::job::{ArtifactsSpec, Job, JobStatus, When};
use crate::validation::{
    Validate, ValidationError, validate_expire_in, validate_timeout, validate_variable_key,
};

/// Value shown in place of a masked variable
pub const MASKED_VALUE: &str = "[MASKED]";

/// Pipeline execution record
///
/// Structure shared between orchestrator (persists) and runner (reads variables).
/// `status` is derived from the pipeline's jobs and never set directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    pub source: PipelineSource,
    pub actor: Actor,
    pub status: PipelineStatus,
    /// Set when an allowed-to-fail job did not succeed
    pub warnings: bool,
    pub variables: Vec<Variable>,
    pub stages: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Aggregate pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Created,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    /// Blocked on a manual action that is not allowed to fail
    Manual,
}

impl PipelineStatus {
    pub const ALL: [PipelineStatus; 8] = [
        PipelineStatus::Created,
        PipelineStatus::Pending,
        PipelineStatus::Running,
        PipelineStatus::Success,
        PipelineStatus::Failed,
        PipelineStatus::Canceled,
        PipelineStatus::Skipped,
        PipelineStatus::Manual,
    ];

    pub fn is_complete(self) -> bool {
        matches!(
            self,
            PipelineStatus::Success
                | PipelineStatus::Failed
                | PipelineStatus::Canceled
                | PipelineStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Created => "created",
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Success => "success",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Canceled => "canceled",
            PipelineStatus::Skipped => "skipped",
            PipelineStatus::Manual => "manual",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown pipeline status '{}'", s))
    }
}

/// What caused a pipeline to be created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSource {
    Push,
    #[default]
    Web,
    Api,
    Trigger,
}

impl PipelineSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineSource::Push => "push",
            PipelineSource::Web => "web",
            PipelineSource::Api => "api",
            PipelineSource::Trigger => "trigger",
        }
    }
}

impl FromStr for PipelineSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(PipelineSource::Push),
            "web" => Ok(PipelineSource::Web),
            "api" => Ok(PipelineSource::Api),
            "trigger" => Ok(PipelineSource::Trigger),
            other => Err(format!("unknown pipeline source '{}'", other)),
        }
    }
}

/// Who started a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    User(Uuid),
    Trigger(Uuid),
}

/// A key/value pair injected into every job's environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub masked: bool,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            masked: false,
        }
    }

    pub fn masked(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            masked: true,
            ..Self::new(key, value)
        }
    }

    /// Copy safe to show in pipeline views
    pub fn redacted(&self) -> Variable {
        if self.masked {
            Variable {
                value: MASKED_VALUE.to_string(),
                ..self.clone()
            }
        } else {
            self.clone()
        }
    }
}

impl Validate for Variable {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_variable_key(&self.key)
    }
}

impl Pipeline {
    /// Records a newly computed aggregate status
    ///
    /// Returns the previous status when it changed.
    pub fn apply_status(
        &mut self,
        status: PipelineStatus,
        warnings: bool,
        now: DateTime<Utc>,
    ) -> Option<PipelineStatus> {
        self.warnings = warnings;

        if self.status == status {
            return None;
        }

        if status == PipelineStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }

        if status.is_complete() {
            self.finished_at = Some(now);
        } else {
            self.finished_at = None;
        }

        let previous = self.status;
        self.status = status;
        Some(previous)
    }

    /// Variables with masked values replaced
    pub fn redacted(&self) -> Pipeline {
        Pipeline {
            variables: self.variables.iter().map(Variable::redacted).collect(),
            ..self.clone()
        }
    }
}

// =============================================================================
// Pipeline Definition
// =============================================================================

/// Structured CI configuration for a project
///
/// Produced by an external configuration parser; stages execute in order and
/// the jobs of one stage execute concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub stages: Vec<StageDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub script: Vec<String>,
    #[serde(default)]
    pub when: When,
    /// Manual jobs default to allowed-to-fail
    #[serde(default)]
    pub allow_failure: Option<bool>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub artifacts: Option<ArtifactsSpec>,
}

impl JobDefinition {
    pub fn allows_failure(&self) -> bool {
        self.allow_failure.unwrap_or(self.when == When::Manual)
    }
}

impl PipelineDefinition {
    /// Names of the stages in execution order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// Instantiates one `created` job per definition entry
    pub fn build_jobs(
        &self,
        pipeline: &Pipeline,
        default_timeout_seconds: u64,
        now: DateTime<Utc>,
    ) -> Vec<Job> {
        let mut jobs = Vec::new();

        for (idx, stage) in self.stages.iter().enumerate() {
            for def in &stage.jobs {
                jobs.push(Job {
                    id: Uuid::new_v4(),
                    pipeline_id: pipeline.id,
                    project_id: pipeline.project_id,
                    name: def.name.clone(),
                    stage: stage.name.clone(),
                    stage_idx: idx as u32,
                    status: JobStatus::Created,
                    when: def.when,
                    allow_failure: def.allows_failure(),
                    tags: def.tags.clone(),
                    script: def.script.clone(),
                    timeout_seconds: def.timeout_seconds.unwrap_or(default_timeout_seconds),
                    artifacts: def.artifacts.clone(),
                    failure_reason: None,
                    exit_code: None,
                    runner_id: None,
                    retried_from: None,
                    retried: false,
                    created_at: now,
                    queued_at: None,
                    started_at: None,
                    finished_at: None,
                });
            }
        }

        jobs
    }
}

impl Validate for PipelineDefinition {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.stages.is_empty() {
            return Err(ValidationError::new("Pipeline definition has no stages"));
        }

        let mut stage_names = HashSet::new();
        let mut job_names = HashSet::new();

        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(ValidationError::new("Stage name cannot be empty"));
            }

            if !stage_names.insert(stage.name.as_str()) {
                return Err(ValidationError::new(format!(
                    "Stage '{}' is defined more than once",
                    stage.name
                )));
            }

            if stage.jobs.is_empty() {
                return Err(ValidationError::new(format!(
                    "Stage '{}' has no jobs",
                    stage.name
                )));
            }

            for job in &stage.jobs {
                job.validate()?;

                if !job_names.insert(job.name.as_str()) {
                    return Err(ValidationError::new(format!(
                        "Job name '{}' is used more than once",
                        job.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Validate for JobDefinition {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("Job name cannot be empty"));
        }

        if self.name.len() > 255 {
            return Err(ValidationError::new(
                "Job name is too long (max 255 characters)",
            ));
        }

        if self.script.iter().all(|line| line.trim().is_empty()) {
            return Err(ValidationError::new(format!(
                "Job '{}' has an empty script",
                self.name
            )));
        }

        if let Some(tag) = self.tags.iter().find(|t| t.trim().is_empty() || t.contains(',')) {
            return Err(ValidationError::new(format!(
                "Job '{}' has an invalid tag '{}'",
                self.name, tag
            )));
        }

        if let Some(timeout) = self.timeout_seconds {
            validate_timeout(&format!("Job '{}' timeout", self.name), timeout)?;
        }

        if let Some(artifacts) = &self.artifacts {
            if artifacts.path.trim().is_empty() || artifacts.path.starts_with('/') {
                return Err(ValidationError::new(format!(
                    "Job '{}' artifact path must be relative to the workspace",
                    self.name
                )));
            }
            if let Some(expire_in) = artifacts.expire_in_seconds {
                validate_expire_in(expire_in)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> PipelineDefinition {
        PipelineDefinition {
            stages: vec![
                StageDefinition {
                    name: "build".to_string(),
                    jobs: vec![JobDefinition {
                        name: "compile".to_string(),
                        script: vec!["make".to_string()],
                        when: When::OnSuccess,
                        allow_failure: None,
                        tags: BTreeSet::from(["linux".to_string()]),
                        timeout_seconds: None,
                        artifacts: None,
                    }],
                },
                StageDefinition {
                    name: "deploy".to_string(),
                    jobs: vec![JobDefinition {
                        name: "production".to_string(),
                        script: vec!["./deploy.sh".to_string()],
                        when: When::Manual,
                        allow_failure: None,
                        tags: BTreeSet::new(),
                        timeout_seconds: Some(120),
                        artifacts: None,
                    }],
                },
            ],
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            ref_name: "main".to_string(),
            sha: "abc123".to_string(),
            source: PipelineSource::Web,
            actor: Actor::User(Uuid::new_v4()),
            status: PipelineStatus::Created,
            warnings: false,
            variables: vec![],
            stages: vec![],
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_build_jobs_assigns_stages_in_order() {
        let pipeline = pipeline();
        let jobs = definition().build_jobs(&pipeline, 3600, Utc::now());

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].stage_idx, 0);
        assert_eq!(jobs[0].timeout_seconds, 3600);
        assert!(!jobs[0].allow_failure);
        assert_eq!(jobs[1].stage_idx, 1);
        assert_eq!(jobs[1].timeout_seconds, 120);
        assert!(jobs[1].allow_failure, "manual jobs allow failure by default");
        assert!(jobs.iter().all(|j| j.status == JobStatus::Created));
        assert!(jobs.iter().all(|j| j.pipeline_id == pipeline.id));
    }

    #[test]
    fn test_definition_rejects_duplicate_job_names() {
        let mut def = definition();
        def.stages[1].jobs[0].name = "compile".to_string();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_definition_rejects_empty_script() {
        let mut def = definition();
        def.stages[0].jobs[0].script = vec!["  ".to_string()];
        assert!(def.validate().is_err());
        assert!(definition().validate().is_ok());
    }

    #[test]
    fn test_definition_rejects_unbounded_timeouts() {
        let mut def = definition();
        def.stages[0].jobs[0].timeout_seconds = Some(100_000_000_000_000_000);
        assert!(def.validate().is_err());

        let mut def = definition();
        def.stages[0].jobs[0].artifacts = Some(ArtifactsSpec {
            path: "dist".to_string(),
            expire_in_seconds: Some(u64::MAX),
        });
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_apply_status_tracks_timestamps() {
        let mut pipeline = pipeline();
        let now = Utc::now();

        assert_eq!(
            pipeline.apply_status(PipelineStatus::Running, false, now),
            Some(PipelineStatus::Created)
        );
        assert_eq!(pipeline.started_at, Some(now));
        assert_eq!(pipeline.apply_status(PipelineStatus::Running, false, now), None);

        pipeline.apply_status(PipelineStatus::Success, true, now);
        assert!(pipeline.warnings);
        assert_eq!(pipeline.finished_at, Some(now));

        pipeline.apply_status(PipelineStatus::Running, false, now);
        assert_eq!(pipeline.finished_at, None);
    }

    #[test]
    fn test_redacted_hides_masked_values() {
        let mut pipeline = pipeline();
        pipeline.variables = vec![
            Variable::masked("TRIGGER_KEY_1", "secret"),
            Variable::new("PLAIN", "visible"),
        ];

        let redacted = pipeline.redacted();
        assert_eq!(redacted.variables[0].value, MASKED_VALUE);
        assert_eq!(redacted.variables[1].value, "visible");
        assert_eq!(pipeline.variables[0].value, "secret");
    }
}
