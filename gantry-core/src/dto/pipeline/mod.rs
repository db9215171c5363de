//! Pipeline DTOs for inter-service communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::{Pipeline, PipelineSource, PipelineStatus, Variable};
use crate::domain::quota::QuotaStatus;
use crate::dto::job::JobView;
use crate::validation::{Validate, ValidationError, validate_variables};

/// Request to create a new pipeline from the project's definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub user_id: Uuid,
    #[serde(default)]
    pub source: PipelineSource,
}

impl Validate for CreatePipeline {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.ref_name.trim().is_empty() {
            return Err(ValidationError::new("Ref cannot be empty"));
        }

        if self.sha.trim().is_empty() {
            return Err(ValidationError::new("Sha cannot be empty"));
        }

        if self.source == PipelineSource::Trigger {
            return Err(ValidationError::new(
                "Trigger pipelines are created through a trigger token",
            ));
        }

        validate_variables(&self.variables)
    }
}

/// Pipeline with its latest jobs and the namespace quota state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineView {
    #[serde(flatten)]
    pub pipeline: Pipeline,
    pub jobs: Vec<JobView>,
    pub quota_status: QuotaStatus,
    /// Present when the namespace is near or over its minute quota
    pub quota_warning: Option<String>,
}

/// Summary information about a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub id: Uuid,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    pub source: PipelineSource,
    pub status: PipelineStatus,
    pub warnings: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Pipeline> for PipelineSummary {
    fn from(pipeline: Pipeline) -> Self {
        PipelineSummary {
            id: pipeline.id,
            ref_name: pipeline.ref_name,
            sha: pipeline.sha,
            source: pipeline.source,
            status: pipeline.status,
            warnings: pipeline.warnings,
            created_at: pipeline.created_at,
            finished_at: pipeline.finished_at,
        }
    }
}
