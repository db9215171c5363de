//! Store Module
//!
//! Data access layer for the orchestrator. The store is the single source of
//! truth; services never cache entities between calls.
//!
//! Two implementations exist: [`memory::MemoryStore`] for tests and
//! single-node use, and [`postgres::PgStore`] backed by sqlx.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::job::{Job, JobStatus};
use gantry_core::domain::log::LogEntry;
use gantry_core::domain::pipeline::Pipeline;
use gantry_core::domain::project::{AccessLevel, Membership, Project};
use gantry_core::domain::quota::QuotaRecord;
use gantry_core::domain::runner::Runner;
use gantry_core::domain::trigger::Trigger;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be mapped back to a domain type
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("{0} already exists")]
    Conflict(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // Projects
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;
    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>>;
    async fn save_project(&self, project: &Project) -> StoreResult<()>;
    async fn set_membership(&self, membership: &Membership) -> StoreResult<()>;
    async fn access_level(&self, project_id: Uuid, user_id: Uuid)
    -> StoreResult<Option<AccessLevel>>;

    // Pipelines
    /// Stores a pipeline together with its initial jobs
    async fn insert_pipeline(&self, pipeline: &Pipeline, jobs: &[Job]) -> StoreResult<()>;
    async fn get_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>>;
    /// Newest first
    async fn list_pipelines(&self, project_id: Uuid) -> StoreResult<Vec<Pipeline>>;
    async fn save_pipeline(&self, pipeline: &Pipeline) -> StoreResult<()>;
    /// Removes the pipeline with its jobs, traces and artifacts
    async fn delete_pipeline(&self, id: Uuid) -> StoreResult<bool>;

    // Jobs
    async fn insert_job(&self, job: &Job) -> StoreResult<()>;
    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>>;
    /// All jobs of a pipeline, retried ones included, in creation order
    async fn list_jobs(&self, pipeline_id: Uuid) -> StoreResult<Vec<Job>>;
    /// Pending jobs across all pipelines, oldest queued first
    async fn list_pending_jobs(&self) -> StoreResult<Vec<Job>>;
    async fn list_running_jobs(&self) -> StoreResult<Vec<Job>>;
    async fn save_job(&self, job: &Job) -> StoreResult<()>;
    /// Writes `job` only if the stored status still equals `expected`
    ///
    /// Returns false when another writer changed the status first.
    async fn compare_and_swap_job(&self, job: &Job, expected: JobStatus) -> StoreResult<bool>;
    /// Marks a job retried and inserts its replacement as one write
    ///
    /// Returns false, writing nothing, when the stored job no longer has
    /// status `expected` or was already retried.
    async fn record_retry(
        &self,
        original_id: Uuid,
        expected: JobStatus,
        replacement: &Job,
    ) -> StoreResult<bool>;

    // Runners
    async fn insert_runner(&self, runner: &Runner) -> StoreResult<()>;
    async fn get_runner(&self, id: Uuid) -> StoreResult<Option<Runner>>;
    async fn find_runner_by_token(&self, token_hash: &str) -> StoreResult<Option<Runner>>;
    async fn list_runners(&self) -> StoreResult<Vec<Runner>>;
    async fn save_runner(&self, runner: &Runner) -> StoreResult<()>;
    async fn delete_runner(&self, id: Uuid) -> StoreResult<bool>;

    // Triggers
    async fn insert_trigger(&self, trigger: &Trigger) -> StoreResult<()>;
    async fn get_trigger(&self, id: Uuid) -> StoreResult<Option<Trigger>>;
    async fn find_trigger_by_token(&self, token_hash: &str) -> StoreResult<Option<Trigger>>;
    async fn list_triggers(&self, project_id: Uuid) -> StoreResult<Vec<Trigger>>;
    async fn save_trigger(&self, trigger: &Trigger) -> StoreResult<()>;

    // Quotas
    async fn get_quota(&self, namespace_id: Uuid) -> StoreResult<Option<QuotaRecord>>;
    async fn set_quota_limit(
        &self,
        namespace_id: Uuid,
        limit_minutes: Option<u64>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord>;
    /// Atomically adds minutes, creating the record if needed
    async fn add_quota_usage(
        &self,
        namespace_id: Uuid,
        minutes: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord>;

    // Traces
    async fn append_trace(&self, job_id: Uuid, entries: &[LogEntry]) -> StoreResult<()>;
    async fn get_trace(&self, job_id: Uuid) -> StoreResult<Vec<LogEntry>>;

    // Artifacts
    /// Replaces any artifact already stored for the job
    async fn put_artifact(&self, artifact: &Artifact, data: Vec<u8>) -> StoreResult<()>;
    async fn get_artifact(&self, job_id: Uuid) -> StoreResult<Option<(Artifact, Vec<u8>)>>;
    async fn delete_expired_artifacts(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
