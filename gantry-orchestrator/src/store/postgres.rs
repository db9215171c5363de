//! Postgres store
//!
//! Scalar fields map to columns; nested values (scopes, actors, variables,
//! definitions) are stored as JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::job::{ArtifactsSpec, FailureReason, Job, JobStatus, When};
use gantry_core::domain::log::{LogEntry, LogLevel};
use gantry_core::domain::pipeline::{Actor, Pipeline, PipelineDefinition, PipelineSource, PipelineStatus, Variable};
use gantry_core::domain::project::{AccessLevel, Membership, Project};
use gantry_core::domain::quota::QuotaRecord;
use gantry_core::domain::runner::{Runner, RunnerScope};
use gantry_core::domain::trigger::Trigger;
use sqlx::{PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const JOB_COLUMNS: &str = r#"
    id, pipeline_id, project_id, name, stage, stage_idx, status, when_policy,
    allow_failure, tags, script, timeout_seconds, artifacts, failure_reason,
    exit_code, runner_id, retried_from, retried, created_at, queued_at,
    started_at, finished_at
"#;

const PIPELINE_COLUMNS: &str = r#"
    id, project_id, ref_name, sha, source, actor, status, warnings, variables,
    stages, created_at, started_at, finished_at
"#;

const RUNNER_COLUMNS: &str = r#"
    id, description, token_hash, scope, tags, run_untagged, paused,
    registered_at, contacted_at
"#;

const TRIGGER_COLUMNS: &str = r#"
    id, project_id, owner_id, description, token_hash, token_preview, revoked,
    created_at, last_used_at
"#;

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // Projects
    // =========================================================================

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, namespace_id, name, shared_runners_enabled,
                                  definition, default_timeout_seconds, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(project.id)
        .bind(project.namespace_id)
        .bind(&project.name)
        .bind(project.shared_runners_enabled)
        .bind(to_json_opt(&project.definition)?)
        .bind(project.default_timeout_seconds.map(|t| t as i64))
        .bind(project.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, namespace_id, name, shared_runners_enabled, definition,
                   default_timeout_seconds, created_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Project::try_from).transpose()
    }

    async fn save_project(&self, project: &Project) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE projects
            SET name = $2, shared_runners_enabled = $3, definition = $4,
                default_timeout_seconds = $5
            WHERE id = $1
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(project.shared_runners_enabled)
        .bind(to_json_opt(&project.definition)?)
        .bind(project.default_timeout_seconds.map(|t| t as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_membership(&self, membership: &Membership) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, access_level)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, user_id) DO UPDATE SET
                access_level = EXCLUDED.access_level
            "#,
        )
        .bind(membership.project_id)
        .bind(membership.user_id)
        .bind(membership.access_level.value())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn access_level(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<AccessLevel>> {
        let value: Option<i32> = sqlx::query_scalar(
            "SELECT access_level FROM project_members WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        value
            .map(|v| {
                AccessLevel::from_value(v)
                    .ok_or_else(|| StoreError::Corrupt(format!("access level {}", v)))
            })
            .transpose()
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    async fn insert_pipeline(&self, pipeline: &Pipeline, jobs: &[Job]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO pipelines (id, project_id, ref_name, sha, source, actor, status,
                                   warnings, variables, stages, created_at, started_at,
                                   finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(pipeline.id)
        .bind(pipeline.project_id)
        .bind(&pipeline.ref_name)
        .bind(&pipeline.sha)
        .bind(pipeline.source.as_str())
        .bind(serde_json::to_value(pipeline.actor)?)
        .bind(pipeline.status.as_str())
        .bind(pipeline.warnings)
        .bind(serde_json::to_value(&pipeline.variables)?)
        .bind(&pipeline.stages)
        .bind(pipeline.created_at)
        .bind(pipeline.started_at)
        .bind(pipeline.finished_at)
        .execute(&mut *tx)
        .await?;

        for job in jobs {
            insert_job_row(&mut tx, job).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>> {
        let query = format!("SELECT {} FROM pipelines WHERE id = $1", PIPELINE_COLUMNS);
        let row = sqlx::query_as::<_, PipelineRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Pipeline::try_from).transpose()
    }

    async fn list_pipelines(&self, project_id: Uuid) -> StoreResult<Vec<Pipeline>> {
        let query = format!(
            "SELECT {} FROM pipelines WHERE project_id = $1 ORDER BY created_at DESC",
            PIPELINE_COLUMNS
        );
        let rows = sqlx::query_as::<_, PipelineRow>(&query)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Pipeline::try_from).collect()
    }

    async fn save_pipeline(&self, pipeline: &Pipeline) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE pipelines
            SET status = $2, warnings = $3, started_at = $4, finished_at = $5
            WHERE id = $1
            "#,
        )
        .bind(pipeline.id)
        .bind(pipeline.status.as_str())
        .bind(pipeline.warnings)
        .bind(pipeline.started_at)
        .bind(pipeline.finished_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_pipeline(&self, id: Uuid) -> StoreResult<bool> {
        // jobs, traces and artifacts cascade
        let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_job_row(&mut conn, job).await
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let query = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn list_jobs(&self, pipeline_id: Uuid) -> StoreResult<Vec<Job>> {
        let query = format!(
            "SELECT {} FROM jobs WHERE pipeline_id = $1 ORDER BY created_at ASC, stage_idx ASC",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(pipeline_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_pending_jobs(&self) -> StoreResult<Vec<Job>> {
        let query = format!(
            "SELECT {} FROM jobs WHERE status = 'pending' ORDER BY queued_at ASC NULLS LAST, created_at ASC",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_running_jobs(&self) -> StoreResult<Vec<Job>> {
        let query = format!("SELECT {} FROM jobs WHERE status = 'running'", JOB_COLUMNS);
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn save_job(&self, job: &Job) -> StoreResult<()> {
        update_job_row(&self.pool, job, None).await?;
        Ok(())
    }

    async fn compare_and_swap_job(&self, job: &Job, expected: JobStatus) -> StoreResult<bool> {
        let updated = update_job_row(&self.pool, job, Some(expected)).await?;
        Ok(updated == 1)
    }

    async fn record_retry(
        &self,
        original_id: Uuid,
        expected: JobStatus,
        replacement: &Job,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query(
            "UPDATE jobs SET retried = TRUE WHERE id = $1 AND status = $2 AND NOT retried",
        )
        .bind(original_id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_job_row(&mut tx, replacement).await?;

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Runners
    // =========================================================================

    async fn insert_runner(&self, runner: &Runner) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO runners (id, description, token_hash, scope, tags, run_untagged,
                                 paused, registered_at, contacted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(runner.id)
        .bind(&runner.description)
        .bind(&runner.token_hash)
        .bind(serde_json::to_value(&runner.scope)?)
        .bind(runner.tags.iter().cloned().collect::<Vec<_>>())
        .bind(runner.run_untagged)
        .bind(runner.paused)
        .bind(runner.registered_at)
        .bind(runner.contacted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_runner(&self, id: Uuid) -> StoreResult<Option<Runner>> {
        let query = format!("SELECT {} FROM runners WHERE id = $1", RUNNER_COLUMNS);
        let row = sqlx::query_as::<_, RunnerRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Runner::try_from).transpose()
    }

    async fn find_runner_by_token(&self, token_hash: &str) -> StoreResult<Option<Runner>> {
        let query = format!("SELECT {} FROM runners WHERE token_hash = $1", RUNNER_COLUMNS);
        let row = sqlx::query_as::<_, RunnerRow>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Runner::try_from).transpose()
    }

    async fn list_runners(&self) -> StoreResult<Vec<Runner>> {
        let query = format!("SELECT {} FROM runners ORDER BY registered_at ASC", RUNNER_COLUMNS);
        let rows = sqlx::query_as::<_, RunnerRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Runner::try_from).collect()
    }

    async fn save_runner(&self, runner: &Runner) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE runners
            SET description = $2, scope = $3, tags = $4, run_untagged = $5,
                paused = $6, contacted_at = $7
            WHERE id = $1
            "#,
        )
        .bind(runner.id)
        .bind(&runner.description)
        .bind(serde_json::to_value(&runner.scope)?)
        .bind(runner.tags.iter().cloned().collect::<Vec<_>>())
        .bind(runner.run_untagged)
        .bind(runner.paused)
        .bind(runner.contacted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_runner(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM runners WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    async fn insert_trigger(&self, trigger: &Trigger) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO triggers (id, project_id, owner_id, description, token_hash,
                                  token_preview, revoked, created_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(trigger.id)
        .bind(trigger.project_id)
        .bind(trigger.owner_id)
        .bind(&trigger.description)
        .bind(&trigger.token_hash)
        .bind(&trigger.token_preview)
        .bind(trigger.revoked)
        .bind(trigger.created_at)
        .bind(trigger.last_used_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_trigger(&self, id: Uuid) -> StoreResult<Option<Trigger>> {
        let query = format!("SELECT {} FROM triggers WHERE id = $1", TRIGGER_COLUMNS);
        let row = sqlx::query_as::<_, TriggerRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Trigger::from))
    }

    async fn find_trigger_by_token(&self, token_hash: &str) -> StoreResult<Option<Trigger>> {
        let query = format!("SELECT {} FROM triggers WHERE token_hash = $1", TRIGGER_COLUMNS);
        let row = sqlx::query_as::<_, TriggerRow>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Trigger::from))
    }

    async fn list_triggers(&self, project_id: Uuid) -> StoreResult<Vec<Trigger>> {
        let query = format!(
            "SELECT {} FROM triggers WHERE project_id = $1 ORDER BY created_at ASC",
            TRIGGER_COLUMNS
        );
        let rows = sqlx::query_as::<_, TriggerRow>(&query)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Trigger::from).collect())
    }

    async fn save_trigger(&self, trigger: &Trigger) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE triggers
            SET owner_id = $2, description = $3, revoked = $4, last_used_at = $5
            WHERE id = $1
            "#,
        )
        .bind(trigger.id)
        .bind(trigger.owner_id)
        .bind(&trigger.description)
        .bind(trigger.revoked)
        .bind(trigger.last_used_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Quotas
    // =========================================================================

    async fn get_quota(&self, namespace_id: Uuid) -> StoreResult<Option<QuotaRecord>> {
        let row = sqlx::query_as::<_, QuotaRow>(
            r#"
            SELECT namespace_id, consumed_minutes, limit_minutes, period_start
            FROM namespace_quotas
            WHERE namespace_id = $1
            "#,
        )
        .bind(namespace_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QuotaRecord::from))
    }

    async fn set_quota_limit(
        &self,
        namespace_id: Uuid,
        limit_minutes: Option<u64>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord> {
        let row = sqlx::query_as::<_, QuotaRow>(
            r#"
            INSERT INTO namespace_quotas (namespace_id, consumed_minutes, limit_minutes, period_start)
            VALUES ($1, 0, $2, $3)
            ON CONFLICT (namespace_id) DO UPDATE SET
                limit_minutes = EXCLUDED.limit_minutes
            RETURNING namespace_id, consumed_minutes, limit_minutes, period_start
            "#,
        )
        .bind(namespace_id)
        .bind(limit_minutes.map(|l| l as i64))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn add_quota_usage(
        &self,
        namespace_id: Uuid,
        minutes: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord> {
        let row = sqlx::query_as::<_, QuotaRow>(
            r#"
            INSERT INTO namespace_quotas (namespace_id, consumed_minutes, limit_minutes, period_start)
            VALUES ($1, $2, NULL, $3)
            ON CONFLICT (namespace_id) DO UPDATE SET
                consumed_minutes = namespace_quotas.consumed_minutes + EXCLUDED.consumed_minutes
            RETURNING namespace_id, consumed_minutes, limit_minutes, period_start
            "#,
        )
        .bind(namespace_id)
        .bind(minutes as i64)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    // =========================================================================
    // Traces
    // =========================================================================

    async fn append_trace(&self, job_id: Uuid, entries: &[LogEntry]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO job_traces (job_id, timestamp, level, message)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(job_id)
            .bind(entry.timestamp)
            .bind(level_to_string(entry.level))
            .bind(&entry.message)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_trace(&self, job_id: Uuid) -> StoreResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, TraceRow>(
            r#"
            SELECT timestamp, level, message
            FROM job_traces
            WHERE job_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LogEntry::from).collect())
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    async fn put_artifact(&self, artifact: &Artifact, data: Vec<u8>) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO job_artifacts (job_id, filename, size, data, created_at, expire_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (job_id) DO UPDATE SET
                filename = EXCLUDED.filename,
                size = EXCLUDED.size,
                data = EXCLUDED.data,
                created_at = EXCLUDED.created_at,
                expire_at = EXCLUDED.expire_at
            "#,
        )
        .bind(artifact.job_id)
        .bind(&artifact.filename)
        .bind(artifact.size as i64)
        .bind(data)
        .bind(artifact.created_at)
        .bind(artifact.expire_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_artifact(&self, job_id: Uuid) -> StoreResult<Option<(Artifact, Vec<u8>)>> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT job_id, filename, size, data, created_at, expire_at
            FROM job_artifacts
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let artifact = Artifact {
                job_id: r.job_id,
                filename: r.filename,
                size: r.size as u64,
                created_at: r.created_at,
                expire_at: r.expire_at,
            };
            (artifact, r.data)
        }))
    }

    async fn delete_expired_artifacts(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM job_artifacts WHERE expire_at IS NOT NULL AND expire_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Job Writes
// =============================================================================

async fn insert_job_row(conn: &mut PgConnection, job: &Job) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO jobs (id, pipeline_id, project_id, name, stage, stage_idx, status,
                          when_policy, allow_failure, tags, script, timeout_seconds,
                          artifacts, failure_reason, exit_code, runner_id, retried_from,
                          retried, created_at, queued_at, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22)
        "#,
    )
    .bind(job.id)
    .bind(job.pipeline_id)
    .bind(job.project_id)
    .bind(&job.name)
    .bind(&job.stage)
    .bind(job.stage_idx as i32)
    .bind(job.status.as_str())
    .bind(job.when.as_str())
    .bind(job.allow_failure)
    .bind(job.tags.iter().cloned().collect::<Vec<_>>())
    .bind(&job.script)
    .bind(job.timeout_seconds as i64)
    .bind(to_json_opt(&job.artifacts)?)
    .bind(job.failure_reason.map(|r| r.as_str()))
    .bind(job.exit_code)
    .bind(job.runner_id)
    .bind(job.retried_from)
    .bind(job.retried)
    .bind(job.created_at)
    .bind(job.queued_at)
    .bind(job.started_at)
    .bind(job.finished_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates the mutable job columns, optionally guarded by the current status
///
/// Returns the number of rows written.
async fn update_job_row(
    pool: &PgPool,
    job: &Job,
    expected: Option<JobStatus>,
) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = $2, failure_reason = $3, exit_code = $4, runner_id = $5,
            retried = $6, queued_at = $7, started_at = $8, finished_at = $9
        WHERE id = $1 AND ($10::VARCHAR IS NULL OR status = $10)
        "#,
    )
    .bind(job.id)
    .bind(job.status.as_str())
    .bind(job.failure_reason.map(|r| r.as_str()))
    .bind(job.exit_code)
    .bind(job.runner_id)
    .bind(job.retried)
    .bind(job.queued_at)
    .bind(job.started_at)
    .bind(job.finished_at)
    .bind(expected.map(|s| s.as_str()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Helper Functions
// =============================================================================

fn to_json_opt<T: serde::Serialize>(value: &Option<T>) -> StoreResult<Option<serde_json::Value>> {
    value
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(StoreError::from)
}

fn parse<T: FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    value.parse().map_err(StoreError::Corrupt)
}

fn level_to_string(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "Debug",
        LogLevel::Info => "Info",
        LogLevel::Warning => "Warning",
        LogLevel::Error => "Error",
    }
}

fn string_to_level(s: &str) -> LogLevel {
    match s {
        "Debug" => LogLevel::Debug,
        "Warning" => LogLevel::Warning,
        "Error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    namespace_id: Uuid,
    name: String,
    shared_runners_enabled: bool,
    definition: Option<serde_json::Value>,
    default_timeout_seconds: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> StoreResult<Self> {
        let definition = row
            .definition
            .map(serde_json::from_value::<PipelineDefinition>)
            .transpose()?;

        Ok(Project {
            id: row.id,
            namespace_id: row.namespace_id,
            name: row.name,
            shared_runners_enabled: row.shared_runners_enabled,
            definition,
            default_timeout_seconds: row.default_timeout_seconds.map(|t| t as u64),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    project_id: Uuid,
    ref_name: String,
    sha: String,
    source: String,
    actor: serde_json::Value,
    status: String,
    warnings: bool,
    variables: serde_json::Value,
    stages: Vec<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<PipelineRow> for Pipeline {
    type Error = StoreError;

    fn try_from(row: PipelineRow) -> StoreResult<Self> {
        Ok(Pipeline {
            id: row.id,
            project_id: row.project_id,
            ref_name: row.ref_name,
            sha: row.sha,
            source: parse::<PipelineSource>(&row.source)?,
            actor: serde_json::from_value::<Actor>(row.actor)?,
            status: parse::<PipelineStatus>(&row.status)?,
            warnings: row.warnings,
            variables: serde_json::from_value::<Vec<Variable>>(row.variables)?,
            stages: row.stages,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    pipeline_id: Uuid,
    project_id: Uuid,
    name: String,
    stage: String,
    stage_idx: i32,
    status: String,
    when_policy: String,
    allow_failure: bool,
    tags: Vec<String>,
    script: Vec<String>,
    timeout_seconds: i64,
    artifacts: Option<serde_json::Value>,
    failure_reason: Option<String>,
    exit_code: Option<i32>,
    runner_id: Option<Uuid>,
    retried_from: Option<Uuid>,
    retried: bool,
    created_at: DateTime<Utc>,
    queued_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        Ok(Job {
            id: row.id,
            pipeline_id: row.pipeline_id,
            project_id: row.project_id,
            name: row.name,
            stage: row.stage,
            stage_idx: row.stage_idx as u32,
            status: parse::<JobStatus>(&row.status)?,
            when: parse::<When>(&row.when_policy)?,
            allow_failure: row.allow_failure,
            tags: row.tags.into_iter().collect(),
            script: row.script,
            timeout_seconds: row.timeout_seconds as u64,
            artifacts: row
                .artifacts
                .map(serde_json::from_value::<ArtifactsSpec>)
                .transpose()?,
            failure_reason: row
                .failure_reason
                .as_deref()
                .map(parse::<FailureReason>)
                .transpose()?,
            exit_code: row.exit_code,
            runner_id: row.runner_id,
            retried_from: row.retried_from,
            retried: row.retried,
            created_at: row.created_at,
            queued_at: row.queued_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RunnerRow {
    id: Uuid,
    description: String,
    token_hash: String,
    scope: serde_json::Value,
    tags: Vec<String>,
    run_untagged: bool,
    paused: bool,
    registered_at: DateTime<Utc>,
    contacted_at: Option<DateTime<Utc>>,
}

impl TryFrom<RunnerRow> for Runner {
    type Error = StoreError;

    fn try_from(row: RunnerRow) -> StoreResult<Self> {
        Ok(Runner {
            id: row.id,
            description: row.description,
            token_hash: row.token_hash,
            scope: serde_json::from_value::<RunnerScope>(row.scope)?,
            tags: row.tags.into_iter().collect(),
            run_untagged: row.run_untagged,
            paused: row.paused,
            registered_at: row.registered_at,
            contacted_at: row.contacted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TriggerRow {
    id: Uuid,
    project_id: Uuid,
    owner_id: Option<Uuid>,
    description: Option<String>,
    token_hash: String,
    token_preview: String,
    revoked: bool,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<TriggerRow> for Trigger {
    fn from(row: TriggerRow) -> Self {
        Trigger {
            id: row.id,
            project_id: row.project_id,
            owner_id: row.owner_id,
            description: row.description,
            token_hash: row.token_hash,
            token_preview: row.token_preview,
            revoked: row.revoked,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuotaRow {
    namespace_id: Uuid,
    consumed_minutes: i64,
    limit_minutes: Option<i64>,
    period_start: DateTime<Utc>,
}

impl From<QuotaRow> for QuotaRecord {
    fn from(row: QuotaRow) -> Self {
        QuotaRecord {
            namespace_id: row.namespace_id,
            consumed_minutes: row.consumed_minutes.max(0) as u64,
            limit_minutes: row.limit_minutes.map(|l| l.max(0) as u64),
            period_start: row.period_start,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TraceRow {
    timestamp: DateTime<Utc>,
    level: String,
    message: String,
}

impl From<TraceRow> for LogEntry {
    fn from(row: TraceRow) -> Self {
        LogEntry {
            timestamp: row.timestamp,
            level: string_to_level(&row.level),
            message: row.message,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    job_id: Uuid,
    filename: String,
    size: i64,
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    expire_at: Option<DateTime<Utc>>,
}
