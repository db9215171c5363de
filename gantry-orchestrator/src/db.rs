use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create projects table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id UUID PRIMARY KEY,
            namespace_id UUID NOT NULL,
            name VARCHAR(255) NOT NULL,
            shared_runners_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            definition JSONB,
            default_timeout_seconds BIGINT,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_members (
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            user_id UUID NOT NULL,
            access_level INTEGER NOT NULL,
            PRIMARY KEY (project_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipelines table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id UUID PRIMARY KEY,
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            ref_name VARCHAR(255) NOT NULL,
            sha VARCHAR(64) NOT NULL,
            source VARCHAR(20) NOT NULL,
            actor JSONB NOT NULL,
            status VARCHAR(20) NOT NULL,
            warnings BOOLEAN NOT NULL DEFAULT FALSE,
            variables JSONB NOT NULL DEFAULT '[]',
            stages TEXT[] NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            project_id UUID NOT NULL,
            name VARCHAR(255) NOT NULL,
            stage VARCHAR(255) NOT NULL,
            stage_idx INTEGER NOT NULL,
            status VARCHAR(20) NOT NULL,
            when_policy VARCHAR(20) NOT NULL,
            allow_failure BOOLEAN NOT NULL DEFAULT FALSE,
            tags TEXT[] NOT NULL DEFAULT '{}',
            script TEXT[] NOT NULL,
            timeout_seconds BIGINT NOT NULL,
            artifacts JSONB,
            failure_reason VARCHAR(50),
            exit_code INTEGER,
            runner_id UUID,
            retried_from UUID,
            retried BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            queued_at TIMESTAMPTZ,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create traces table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_traces (
            id BIGSERIAL PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            timestamp TIMESTAMPTZ NOT NULL,
            level VARCHAR(20) NOT NULL,
            message TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_artifacts (
            job_id UUID PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
            filename VARCHAR(255) NOT NULL,
            size BIGINT NOT NULL,
            data BYTEA NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            expire_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, queued_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_pipeline_id ON jobs(pipeline_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipelines_project_id ON pipelines(project_id, created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_traces_job_id ON job_traces(job_id, id)")
        .execute(pool)
        .await?;

    // Create runners table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runners (
            id UUID PRIMARY KEY,
            description TEXT NOT NULL DEFAULT '',
            token_hash VARCHAR(64) NOT NULL UNIQUE,
            scope JSONB NOT NULL,
            tags TEXT[] NOT NULL DEFAULT '{}',
            run_untagged BOOLEAN NOT NULL DEFAULT TRUE,
            paused BOOLEAN NOT NULL DEFAULT FALSE,
            registered_at TIMESTAMPTZ NOT NULL,
            contacted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS triggers (
            id UUID PRIMARY KEY,
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            owner_id UUID,
            description TEXT,
            token_hash VARCHAR(64) NOT NULL UNIQUE,
            token_preview VARCHAR(4) NOT NULL,
            revoked BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            last_used_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS namespace_quotas (
            namespace_id UUID PRIMARY KEY,
            consumed_minutes BIGINT NOT NULL DEFAULT 0,
            limit_minutes BIGINT,
            period_start TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
