//! Pipeline Service
//!
//! Pipeline creation, cancellation and deletion, plus the re-processing step
//! that follows every job status change.

use chrono::Utc;
use gantry_core::composite::composite_status;
use gantry_core::domain::job::Job;
use gantry_core::domain::pipeline::{Actor, Pipeline, PipelineSource, PipelineStatus, Variable};
use gantry_core::domain::project::{AccessLevel, Project};
use gantry_core::dto::pipeline::{CreatePipeline, PipelineSummary, PipelineView};
use gantry_core::event::Event;
use gantry_core::feature::Feature;
use gantry_core::processing;
use gantry_core::validation::Validate;
use uuid::Uuid;

use crate::service::{Result, ServiceError, job_service, project_service, quota_service};
use crate::state::AppState;

/// Inputs for a new pipeline, whatever started it
pub(crate) struct NewPipeline {
    pub ref_name: String,
    pub sha: String,
    pub source: PipelineSource,
    pub actor: Actor,
    pub variables: Vec<Variable>,
}

/// Create a pipeline from the project's definition on behalf of a user
pub async fn create_pipeline(
    state: &AppState,
    project_id: Uuid,
    req: CreatePipeline,
) -> Result<PipelineView> {
    req.validate()?;

    let project = project_service::get_project(state, project_id).await?;
    project_service::require_access(state, project.id, req.user_id, AccessLevel::Developer)
        .await?;

    let pipeline = instantiate(
        state,
        &project,
        NewPipeline {
            ref_name: req.ref_name,
            sha: req.sha,
            source: req.source,
            actor: Actor::User(req.user_id),
            variables: req.variables,
        },
    )
    .await?;

    get_pipeline_view(state, pipeline.id).await
}

/// Stores the pipeline with its jobs and runs the first processing pass
///
/// Never fails because of quota; the namespace status is only reported.
pub(crate) async fn instantiate(
    state: &AppState,
    project: &Project,
    new: NewPipeline,
) -> Result<Pipeline> {
    let definition = project.definition.as_ref().ok_or_else(|| {
        ServiceError::InvalidState(format!("Project {} has no pipeline definition", project.id))
    })?;
    definition.validate()?;

    let now = Utc::now();
    let pipeline = Pipeline {
        id: Uuid::new_v4(),
        project_id: project.id,
        ref_name: new.ref_name,
        sha: new.sha,
        source: new.source,
        actor: new.actor,
        status: PipelineStatus::Created,
        warnings: false,
        variables: new.variables,
        stages: definition.stage_names(),
        created_at: now,
        started_at: None,
        finished_at: None,
    };

    let default_timeout = project
        .default_timeout_seconds
        .unwrap_or(state.config.default_job_timeout.as_secs());
    let jobs = definition.build_jobs(&pipeline, default_timeout, now);

    state.store.insert_pipeline(&pipeline, &jobs).await?;

    tracing::info!(
        "Pipeline created: {} for project {} ({} jobs, source: {})",
        pipeline.id,
        project.id,
        jobs.len(),
        pipeline.source.as_str()
    );

    let quota = quota_service::check(state, project.namespace_id).await?;
    if let Some(warning) = &quota.warning {
        tracing::warn!("Pipeline {} created with quota warning: {}", pipeline.id, warning);
    }

    process_pipeline(state, pipeline.id).await
}

pub async fn get_pipeline(state: &AppState, id: Uuid) -> Result<Pipeline> {
    state
        .store
        .get_pipeline(id)
        .await?
        .ok_or(ServiceError::not_found("pipeline", id))
}

/// Pipeline with its latest jobs, masked variables and quota state
pub async fn get_pipeline_view(state: &AppState, id: Uuid) -> Result<PipelineView> {
    let pipeline = get_pipeline(state, id).await?;
    let project = project_service::get_project(state, pipeline.project_id).await?;
    let jobs = state.store.list_jobs(id).await?;

    let mut views = Vec::new();
    for job in latest_jobs(jobs) {
        views.push(job_service::job_view(state, &project, job).await?);
    }

    let quota = quota_service::check(state, project.namespace_id).await?;
    let pipeline = if state.config.features.is_enabled(Feature::MaskTriggerVariables) {
        pipeline.redacted()
    } else {
        pipeline
    };

    Ok(PipelineView {
        pipeline,
        jobs: views,
        quota_status: quota.status,
        quota_warning: quota.warning,
    })
}

pub async fn list_pipelines(state: &AppState, project_id: Uuid) -> Result<Vec<PipelineSummary>> {
    project_service::get_project(state, project_id).await?;

    let pipelines = state.store.list_pipelines(project_id).await?;
    Ok(pipelines.into_iter().map(PipelineSummary::from).collect())
}

/// Cancel every created, pending, running or manual job of the pipeline
pub async fn cancel_pipeline(state: &AppState, id: Uuid) -> Result<Pipeline> {
    let _guard = state.locks.lock(id).await;

    get_pipeline(state, id).await?;
    let jobs = state.store.list_jobs(id).await?;
    let mut canceled = 0;

    for job in jobs.into_iter().filter(|j| !j.retried && j.status.is_cancelable()) {
        if job_service::cancel_current(state, job).await?.is_some() {
            canceled += 1;
        }
    }

    tracing::info!("Pipeline {} canceled ({} jobs)", id, canceled);

    process_locked(state, id).await
}

pub async fn delete_pipeline(state: &AppState, id: Uuid) -> Result<()> {
    let deleted = {
        let _guard = state.locks.lock(id).await;
        state.store.delete_pipeline(id).await?
    };

    if !deleted {
        return Err(ServiceError::not_found("pipeline", id));
    }

    tracing::info!("Pipeline deleted: {}", id);

    Ok(())
}

// =============================================================================
// Processing
// =============================================================================

/// Re-process the pipeline under its lock
pub async fn process_pipeline(state: &AppState, id: Uuid) -> Result<Pipeline> {
    let _guard = state.locks.lock(id).await;
    process_locked(state, id).await
}

/// Applies stage decisions and recomputes the aggregate status
///
/// The caller must hold the pipeline lock.
pub(crate) async fn process_locked(state: &AppState, id: Uuid) -> Result<Pipeline> {
    let mut pipeline = get_pipeline(state, id).await?;
    let now = Utc::now();

    let jobs = state.store.list_jobs(id).await?;
    for decision in processing::process(&jobs) {
        let Some(job) = jobs.iter().find(|j| j.id == decision.job_id) else {
            continue;
        };

        let mut updated = job.clone();
        let from = updated.transition(decision.to, now)?;
        if !job_service::write_transition(state, &updated, from).await? {
            tracing::debug!("Job {} changed during processing, skipping", job.id);
        }
    }

    let jobs = state.store.list_jobs(id).await?;
    let composite = composite_status(&jobs);
    let warnings_changed = pipeline.warnings != composite.warnings;

    match pipeline.apply_status(composite.status, composite.warnings, now) {
        Some(previous) => {
            state.store.save_pipeline(&pipeline).await?;
            tracing::info!(
                "Pipeline {} status: {} -> {}",
                pipeline.id,
                previous,
                pipeline.status
            );
            state.events.publish(Event::PipelineStatusChanged {
                pipeline_id: pipeline.id,
                project_id: pipeline.project_id,
                from: previous,
                to: pipeline.status,
            });
        }
        None if warnings_changed => state.store.save_pipeline(&pipeline).await?,
        None => {}
    }

    Ok(pipeline)
}

/// Latest jobs of a pipeline in stage order
pub(crate) fn latest_jobs(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.retain(|job| !job.retried);
    jobs.sort_by_key(|job| job.stage_idx);
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{
        InterleavingStore, TestEnv, default_definition, definition, job_def,
    };
    use gantry_core::domain::job::JobStatus;
    use gantry_core::domain::quota::QuotaStatus;

    #[tokio::test]
    async fn test_create_pipeline_enqueues_first_stage() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;

        assert_eq!(view.pipeline.status, PipelineStatus::Pending);
        assert_eq!(view.pipeline.stages, vec!["build", "test"]);
        assert_eq!(view.jobs.len(), 2);
        assert_eq!(view.jobs[0].job.status, JobStatus::Pending);
        assert_eq!(view.jobs[1].job.status, JobStatus::Created);
        assert_eq!(view.quota_status, QuotaStatus::Ok);
    }

    #[tokio::test]
    async fn test_create_requires_developer() {
        let env = TestEnv::new().await;
        let reporter = env.member(AccessLevel::Reporter).await;

        let result = create_pipeline(
            &env.state,
            env.project.id,
            CreatePipeline {
                ref_name: "main".to_string(),
                sha: "abc".to_string(),
                variables: vec![],
                user_id: reporter,
                source: PipelineSource::Web,
            },
        )
        .await;

        assert!(matches!(result, Err(ServiceError::InsufficientPermission(_))));
    }

    #[tokio::test]
    async fn test_create_without_definition_fails() {
        let mut env = TestEnv::new().await;
        env.project.definition = None;
        env.state.store.save_project(&env.project).await.unwrap();

        let result = create_pipeline(
            &env.state,
            env.project.id,
            CreatePipeline {
                ref_name: "main".to_string(),
                sha: "abc".to_string(),
                variables: vec![],
                user_id: env.maintainer,
                source: PipelineSource::Web,
            },
        )
        .await;

        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_cancel_cascades_to_open_jobs() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;

        let pipeline = cancel_pipeline(&env.state, view.pipeline.id).await.unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Canceled);

        let jobs = env.state.store.list_jobs(pipeline.id).await.unwrap();
        assert!(jobs.iter().all(|j| j.status == JobStatus::Canceled));
    }

    #[tokio::test]
    async fn test_cancel_covers_job_claimed_after_snapshot() {
        let store = InterleavingStore::new();
        let env = TestEnv::with_store(store.clone(), default_definition()).await;
        let view = env.create_pipeline().await;
        let (runner, _) = env.runner(&[]).await;

        store.claim_after_next_list(runner.id);
        let pipeline = cancel_pipeline(&env.state, view.pipeline.id).await.unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Canceled);

        let compile = env.state.store.get_job(view.jobs[0].job.id).await.unwrap().unwrap();
        assert_eq!(compile.status, JobStatus::Canceled);
        assert_eq!(compile.runner_id, Some(runner.id));

        let jobs = env.state.store.list_jobs(pipeline.id).await.unwrap();
        assert!(jobs.iter().all(|j| j.status == JobStatus::Canceled));
    }

    #[tokio::test]
    async fn test_cancel_leaves_finished_jobs() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;
        let (runner, token) = env.runner(&[]).await;
        let payload = env.claim(&token).await;
        env.succeed(&token, payload.job_id).await;

        cancel_pipeline(&env.state, view.pipeline.id).await.unwrap();

        let build = env.state.store.get_job(payload.job_id).await.unwrap().unwrap();
        assert_eq!(build.status, JobStatus::Success);
        assert_eq!(build.runner_id, Some(runner.id));
    }

    #[tokio::test]
    async fn test_failed_job_skips_later_stages() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;
        let (_, token) = env.runner(&[]).await;
        let payload = env.claim(&token).await;
        env.fail(&token, payload.job_id).await;

        let view = get_pipeline_view(&env.state, view.pipeline.id).await.unwrap();
        assert_eq!(view.pipeline.status, PipelineStatus::Failed);
        assert_eq!(view.jobs[1].job.status, JobStatus::Skipped);
        assert!(view.pipeline.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_processing_twice_changes_nothing() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;

        let before = env.state.store.list_jobs(view.pipeline.id).await.unwrap();
        process_pipeline(&env.state, view.pipeline.id).await.unwrap();
        let after = env.state.store.list_jobs(view.pipeline.id).await.unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_trigger_variables_masked_in_views() {
        let env = TestEnv::new().await;
        let pipeline = instantiate(
            &env.state,
            &env.project,
            NewPipeline {
                ref_name: "main".to_string(),
                sha: "abc".to_string(),
                source: PipelineSource::Api,
                actor: Actor::User(env.maintainer),
                variables: vec![Variable::masked("SECRET", "hunter2"), Variable::new("PLAIN", "x")],
            },
        )
        .await
        .unwrap();

        let view = get_pipeline_view(&env.state, pipeline.id).await.unwrap();
        assert_ne!(view.pipeline.variables[0].value, "hunter2");
        assert_eq!(view.pipeline.variables[1].value, "x");
    }

    #[tokio::test]
    async fn test_finished_pipeline_releases_lock_entry() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;
        let (_, token) = env.runner(&[]).await;
        for _ in 0..2 {
            let payload = env.claim(&token).await;
            env.succeed(&token, payload.job_id).await;
        }

        let pipeline = get_pipeline(&env.state, view.pipeline.id).await.unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Success);
        assert_eq!(env.state.locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_delete_pipeline() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;

        delete_pipeline(&env.state, view.pipeline.id).await.unwrap();
        assert!(matches!(
            get_pipeline(&env.state, view.pipeline.id).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(env.state.store.list_jobs(view.pipeline.id).await.unwrap().is_empty());
        assert!(matches!(
            delete_pipeline(&env.state, view.pipeline.id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_always_job_runs_after_failure() {
        let mut cleanup = job_def("cleanup");
        cleanup.when = gantry_core::domain::job::When::Always;
        let env = TestEnv::with_definition(definition(vec![
            ("build", vec![job_def("compile")]),
            ("cleanup", vec![cleanup]),
        ]))
        .await;
        let view = env.create_pipeline().await;
        let (_, token) = env.runner(&[]).await;

        let compile = env.claim(&token).await;
        env.fail(&token, compile.job_id).await;

        let view = get_pipeline_view(&env.state, view.pipeline.id).await.unwrap();
        assert_eq!(view.jobs[1].job.status, JobStatus::Pending);
        assert_eq!(view.pipeline.status, PipelineStatus::Running);
    }
}
