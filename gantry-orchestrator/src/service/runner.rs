//! Runner Service
//!
//! Runner registry: registration, authentication, pause/resume, and handing
//! pending jobs to runners.

use chrono::Utc;
use gantry_core::domain::job::{FailureReason, Job, JobStatus};
use gantry_core::domain::pipeline::{Pipeline, Variable};
use gantry_core::domain::project::Project;
use gantry_core::domain::runner::{Runner, RunnerScope};
use gantry_core::dto::job::JobPayload;
use gantry_core::dto::runner::{RegisterRunner, RegisteredRunner, RunnerSummary};
use gantry_core::matching;
use gantry_core::validation::Validate;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::service::{
    Result, ServiceError, job_service, pipeline_service, project_service, quota_service, token,
};
use crate::state::AppState;

const RUNNER_TOKEN_PREFIX: &str = "grt_";

/// Register a new runner; the returned token is shown only once
pub async fn register_runner(state: &AppState, req: RegisterRunner) -> Result<RegisteredRunner> {
    req.validate()?;

    if let RunnerScope::Project { project_ids } = &req.scope {
        for project_id in project_ids {
            project_service::get_project(state, *project_id).await?;
        }
    }

    let token = token::generate(RUNNER_TOKEN_PREFIX);
    let now = Utc::now();

    let runner = Runner {
        id: Uuid::new_v4(),
        description: req.description,
        token_hash: token::hash(&token),
        scope: req.scope,
        tags: req.tags,
        run_untagged: req.run_untagged,
        paused: false,
        registered_at: now,
        contacted_at: Some(now),
    };

    state.store.insert_runner(&runner).await?;

    tracing::info!(
        "Runner registered: {} (tags: {:?}, shared: {})",
        runner.id,
        runner.tags,
        runner.scope.is_shared()
    );

    Ok(RegisteredRunner {
        id: runner.id,
        token,
    })
}

/// Resolve a runner token
pub async fn authenticate(state: &AppState, token: &str) -> Result<Runner> {
    state
        .store
        .find_runner_by_token(&token::hash(token))
        .await?
        .ok_or(ServiceError::InvalidToken)
}

/// Record contact from a runner to keep it online
pub async fn heartbeat(state: &AppState, token: &str) -> Result<Runner> {
    let mut runner = authenticate(state, token).await?;
    runner.contacted_at = Some(Utc::now());
    state.store.save_runner(&runner).await?;

    tracing::debug!("Heartbeat from runner: {}", runner.id);

    Ok(runner)
}

async fn get_runner(state: &AppState, id: Uuid) -> Result<Runner> {
    state
        .store
        .get_runner(id)
        .await?
        .ok_or(ServiceError::not_found("runner", id))
}

async fn running_counts(state: &AppState) -> Result<HashMap<Uuid, usize>> {
    let mut counts = HashMap::new();
    for job in state.store.list_running_jobs().await? {
        if let Some(runner_id) = job.runner_id {
            *counts.entry(runner_id).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn summarize(state: &AppState, runner: Runner, running: &HashMap<Uuid, usize>) -> RunnerSummary {
    let status = runner.status(Utc::now(), state.config.runner_offline_after_chrono());
    let running_jobs = running.get(&runner.id).copied().unwrap_or(0);
    RunnerSummary::new(runner, status, running_jobs)
}

pub async fn get_runner_summary(state: &AppState, id: Uuid) -> Result<RunnerSummary> {
    let runner = get_runner(state, id).await?;
    let running = running_counts(state).await?;
    Ok(summarize(state, runner, &running))
}

/// List all registered runners
pub async fn list_runners(state: &AppState) -> Result<Vec<RunnerSummary>> {
    let runners = state.store.list_runners().await?;
    let running = running_counts(state).await?;

    Ok(runners
        .into_iter()
        .map(|runner| summarize(state, runner, &running))
        .collect())
}

pub async fn pause_runner(state: &AppState, id: Uuid) -> Result<RunnerSummary> {
    set_paused(state, id, true).await
}

pub async fn resume_runner(state: &AppState, id: Uuid) -> Result<RunnerSummary> {
    set_paused(state, id, false).await
}

async fn set_paused(state: &AppState, id: Uuid, paused: bool) -> Result<RunnerSummary> {
    let mut runner = get_runner(state, id).await?;
    runner.paused = paused;
    state.store.save_runner(&runner).await?;

    tracing::info!("Runner {} {}", id, if paused { "paused" } else { "resumed" });

    get_runner_summary(state, id).await
}

/// Remove a runner; jobs it was running fail with `runner_system_failure`
pub async fn deregister_runner(state: &AppState, id: Uuid) -> Result<()> {
    get_runner(state, id).await?;

    let held: Vec<Job> = state
        .store
        .list_running_jobs()
        .await?
        .into_iter()
        .filter(|job| job.runner_id == Some(id))
        .collect();

    for job in held {
        fail_job(state, job.id, FailureReason::RunnerSystemFailure).await?;
    }

    state.store.delete_runner(id).await?;
    tracing::info!("Runner deregistered: {}", id);

    Ok(())
}

/// Runners that could execute the job, idle first then oldest
pub async fn match_job(state: &AppState, job_id: Uuid) -> Result<Vec<RunnerSummary>> {
    let job = job_service::get_job(state, job_id).await?;
    let project = project_service::get_project(state, job.project_id).await?;
    let runners = state.store.list_runners().await?;
    let running = running_counts(state).await?;
    let busy: HashSet<Uuid> = running.keys().copied().collect();

    Ok(matching::candidates(&runners, &project, &job, &busy)
        .into_iter()
        .cloned()
        .map(|runner| summarize(state, runner, &running))
        .collect())
}

/// Hand the oldest matching pending job to the runner
///
/// Returns `None` when nothing matches. Losing a claim race to another
/// runner moves on to the next job.
pub async fn request_job(state: &AppState, token: &str) -> Result<Option<JobPayload>> {
    let runner = heartbeat(state, token).await?;

    if runner.paused {
        return Ok(None);
    }

    let mut projects: HashMap<Uuid, Option<Project>> = HashMap::new();

    for job in state.store.list_pending_jobs().await? {
        if !projects.contains_key(&job.project_id) {
            let project = state.store.get_project(job.project_id).await?;
            projects.insert(job.project_id, project);
        }
        let Some(Some(project)) = projects.get(&job.project_id) else {
            continue;
        };

        if !matching::can_pick(&runner, project, &job) {
            continue;
        }

        let mut claimed = job.clone();
        let from = claimed.transition(JobStatus::Running, Utc::now())?;
        claimed.runner_id = Some(runner.id);

        if !job_service::write_transition(state, &claimed, from).await? {
            tracing::debug!("Runner {} lost claim on job {}", runner.id, job.id);
            continue;
        }

        tracing::info!("Job {} assigned to runner {}", claimed.id, runner.id);

        let pipeline = pipeline_service::process_pipeline(state, claimed.pipeline_id).await?;
        return Ok(Some(build_payload(&claimed, &pipeline)));
    }

    Ok(None)
}

/// Fail a running job on behalf of the orchestrator
pub(crate) async fn fail_job(state: &AppState, job_id: Uuid, reason: FailureReason) -> Result<bool> {
    let job = job_service::get_job(state, job_id).await?;
    let _guard = state.locks.lock(job.pipeline_id).await;
    let mut job = job_service::get_job(state, job_id).await?;

    if job.status != JobStatus::Running {
        return Ok(false);
    }

    let from = job.transition(JobStatus::Failed, Utc::now())?;
    job.failure_reason = Some(reason);

    if !job_service::write_transition(state, &job, from).await? {
        return Ok(false);
    }

    tracing::warn!("Job {} failed: {}", job.id, reason);

    quota_service::record_job_usage(state, &job).await?;
    pipeline_service::process_locked(state, job.pipeline_id).await?;

    Ok(true)
}

fn build_payload(job: &Job, pipeline: &Pipeline) -> JobPayload {
    let mut variables = pipeline.variables.clone();
    variables.extend([
        Variable::new("CI", "true"),
        Variable::new("CI_PIPELINE_ID", pipeline.id.to_string()),
        Variable::new("CI_PIPELINE_SOURCE", pipeline.source.as_str()),
        Variable::new("CI_PROJECT_ID", pipeline.project_id.to_string()),
        Variable::new("CI_JOB_ID", job.id.to_string()),
        Variable::new("CI_JOB_NAME", job.name.clone()),
        Variable::new("CI_JOB_STAGE", job.stage.clone()),
        Variable::new("CI_COMMIT_REF_NAME", pipeline.ref_name.clone()),
        Variable::new("CI_COMMIT_SHA", pipeline.sha.clone()),
    ]);

    JobPayload {
        job_id: job.id,
        pipeline_id: job.pipeline_id,
        project_id: job.project_id,
        name: job.name.clone(),
        stage: job.stage.clone(),
        script: job.script.clone(),
        timeout_seconds: job.timeout_seconds,
        artifacts: job.artifacts.clone(),
        variables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{TestEnv, definition, job_def};
    use gantry_core::domain::pipeline::PipelineStatus;
    use gantry_core::domain::runner::RunnerStatus;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let env = TestEnv::new().await;
        let registered = register_runner(
            &env.state,
            RegisterRunner {
                description: "builder".to_string(),
                scope: RunnerScope::Shared,
                tags: BTreeSet::from(["docker".to_string()]),
                run_untagged: false,
            },
        )
        .await
        .unwrap();

        let runner = authenticate(&env.state, &registered.token).await.unwrap();
        assert_eq!(runner.id, registered.id);
        assert_ne!(runner.token_hash, registered.token);

        assert!(matches!(
            authenticate(&env.state, "grt_bogus").await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_register_project_runner_for_unknown_project() {
        let env = TestEnv::new().await;
        let result = register_runner(
            &env.state,
            RegisterRunner {
                description: String::new(),
                scope: RunnerScope::Project {
                    project_ids: BTreeSet::from([Uuid::new_v4()]),
                },
                tags: BTreeSet::new(),
                run_untagged: true,
            },
        )
        .await;

        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_request_job_claims_oldest_and_builds_payload() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;
        let (runner, token) = env.runner(&[]).await;

        let payload = request_job(&env.state, &token).await.unwrap().unwrap();
        assert_eq!(payload.job_id, view.jobs[0].job.id);
        assert_eq!(payload.script, vec!["make build".to_string()]);
        assert!(payload.variables.iter().any(|v| v.key == "CI_JOB_ID" && v.value == payload.job_id.to_string()));
        assert!(payload.variables.iter().any(|v| v.key == "CI_COMMIT_REF_NAME" && v.value == "main"));

        let job = job_service::get_job(&env.state, payload.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.runner_id, Some(runner.id));

        let pipeline = pipeline_service::get_pipeline(&env.state, view.pipeline.id).await.unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Running);

        assert!(request_job(&env.state, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paused_runner_gets_nothing() {
        let env = TestEnv::new().await;
        env.create_pipeline().await;
        let (runner, token) = env.runner(&[]).await;

        pause_runner(&env.state, runner.id).await.unwrap();
        assert!(request_job(&env.state, &token).await.unwrap().is_none());

        let summary = resume_runner(&env.state, runner.id).await.unwrap();
        assert_eq!(summary.status, RunnerStatus::Online);
        assert!(request_job(&env.state, &token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tags_must_match() {
        let mut def = job_def("gpu-train");
        def.tags = BTreeSet::from(["gpu".to_string()]);
        let env = TestEnv::with_definition(definition(vec![("train", vec![def])])).await;
        env.create_pipeline().await;

        let (_, docker) = env.runner(&["docker"]).await;
        assert!(request_job(&env.state, &docker).await.unwrap().is_none());

        let (_, gpu) = env.runner(&["gpu", "linux"]).await;
        assert!(request_job(&env.state, &gpu).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_shared_runner_respects_project_setting() {
        let mut env = TestEnv::new().await;
        env.project.shared_runners_enabled = false;
        env.state.store.save_project(&env.project).await.unwrap();
        env.create_pipeline().await;

        let (_, shared) = env.runner(&[]).await;
        assert!(request_job(&env.state, &shared).await.unwrap().is_none());

        let registered = register_runner(
            &env.state,
            RegisterRunner {
                description: "project runner".to_string(),
                scope: RunnerScope::Project {
                    project_ids: BTreeSet::from([env.project.id]),
                },
                tags: BTreeSet::new(),
                run_untagged: true,
            },
        )
        .await
        .unwrap();
        assert!(request_job(&env.state, &registered.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let env = TestEnv::with_definition(definition(vec![("build", vec![job_def("only")])])).await;
        env.create_pipeline().await;

        let mut tokens = Vec::new();
        for _ in 0..8 {
            tokens.push(env.runner(&[]).await.1);
        }

        let state = Arc::new(env.state.clone());
        let handles: Vec<_> = tokens
            .into_iter()
            .map(|token| {
                let state = state.clone();
                tokio::spawn(async move { request_job(&state, &token).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_match_job_orders_idle_first() {
        let env = TestEnv::with_definition(definition(vec![(
            "build",
            vec![job_def("one"), job_def("two")],
        )]))
        .await;
        let view = env.create_pipeline().await;
        let (busy, busy_token) = env.runner(&[]).await;
        let (idle, _) = env.runner(&[]).await;
        env.claim(&busy_token).await;

        let remaining = state_pending(&env, view.pipeline.id).await;

        let candidates = match_job(&env.state, remaining).await.unwrap();
        let ids: Vec<Uuid> = candidates.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![idle.id, busy.id]);
    }

    async fn state_pending(env: &TestEnv, pipeline_id: Uuid) -> Uuid {
        env.state
            .store
            .list_jobs(pipeline_id)
            .await
            .unwrap()
            .into_iter()
            .find(|j| j.status == JobStatus::Pending)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_deregister_fails_held_jobs() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;
        let (runner, token) = env.runner(&[]).await;
        let payload = env.claim(&token).await;

        deregister_runner(&env.state, runner.id).await.unwrap();

        let job = job_service::get_job(&env.state, payload.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason, Some(FailureReason::RunnerSystemFailure));
        assert!(matches!(
            authenticate(&env.state, &token).await,
            Err(ServiceError::InvalidToken)
        ));

        let pipeline = pipeline_service::get_pipeline(&env.state, view.pipeline.id).await.unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Failed);
    }
}
