//! Fixtures for service tests

use chrono::{DateTime, Duration, Utc};
use gantry_core::domain::job::{FailureReason, JobOutcome, When};
use gantry_core::domain::pipeline::{JobDefinition, PipelineDefinition, PipelineSource, StageDefinition};
use gantry_core::domain::project::{AccessLevel, Project};
use gantry_core::domain::runner::{Runner, RunnerScope};
use gantry_core::dto::job::{CompleteJob, JobPayload};
use gantry_core::dto::pipeline::{CreatePipeline, PipelineView};
use gantry_core::dto::project::{CreateProject, SetMember};
use gantry_core::dto::runner::RegisterRunner;
use async_trait::async_trait;
use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::job::{Job, JobStatus};
use gantry_core::domain::log::LogEntry;
use gantry_core::domain::pipeline::Pipeline;
use gantry_core::domain::project::Membership;
use gantry_core::domain::quota::QuotaRecord;
use gantry_core::domain::trigger::Trigger;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::config::Config;
use crate::service::{job_service, pipeline_service, project_service, runner_service};
use crate::state::AppState;
use crate::store::{MemoryStore, Store, StoreError, StoreResult};

pub fn job_def(name: &str) -> JobDefinition {
    JobDefinition {
        name: name.to_string(),
        script: vec![format!("echo {}", name)],
        when: When::OnSuccess,
        allow_failure: None,
        tags: BTreeSet::new(),
        timeout_seconds: None,
        artifacts: None,
    }
}

pub fn definition(stages: Vec<(&str, Vec<JobDefinition>)>) -> PipelineDefinition {
    PipelineDefinition {
        stages: stages
            .into_iter()
            .map(|(name, jobs)| StageDefinition {
                name: name.to_string(),
                jobs,
            })
            .collect(),
    }
}

/// `build: [compile]` then `test: [unit]`
pub fn default_definition() -> PipelineDefinition {
    let mut compile = job_def("compile");
    compile.script = vec!["make build".to_string()];
    let mut unit = job_def("unit");
    unit.script = vec!["make test".to_string()];

    definition(vec![("build", vec![compile]), ("test", vec![unit])])
}

/// In-memory state with one project and a maintainer
pub struct TestEnv {
    pub state: AppState,
    pub project: Project,
    pub maintainer: Uuid,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_definition(default_definition()).await
    }

    pub async fn with_definition(definition: PipelineDefinition) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), definition).await
    }

    pub async fn with_store(store: Arc<dyn Store>, definition: PipelineDefinition) -> Self {
        let state = AppState::new(store, Config::default());

        let project = project_service::create_project(
            &state,
            CreateProject {
                namespace_id: Uuid::new_v4(),
                name: "web".to_string(),
                shared_runners_enabled: true,
                default_timeout_seconds: None,
            },
        )
        .await
        .unwrap();
        let project = project_service::set_definition(&state, project.id, definition)
            .await
            .unwrap();

        let env = TestEnv {
            state,
            project,
            maintainer: Uuid::new_v4(),
        };
        env.set_access(env.maintainer, AccessLevel::Maintainer).await;
        env
    }

    /// Adds a new member with the given access level
    pub async fn member(&self, level: AccessLevel) -> Uuid {
        let user_id = Uuid::new_v4();
        self.set_access(user_id, level).await;
        user_id
    }

    pub async fn set_access(&self, user_id: Uuid, access_level: AccessLevel) {
        project_service::set_member(
            &self.state,
            self.project.id,
            SetMember {
                user_id,
                access_level,
            },
        )
        .await
        .unwrap();
    }

    /// Registers an online shared runner that also runs untagged jobs
    pub async fn runner(&self, tags: &[&str]) -> (Runner, String) {
        let registered = runner_service::register_runner(
            &self.state,
            RegisterRunner {
                description: format!("runner {:?}", tags),
                scope: RunnerScope::Shared,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                run_untagged: true,
            },
        )
        .await
        .unwrap();

        let runner = runner_service::authenticate(&self.state, &registered.token)
            .await
            .unwrap();
        (runner, registered.token)
    }

    pub async fn create_pipeline(&self) -> PipelineView {
        pipeline_service::create_pipeline(
            &self.state,
            self.project.id,
            CreatePipeline {
                ref_name: "main".to_string(),
                sha: "0123abcd".to_string(),
                variables: vec![],
                user_id: self.maintainer,
                source: PipelineSource::Web,
            },
        )
        .await
        .unwrap()
    }

    /// Requests a job and expects one to be handed out
    pub async fn claim(&self, token: &str) -> JobPayload {
        runner_service::request_job(&self.state, token)
            .await
            .unwrap()
            .expect("a job to be assigned")
    }

    pub async fn succeed(&self, token: &str, job_id: Uuid) {
        self.complete(token, job_id, JobOutcome::Success, Some(0)).await;
    }

    pub async fn fail(&self, token: &str, job_id: Uuid) {
        let outcome = JobOutcome::Failed {
            reason: FailureReason::ScriptFailure,
        };
        self.complete(token, job_id, outcome, Some(1)).await;
    }

    async fn complete(&self, token: &str, job_id: Uuid, outcome: JobOutcome, exit_code: Option<i32>) {
        let runner = runner_service::authenticate(&self.state, token).await.unwrap();
        job_service::complete_job(&self.state, &runner, job_id, CompleteJob { outcome, exit_code })
            .await
            .unwrap();
    }

    /// Moves a running job's start time into the past
    pub async fn backdate_start(&self, job_id: Uuid, seconds: i64) {
        let mut job = job_service::get_job(&self.state, job_id).await.unwrap();
        job.started_at = Some(Utc::now() - Duration::seconds(seconds));
        self.state.store.save_job(&job).await.unwrap();
    }
}

/// Memory store that can interleave a concurrent runner claim or refuse
/// job inserts
#[derive(Default)]
pub struct InterleavingStore {
    inner: MemoryStore,
    claim_after_list: Mutex<Option<Uuid>>,
    refuse_job_inserts: AtomicBool,
}

impl InterleavingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `list_jobs` claims the first pending job for `runner_id`
    /// right after taking its snapshot
    pub fn claim_after_next_list(&self, runner_id: Uuid) {
        *self.claim_after_list.lock() = Some(runner_id);
    }

    pub fn refuse_job_inserts(&self, refuse: bool) {
        self.refuse_job_inserts.store(refuse, Ordering::SeqCst);
    }

    fn check_inserts(&self) -> StoreResult<()> {
        if self.refuse_job_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("job inserts refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InterleavingStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.inner.insert_project(project).await
    }
    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        self.inner.get_project(id).await
    }
    async fn save_project(&self, project: &Project) -> StoreResult<()> {
        self.inner.save_project(project).await
    }
    async fn set_membership(&self, membership: &Membership) -> StoreResult<()> {
        self.inner.set_membership(membership).await
    }
    async fn access_level(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<AccessLevel>> {
        self.inner.access_level(project_id, user_id).await
    }

    async fn insert_pipeline(&self, pipeline: &Pipeline, jobs: &[Job]) -> StoreResult<()> {
        self.inner.insert_pipeline(pipeline, jobs).await
    }
    async fn get_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>> {
        self.inner.get_pipeline(id).await
    }
    async fn list_pipelines(&self, project_id: Uuid) -> StoreResult<Vec<Pipeline>> {
        self.inner.list_pipelines(project_id).await
    }
    async fn save_pipeline(&self, pipeline: &Pipeline) -> StoreResult<()> {
        self.inner.save_pipeline(pipeline).await
    }
    async fn delete_pipeline(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_pipeline(id).await
    }

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        self.check_inserts()?;
        self.inner.insert_job(job).await
    }
    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        self.inner.get_job(id).await
    }
    async fn list_jobs(&self, pipeline_id: Uuid) -> StoreResult<Vec<Job>> {
        let jobs = self.inner.list_jobs(pipeline_id).await?;

        let claimant = self.claim_after_list.lock().take();
        if let Some(runner_id) = claimant {
            if let Some(job) = jobs.iter().find(|j| j.status == JobStatus::Pending) {
                let mut claimed = job.clone();
                claimed.status = JobStatus::Running;
                claimed.started_at = Some(Utc::now());
                claimed.runner_id = Some(runner_id);
                self.inner
                    .compare_and_swap_job(&claimed, JobStatus::Pending)
                    .await?;
            }
        }

        Ok(jobs)
    }
    async fn list_pending_jobs(&self) -> StoreResult<Vec<Job>> {
        self.inner.list_pending_jobs().await
    }
    async fn list_running_jobs(&self) -> StoreResult<Vec<Job>> {
        self.inner.list_running_jobs().await
    }
    async fn save_job(&self, job: &Job) -> StoreResult<()> {
        self.inner.save_job(job).await
    }
    async fn compare_and_swap_job(&self, job: &Job, expected: JobStatus) -> StoreResult<bool> {
        self.inner.compare_and_swap_job(job, expected).await
    }
    async fn record_retry(
        &self,
        original_id: Uuid,
        expected: JobStatus,
        replacement: &Job,
    ) -> StoreResult<bool> {
        self.check_inserts()?;
        self.inner.record_retry(original_id, expected, replacement).await
    }

    async fn insert_runner(&self, runner: &Runner) -> StoreResult<()> {
        self.inner.insert_runner(runner).await
    }
    async fn get_runner(&self, id: Uuid) -> StoreResult<Option<Runner>> {
        self.inner.get_runner(id).await
    }
    async fn find_runner_by_token(&self, token_hash: &str) -> StoreResult<Option<Runner>> {
        self.inner.find_runner_by_token(token_hash).await
    }
    async fn list_runners(&self) -> StoreResult<Vec<Runner>> {
        self.inner.list_runners().await
    }
    async fn save_runner(&self, runner: &Runner) -> StoreResult<()> {
        self.inner.save_runner(runner).await
    }
    async fn delete_runner(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_runner(id).await
    }

    async fn insert_trigger(&self, trigger: &Trigger) -> StoreResult<()> {
        self.inner.insert_trigger(trigger).await
    }
    async fn get_trigger(&self, id: Uuid) -> StoreResult<Option<Trigger>> {
        self.inner.get_trigger(id).await
    }
    async fn find_trigger_by_token(&self, token_hash: &str) -> StoreResult<Option<Trigger>> {
        self.inner.find_trigger_by_token(token_hash).await
    }
    async fn list_triggers(&self, project_id: Uuid) -> StoreResult<Vec<Trigger>> {
        self.inner.list_triggers(project_id).await
    }
    async fn save_trigger(&self, trigger: &Trigger) -> StoreResult<()> {
        self.inner.save_trigger(trigger).await
    }

    async fn get_quota(&self, namespace_id: Uuid) -> StoreResult<Option<QuotaRecord>> {
        self.inner.get_quota(namespace_id).await
    }
    async fn set_quota_limit(
        &self,
        namespace_id: Uuid,
        limit_minutes: Option<u64>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord> {
        self.inner.set_quota_limit(namespace_id, limit_minutes, now).await
    }
    async fn add_quota_usage(
        &self,
        namespace_id: Uuid,
        minutes: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord> {
        self.inner.add_quota_usage(namespace_id, minutes, now).await
    }

    async fn append_trace(&self, job_id: Uuid, entries: &[LogEntry]) -> StoreResult<()> {
        self.inner.append_trace(job_id, entries).await
    }
    async fn get_trace(&self, job_id: Uuid) -> StoreResult<Vec<LogEntry>> {
        self.inner.get_trace(job_id).await
    }

    async fn put_artifact(&self, artifact: &Artifact, data: Vec<u8>) -> StoreResult<()> {
        self.inner.put_artifact(artifact, data).await
    }
    async fn get_artifact(&self, job_id: Uuid) -> StoreResult<Option<(Artifact, Vec<u8>)>> {
        self.inner.get_artifact(job_id).await
    }
    async fn delete_expired_artifacts(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.delete_expired_artifacts(now).await
    }
}
