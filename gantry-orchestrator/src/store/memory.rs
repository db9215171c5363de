//! In-memory store
//!
//! A single mutex guards all state, so every method is atomic with respect
//! to the others. Used by tests and when no `DATABASE_URL` is configured.

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
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    projects: HashMap<Uuid, Project>,
    memberships: HashMap<(Uuid, Uuid), AccessLevel>,
    pipelines: HashMap<Uuid, Pipeline>,
    /// Insertion order is kept so listings are stable
    jobs: Vec<Job>,
    runners: HashMap<Uuid, Runner>,
    triggers: HashMap<Uuid, Trigger>,
    quotas: HashMap<Uuid, QuotaRecord>,
    traces: HashMap<Uuid, Vec<LogEntry>>,
    artifacts: HashMap<Uuid, (Artifact, Vec<u8>)>,
}

impl Inner {
    fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Projects
    // =========================================================================

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.projects.contains_key(&project.id) {
            return Err(StoreError::Conflict(format!("project {}", project.id)));
        }
        inner.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.inner.lock().projects.get(&id).cloned())
    }

    async fn save_project(&self, project: &Project) -> StoreResult<()> {
        self.inner.lock().projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn set_membership(&self, membership: &Membership) -> StoreResult<()> {
        self.inner.lock().memberships.insert(
            (membership.project_id, membership.user_id),
            membership.access_level,
        );
        Ok(())
    }

    async fn access_level(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<AccessLevel>> {
        Ok(self
            .inner
            .lock()
            .memberships
            .get(&(project_id, user_id))
            .copied())
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    async fn insert_pipeline(&self, pipeline: &Pipeline, jobs: &[Job]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.pipelines.contains_key(&pipeline.id) {
            return Err(StoreError::Conflict(format!("pipeline {}", pipeline.id)));
        }
        inner.pipelines.insert(pipeline.id, pipeline.clone());
        inner.jobs.extend(jobs.iter().cloned());
        Ok(())
    }

    async fn get_pipeline(&self, id: Uuid) -> StoreResult<Option<Pipeline>> {
        Ok(self.inner.lock().pipelines.get(&id).cloned())
    }

    async fn list_pipelines(&self, project_id: Uuid) -> StoreResult<Vec<Pipeline>> {
        let inner = self.inner.lock();
        let mut pipelines: Vec<Pipeline> = inner
            .pipelines
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pipelines)
    }

    async fn save_pipeline(&self, pipeline: &Pipeline) -> StoreResult<()> {
        self.inner
            .lock()
            .pipelines
            .insert(pipeline.id, pipeline.clone());
        Ok(())
    }

    async fn delete_pipeline(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        if inner.pipelines.remove(&id).is_none() {
            return Ok(false);
        }

        let removed: Vec<Uuid> = inner
            .jobs
            .iter()
            .filter(|job| job.pipeline_id == id)
            .map(|job| job.id)
            .collect();
        inner.jobs.retain(|job| job.pipeline_id != id);
        for job_id in removed {
            inner.traces.remove(&job_id);
            inner.artifacts.remove(&job_id);
        }

        Ok(true)
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.jobs.iter().any(|j| j.id == job.id) {
            return Err(StoreError::Conflict(format!("job {}", job.id)));
        }
        inner.jobs.push(job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        Ok(self.inner.lock().jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn list_jobs(&self, pipeline_id: Uuid) -> StoreResult<Vec<Job>> {
        Ok(self
            .inner
            .lock()
            .jobs
            .iter()
            .filter(|j| j.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn list_pending_jobs(&self) -> StoreResult<Vec<Job>> {
        let inner = self.inner.lock();
        let mut jobs: Vec<Job> = inner
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.queued_at.unwrap_or(j.created_at));
        Ok(jobs)
    }

    async fn list_running_jobs(&self) -> StoreResult<Vec<Job>> {
        Ok(self
            .inner
            .lock()
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .cloned()
            .collect())
    }

    async fn save_job(&self, job: &Job) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        match inner.jobs.iter().position(|j| j.id == job.id) {
            Some(i) => inner.jobs[i] = job.clone(),
            None => inner.jobs.push(job.clone()),
        }
        Ok(())
    }

    async fn compare_and_swap_job(&self, job: &Job, expected: JobStatus) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        match inner.job_mut(job.id) {
            Some(stored) if stored.status == expected => {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_retry(
        &self,
        original_id: Uuid,
        expected: JobStatus,
        replacement: &Job,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        if inner.jobs.iter().any(|j| j.id == replacement.id) {
            return Err(StoreError::Conflict(format!("job {}", replacement.id)));
        }

        match inner.job_mut(original_id) {
            Some(stored) if stored.status == expected && !stored.retried => {
                stored.retried = true;
            }
            _ => return Ok(false),
        }
        inner.jobs.push(replacement.clone());
        Ok(true)
    }

    // =========================================================================
    // Runners
    // =========================================================================

    async fn insert_runner(&self, runner: &Runner) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner
            .runners
            .values()
            .any(|r| r.id == runner.id || r.token_hash == runner.token_hash)
        {
            return Err(StoreError::Conflict(format!("runner {}", runner.id)));
        }
        inner.runners.insert(runner.id, runner.clone());
        Ok(())
    }

    async fn get_runner(&self, id: Uuid) -> StoreResult<Option<Runner>> {
        Ok(self.inner.lock().runners.get(&id).cloned())
    }

    async fn find_runner_by_token(&self, token_hash: &str) -> StoreResult<Option<Runner>> {
        Ok(self
            .inner
            .lock()
            .runners
            .values()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn list_runners(&self) -> StoreResult<Vec<Runner>> {
        let inner = self.inner.lock();
        let mut runners: Vec<Runner> = inner.runners.values().cloned().collect();
        runners.sort_by_key(|r| r.registered_at);
        Ok(runners)
    }

    async fn save_runner(&self, runner: &Runner) -> StoreResult<()> {
        self.inner.lock().runners.insert(runner.id, runner.clone());
        Ok(())
    }

    async fn delete_runner(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.lock().runners.remove(&id).is_some())
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    async fn insert_trigger(&self, trigger: &Trigger) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner
            .triggers
            .values()
            .any(|t| t.id == trigger.id || t.token_hash == trigger.token_hash)
        {
            return Err(StoreError::Conflict(format!("trigger {}", trigger.id)));
        }
        inner.triggers.insert(trigger.id, trigger.clone());
        Ok(())
    }

    async fn get_trigger(&self, id: Uuid) -> StoreResult<Option<Trigger>> {
        Ok(self.inner.lock().triggers.get(&id).cloned())
    }

    async fn find_trigger_by_token(&self, token_hash: &str) -> StoreResult<Option<Trigger>> {
        Ok(self
            .inner
            .lock()
            .triggers
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn list_triggers(&self, project_id: Uuid) -> StoreResult<Vec<Trigger>> {
        let inner = self.inner.lock();
        let mut triggers: Vec<Trigger> = inner
            .triggers
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        triggers.sort_by_key(|t| t.created_at);
        Ok(triggers)
    }

    async fn save_trigger(&self, trigger: &Trigger) -> StoreResult<()> {
        self.inner
            .lock()
            .triggers
            .insert(trigger.id, trigger.clone());
        Ok(())
    }

    // =========================================================================
    // Quotas
    // =========================================================================

    async fn get_quota(&self, namespace_id: Uuid) -> StoreResult<Option<QuotaRecord>> {
        Ok(self.inner.lock().quotas.get(&namespace_id).cloned())
    }

    async fn set_quota_limit(
        &self,
        namespace_id: Uuid,
        limit_minutes: Option<u64>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord> {
        let mut inner = self.inner.lock();
        let record = inner
            .quotas
            .entry(namespace_id)
            .or_insert_with(|| QuotaRecord::new(namespace_id, now));
        record.limit_minutes = limit_minutes;
        Ok(record.clone())
    }

    async fn add_quota_usage(
        &self,
        namespace_id: Uuid,
        minutes: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<QuotaRecord> {
        let mut inner = self.inner.lock();
        let record = inner
            .quotas
            .entry(namespace_id)
            .or_insert_with(|| QuotaRecord::new(namespace_id, now));
        record.consumed_minutes = record.consumed_minutes.saturating_add(minutes);
        Ok(record.clone())
    }

    // =========================================================================
    // Traces
    // =========================================================================

    async fn append_trace(&self, job_id: Uuid, entries: &[LogEntry]) -> StoreResult<()> {
        self.inner
            .lock()
            .traces
            .entry(job_id)
            .or_default()
            .extend(entries.iter().cloned());
        Ok(())
    }

    async fn get_trace(&self, job_id: Uuid) -> StoreResult<Vec<LogEntry>> {
        Ok(self
            .inner
            .lock()
            .traces
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    async fn put_artifact(&self, artifact: &Artifact, data: Vec<u8>) -> StoreResult<()> {
        self.inner
            .lock()
            .artifacts
            .insert(artifact.job_id, (artifact.clone(), data));
        Ok(())
    }

    async fn get_artifact(&self, job_id: Uuid) -> StoreResult<Option<(Artifact, Vec<u8>)>> {
        Ok(self.inner.lock().artifacts.get(&job_id).cloned())
    }

    async fn delete_expired_artifacts(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.inner.lock();
        let before = inner.artifacts.len();
        inner.artifacts.retain(|_, (artifact, _)| !artifact.is_expired(now));
        Ok((before - inner.artifacts.len()) as u64)
    }
}
