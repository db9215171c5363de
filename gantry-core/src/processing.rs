//! Stage processing
//!
//! Decides what each `created` job becomes once its stage is reached. The
//! functions here are pure: they read a snapshot of a pipeline's jobs and
//! return the status changes to apply. Running them again on the result
//! yields no further changes.

use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::composite::composite_status;
use crate::domain::job::{Job, JobStatus, When};
use crate::domain::pipeline::PipelineStatus;

/// A status change produced by processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub job_id: Uuid,
    pub to: JobStatus,
}

/// What a `created` job becomes given the composite of all earlier stages
///
/// Returns `None` when earlier stages have not settled.
pub fn decide(when: When, prior: PipelineStatus) -> Option<JobStatus> {
    use JobStatus::*;

    let status = match prior {
        PipelineStatus::Success | PipelineStatus::Skipped => match when {
            When::OnSuccess | When::Always => Pending,
            When::OnFailure => Skipped,
            When::Manual => Manual,
        },
        PipelineStatus::Failed => match when {
            When::OnFailure | When::Always => Pending,
            When::OnSuccess | When::Manual => Skipped,
        },
        PipelineStatus::Canceled => match when {
            When::Always => Pending,
            When::OnSuccess | When::OnFailure | When::Manual => Skipped,
        },
        _ => return None,
    };

    Some(status)
}

/// Returns true when no job of the stage can still change the outcome
fn stage_complete(jobs: &[&Job]) -> bool {
    jobs.iter().all(|job| match job.status {
        JobStatus::Success | JobStatus::Failed | JobStatus::Canceled | JobStatus::Skipped => true,
        JobStatus::Manual => job.allow_failure,
        _ => false,
    })
}

fn latest(jobs: &[Job]) -> Vec<Job> {
    jobs.iter().filter(|job| !job.retried).cloned().collect()
}

/// Walks the stages in order and decides every reachable `created` job
///
/// Stops at the first stage that is still incomplete after its decisions.
pub fn process(jobs: &[Job]) -> Vec<Decision> {
    let mut snapshot = latest(jobs);
    let mut decisions = Vec::new();

    let mut stages: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, job) in snapshot.iter().enumerate() {
        stages.entry(job.stage_idx).or_default().push(i);
    }

    for (&stage_idx, members) in &stages {
        let prior = composite_status(snapshot.iter().filter(|job| job.stage_idx < stage_idx));

        for &i in members {
            let job = &mut snapshot[i];
            if job.status != JobStatus::Created {
                continue;
            }

            if let Some(to) = decide(job.when, prior.status) {
                job.status = to;
                decisions.push(Decision { job_id: job.id, to });
            }
        }

        let stage_jobs: Vec<&Job> = members.iter().map(|&i| &snapshot[i]).collect();
        if !stage_complete(&stage_jobs) {
            break;
        }
    }

    decisions
}

/// Skipped jobs of later stages that go back to `created` after a retry
pub fn reset_skipped_after(jobs: &[Job], stage_idx: u32) -> Vec<Decision> {
    jobs.iter()
        .filter(|job| !job.retried && job.stage_idx > stage_idx)
        .filter(|job| job.status == JobStatus::Skipped)
        .map(|job| Decision {
            job_id: job.id,
            to: JobStatus::Created,
        })
        .collect()
}

/// Applies decisions to an in-memory snapshot
pub fn apply(jobs: &mut [Job], decisions: &[Decision]) {
    let by_id: HashMap<Uuid, JobStatus> = decisions.iter().map(|d| (d.job_id, d.to)).collect();
    for job in jobs.iter_mut() {
        if let Some(to) = by_id.get(&job.id) {
            job.status = *to;
        }
    }
}
