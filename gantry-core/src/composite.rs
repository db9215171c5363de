//! Aggregate status over a set of jobs
//!
//! Used for the pipeline status and for the "prior stages" status that
//! decides what a `created` job becomes.

use std::collections::BTreeSet;

use crate::domain::job::{Job, JobStatus};
use crate::domain::pipeline::PipelineStatus;

/// Result of folding job statuses into one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composite {
    pub status: PipelineStatus,
    /// Set when an allowed-to-fail job failed or was canceled
    pub warnings: bool,
}

/// How a single job counts towards the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    Status(JobStatus),
    /// Allowed-to-fail job that did not succeed
    Warning,
    /// Manual job that is allowed to fail
    Ignored,
}

fn classify(job: &Job) -> Class {
    match job.status {
        JobStatus::Failed | JobStatus::Canceled if job.allow_failure => Class::Warning,
        JobStatus::Manual if job.allow_failure => Class::Ignored,
        status => Class::Status(status),
    }
}

/// Folds the latest jobs into one status
///
/// Jobs marked `retried` are ignored.
pub fn composite_status<'a, I>(jobs: I) -> Composite
where
    I: IntoIterator<Item = &'a Job>,
{
    let classes: BTreeSet<Class> = jobs
        .into_iter()
        .filter(|job| !job.retried)
        .map(classify)
        .collect();

    Composite {
        status: fold(&classes),
        warnings: classes.contains(&Class::Warning),
    }
}

fn fold(classes: &BTreeSet<Class>) -> PipelineStatus {
    use JobStatus::*;

    let only = |allowed: &[JobStatus]| {
        classes.iter().all(|class| match class {
            Class::Status(status) => allowed.contains(status),
            Class::Warning | Class::Ignored => true,
        })
    };
    let any = |status: JobStatus| classes.contains(&Class::Status(status));
    let only_ignored = |allowed: &[JobStatus]| {
        classes.iter().all(|class| match class {
            Class::Status(status) => allowed.contains(status),
            Class::Ignored => true,
            Class::Warning => false,
        })
    };

    if only_ignored(&[Skipped]) {
        PipelineStatus::Skipped
    } else if only(&[Success, Skipped]) {
        PipelineStatus::Success
    } else if only(&[Created]) {
        PipelineStatus::Created
    } else if only(&[Canceled, Success, Skipped]) {
        PipelineStatus::Canceled
    } else if only(&[Pending, Created, Skipped]) {
        PipelineStatus::Pending
    } else if any(Running) || any(Pending) {
        PipelineStatus::Running
    } else if any(Manual) {
        PipelineStatus::Manual
    } else if any(Created) {
        PipelineStatus::Running
    } else {
        PipelineStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::fixtures::job;

    fn jobs(statuses: &[(JobStatus, bool)]) -> Vec<Job> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, (status, allow_failure))| {
                let mut job = job(&format!("job{}", i), 0);
                job.status = *status;
                job.allow_failure = *allow_failure;
                job
            })
            .collect()
    }

    fn status_of(statuses: &[(JobStatus, bool)]) -> Composite {
        composite_status(&jobs(statuses))
    }

    #[test]
    fn test_empty_is_skipped() {
        assert_eq!(
            composite_status(std::iter::empty::<&Job>()).status,
            PipelineStatus::Skipped
        );
    }

    #[test]
    fn test_basic_folds() {
        use JobStatus::*;

        assert_eq!(
            status_of(&[(Success, false), (Skipped, false)]).status,
            PipelineStatus::Success
        );
        assert_eq!(
            status_of(&[(Created, false), (Created, false)]).status,
            PipelineStatus::Created
        );
        assert_eq!(
            status_of(&[(Canceled, false), (Success, false)]).status,
            PipelineStatus::Canceled
        );
        assert_eq!(
            status_of(&[(Pending, false), (Created, false)]).status,
            PipelineStatus::Pending
        );
        assert_eq!(
            status_of(&[(Running, false), (Failed, false)]).status,
            PipelineStatus::Running
        );
        assert_eq!(
            status_of(&[(Success, false), (Created, false)]).status,
            PipelineStatus::Running
        );
        assert_eq!(
            status_of(&[(Failed, false), (Manual, false)]).status,
            PipelineStatus::Manual
        );
        assert_eq!(
            status_of(&[(Failed, false), (Success, false)]).status,
            PipelineStatus::Failed
        );
        assert_eq!(
            status_of(&[(Failed, false), (Canceled, false)]).status,
            PipelineStatus::Failed
        );
    }

    #[test]
    fn test_allowed_failure_is_success_with_warnings() {
        use JobStatus::*;

        let composite = status_of(&[(Success, false), (Failed, true)]);
        assert_eq!(composite.status, PipelineStatus::Success);
        assert!(composite.warnings);

        let composite = status_of(&[(Canceled, true)]);
        assert_eq!(composite.status, PipelineStatus::Success);
        assert!(composite.warnings);
    }

    #[test]
    fn test_allowed_failure_never_yields_failed() {
        for status in JobStatus::ALL {
            let composite = status_of(&[(status, true)]);
            assert_ne!(composite.status, PipelineStatus::Failed, "{}", status);
        }
    }

    #[test]
    fn test_optional_manual_is_ignored() {
        use JobStatus::*;

        assert_eq!(
            status_of(&[(Success, false), (Manual, true)]).status,
            PipelineStatus::Success
        );
        assert_eq!(
            status_of(&[(Manual, true)]).status,
            PipelineStatus::Skipped
        );
        assert_eq!(
            status_of(&[(Manual, false)]).status,
            PipelineStatus::Manual
        );
    }

    #[test]
    fn test_retried_jobs_do_not_count() {
        let mut jobs = jobs(&[(JobStatus::Failed, false), (JobStatus::Success, false)]);
        jobs[0].retried = true;
        assert_eq!(composite_status(&jobs).status, PipelineStatus::Success);
    }
}
