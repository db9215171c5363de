//! Runner to job matching

use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::job::Job;
use crate::domain::project::Project;
use crate::domain::runner::{Runner, RunnerScope};

/// Returns true when the runner's scope covers the project
pub fn serves_project(runner: &Runner, project: &Project) -> bool {
    match &runner.scope {
        RunnerScope::Shared => project.shared_runners_enabled,
        RunnerScope::Project { project_ids } => project_ids.contains(&project.id),
    }
}

/// Returns true when the runner's tags satisfy the job
pub fn tags_match(runner: &Runner, job: &Job) -> bool {
    if job.tags.is_empty() {
        runner.run_untagged
    } else {
        job.tags.is_subset(&runner.tags)
    }
}

/// Whether `runner` may pick up `job` of `project`
pub fn can_pick(runner: &Runner, project: &Project, job: &Job) -> bool {
    !runner.paused && serves_project(runner, project) && tags_match(runner, job)
}

/// Runners that may pick up the job, idle ones first, then oldest registration
///
/// # Arguments
/// * `busy` - Ids of runners currently executing a job
pub fn candidates<'a>(
    runners: &'a [Runner],
    project: &Project,
    job: &Job,
    busy: &HashSet<Uuid>,
) -> Vec<&'a Runner> {
    let mut matched: Vec<&Runner> = runners
        .iter()
        .filter(|runner| can_pick(runner, project, job))
        .collect();

    matched.sort_by_key(|runner| (busy.contains(&runner.id), runner.registered_at));
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::fixtures::job;
    use crate::domain::runner::fixtures::runner;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;

    fn project(shared_runners_enabled: bool) -> Project {
        Project {
            id: Uuid::new_v4(),
            namespace_id: Uuid::new_v4(),
            name: "app".to_string(),
            shared_runners_enabled,
            definition: None,
            default_timeout_seconds: None,
            created_at: Utc::now(),
        }
    }

    fn tagged_job(tags: &[&str]) -> Job {
        let mut job = job("build", 0);
        job.tags = tags.iter().map(|t| t.to_string()).collect();
        job
    }

    #[test]
    fn test_job_tags_must_be_subset() {
        let project = project(true);
        let runner = runner(&["docker", "linux"]);

        assert!(can_pick(&runner, &project, &tagged_job(&["docker"])));
        assert!(can_pick(&runner, &project, &tagged_job(&["docker", "linux"])));
        assert!(!can_pick(&runner, &project, &tagged_job(&["docker", "gpu"])));
    }

    #[test]
    fn test_untagged_jobs_need_run_untagged() {
        let project = project(true);
        let mut runner = runner(&["docker"]);
        assert!(can_pick(&runner, &project, &tagged_job(&[])));

        runner.run_untagged = false;
        assert!(!can_pick(&runner, &project, &tagged_job(&[])));
    }

    #[test]
    fn test_paused_runner_never_matches() {
        let mut runner = runner(&[]);
        runner.paused = true;
        assert!(!can_pick(&runner, &project(true), &tagged_job(&[])));
    }

    #[test]
    fn test_scope() {
        let shared = runner(&[]);
        let mut specific = runner(&[]);
        let enabled = project(true);
        let disabled = project(false);
        specific.scope = RunnerScope::Project {
            project_ids: BTreeSet::from([disabled.id]),
        };

        assert!(serves_project(&shared, &enabled));
        assert!(!serves_project(&shared, &disabled));
        assert!(serves_project(&specific, &disabled));
        assert!(!serves_project(&specific, &enabled));
    }

    #[test]
    fn test_candidates_prefer_idle_then_oldest() {
        let now = Utc::now();
        let mut oldest = runner(&[]);
        oldest.registered_at = now - Duration::hours(3);
        let mut middle = runner(&[]);
        middle.registered_at = now - Duration::hours(2);
        let mut newest = runner(&[]);
        newest.registered_at = now - Duration::hours(1);
        let mut paused = runner(&[]);
        paused.paused = true;

        let busy = HashSet::from([oldest.id]);
        let runners = vec![newest.clone(), paused, oldest.clone(), middle.clone()];
        let ordered: Vec<Uuid> = candidates(&runners, &project(true), &tagged_job(&[]), &busy)
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(ordered, vec![middle.id, newest.id, oldest.id]);
    }
}
