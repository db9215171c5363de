//! Quota Service
//!
//! Soft CI minute quotas per namespace. Nothing here ever rejects work: the
//! status is reported on pipelines and threshold crossings are published.

use chrono::Utc;
use gantry_core::domain::job::Job;
use gantry_core::domain::quota::{QuotaRecord, QuotaStatus};
use gantry_core::dto::quota::{QuotaView, SetQuotaLimit};
use gantry_core::event::Event;
use uuid::Uuid;

use crate::service::{Result, project_service};
use crate::state::AppState;

/// Current quota state of a namespace; unknown namespaces are unlimited
pub async fn check(state: &AppState, namespace_id: Uuid) -> Result<QuotaView> {
    let record = state
        .store
        .get_quota(namespace_id)
        .await?
        .unwrap_or_else(|| QuotaRecord::new(namespace_id, Utc::now()));

    Ok(QuotaView::new(&record, &state.config.quota_policy))
}

pub async fn set_limit(state: &AppState, namespace_id: Uuid, req: SetQuotaLimit) -> Result<QuotaView> {
    let before = check(state, namespace_id).await?;
    let record = state
        .store
        .set_quota_limit(namespace_id, req.limit_minutes, Utc::now())
        .await?;

    tracing::info!(
        "Quota limit for namespace {} set to {:?} minutes",
        namespace_id,
        record.effective_limit()
    );

    Ok(publish_crossing(state, before.status, &record))
}

/// Add consumed minutes to a namespace
pub async fn record_usage(state: &AppState, namespace_id: Uuid, minutes: u64) -> Result<QuotaView> {
    let before = check(state, namespace_id).await?;
    let record = state
        .store
        .add_quota_usage(namespace_id, minutes, Utc::now())
        .await?;

    tracing::debug!(
        "Namespace {} consumed {} minutes (total {})",
        namespace_id,
        minutes,
        record.consumed_minutes
    );

    Ok(publish_crossing(state, before.status, &record))
}

/// Charge a finished job's runtime to its project's namespace
///
/// Only jobs that ran on a shared runner count unless the config says
/// otherwise. Returns `None` when nothing was charged.
pub async fn record_job_usage(state: &AppState, job: &Job) -> Result<Option<QuotaView>> {
    let Some(minutes) = job.duration_minutes() else {
        return Ok(None);
    };
    let Some(runner_id) = job.runner_id else {
        return Ok(None);
    };

    if !state.config.quota_all_runners {
        let shared = state
            .store
            .get_runner(runner_id)
            .await?
            .map(|runner| runner.scope.is_shared())
            .unwrap_or(false);
        if !shared {
            return Ok(None);
        }
    }

    let project = project_service::get_project(state, job.project_id).await?;
    record_usage(state, project.namespace_id, minutes).await.map(Some)
}

fn publish_crossing(state: &AppState, before: QuotaStatus, record: &QuotaRecord) -> QuotaView {
    let view = QuotaView::new(record, &state.config.quota_policy);

    if view.status != before && view.status != QuotaStatus::Ok {
        tracing::warn!(
            "Namespace {} quota is now {}",
            record.namespace_id,
            view.status
        );
        state.events.publish(Event::QuotaThresholdCrossed {
            namespace_id: record.namespace_id,
            status: view.status,
            consumed_minutes: record.consumed_minutes,
            limit_minutes: record.effective_limit(),
        });
    }

    view
}
