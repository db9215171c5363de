//! Artifact Service
//!
//! One artifact archive per job, uploaded by the runner that ran it.

use chrono::{Duration, Utc};
use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::runner::Runner;
use gantry_core::validation::{ValidationError, validate_expire_in};
use uuid::Uuid;

use crate::service::{Result, ServiceError, job_service};
use crate::state::AppState;

/// Store an artifact for a job held by `runner`
///
/// Expiry comes from `expire_in_seconds`, then the job's artifacts spec,
/// then the configured default.
pub async fn upload(
    state: &AppState,
    runner: &Runner,
    job_id: Uuid,
    filename: String,
    data: Vec<u8>,
    expire_in_seconds: Option<u64>,
) -> Result<Artifact> {
    validate_filename(&filename)?;

    let job = job_service::job_held_by(state, runner, job_id).await?;

    let expire_in = expire_in_seconds
        .or_else(|| job.artifacts.as_ref().and_then(|spec| spec.expire_in_seconds))
        .unwrap_or(state.config.artifact_expire_in.as_secs());
    validate_expire_in(expire_in)?;

    let now = Utc::now();
    let expire_at = i64::try_from(expire_in)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|expire_in| now.checked_add_signed(expire_in))
        .ok_or_else(|| ValidationError::new("Artifact expiry is out of range"))?;
    let artifact = Artifact {
        job_id,
        filename,
        size: data.len() as u64,
        created_at: now,
        expire_at: Some(expire_at),
    };

    state.store.put_artifact(&artifact, data).await?;

    tracing::info!(
        "Artifact {} ({} bytes) stored for job {}",
        artifact.filename,
        artifact.size,
        job_id
    );

    Ok(artifact)
}

/// Fetch a job's artifact; expired artifacts are treated as missing
pub async fn download(state: &AppState, job_id: Uuid) -> Result<(Artifact, Vec<u8>)> {
    match state.store.get_artifact(job_id).await? {
        Some((artifact, data)) if !artifact.is_expired(Utc::now()) => Ok((artifact, data)),
        _ => Err(ServiceError::not_found("artifact", job_id)),
    }
}

/// Delete expired artifacts, returning how many were removed
pub async fn sweep_expired(state: &AppState) -> Result<u64> {
    let removed = state.store.delete_expired_artifacts(Utc::now()).await?;
    if removed > 0 {
        tracing::info!("Removed {} expired artifacts", removed);
    }
    Ok(removed)
}

fn validate_filename(filename: &str) -> std::result::Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::new("Artifact filename cannot be empty"));
    }

    if filename.len() > 255 {
        return Err(ValidationError::new(
            "Artifact filename cannot exceed 255 characters",
        ));
    }

    if filename.contains('/') || filename.contains('\\') || filename == "." || filename == ".." {
        return Err(ValidationError::new(
            "Artifact filename must not contain path separators",
        ));
    }

    Ok(())
}
