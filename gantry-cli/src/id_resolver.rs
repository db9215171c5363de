//! ID resolver module
//!
//! Resolves UUID prefixes to full UUIDs by querying the API, so users can
//! type a short unambiguous prefix instead of a full UUID.

use anyhow::{Context, Result, anyhow};
use gantry_client::OrchestratorClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a pipeline ID or prefix among a project's pipelines
pub async fn resolve_pipeline_id(
    client: &OrchestratorClient,
    project_id: Uuid,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let pipelines = client
        .list_pipelines(project_id)
        .await
        .context("Failed to fetch pipelines for ID resolution")?;

    match_prefix(id_or_prefix, pipelines.iter().map(|p| p.id), "pipeline")
}

/// Resolve a job ID or prefix among a pipeline's jobs
pub async fn resolve_job_id_in_pipeline(
    client: &OrchestratorClient,
    pipeline_id: Uuid,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let pipeline = client
        .get_pipeline(pipeline_id)
        .await
        .context("Failed to fetch pipeline jobs for ID resolution")?;

    match_prefix(id_or_prefix, pipeline.jobs.iter().map(|j| j.job.id), "job")
}

/// Pick the single candidate whose ID starts with the prefix
fn match_prefix(
    id_or_prefix: &IdOrPrefix,
    candidates: impl Iterator<Item = Uuid>,
    kind: &str,
) -> Result<Uuid> {
    let prefix = id_or_prefix.to_string();
    let matches: Vec<Uuid> = candidates
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No {} found with ID starting with '{}'", kind, prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple {}s: {}",
                prefix,
                kind,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Uuid> {
        [
            "aa11c0de-0000-4000-8000-000000000001",
            "aa22c0de-0000-4000-8000-000000000002",
            "bb33c0de-0000-4000-8000-000000000003",
        ]
        .iter()
        .map(|s| Uuid::parse_str(s).unwrap())
        .collect()
    }

    #[test]
    fn test_unique_prefix_resolves() {
        let resolved = match_prefix(&IdOrPrefix::parse("BB"), ids().into_iter(), "job").unwrap();
        assert_eq!(resolved, ids()[2]);
    }

    #[test]
    fn test_ambiguous_and_missing_prefixes() {
        let ambiguous = match_prefix(&IdOrPrefix::parse("aa"), ids().into_iter(), "job");
        assert!(ambiguous.unwrap_err().to_string().contains("Ambiguous"));

        let missing = match_prefix(&IdOrPrefix::parse("cc"), ids().into_iter(), "job");
        assert!(missing.unwrap_err().to_string().contains("No job found"));
    }
}
