//! Project Service
//!
//! Projects, their pipeline definition and memberships.

use chrono::Utc;
use gantry_core::domain::pipeline::PipelineDefinition;
use gantry_core::domain::project::{AccessLevel, Membership, Project};
use gantry_core::dto::project::{CreateProject, SetMember, UpdateProject};
use gantry_core::validation::Validate;
use uuid::Uuid;

use crate::service::{Result, ServiceError};
use crate::state::AppState;

pub async fn create_project(state: &AppState, req: CreateProject) -> Result<Project> {
    req.validate()?;

    let project = Project {
        id: Uuid::new_v4(),
        namespace_id: req.namespace_id,
        name: req.name,
        shared_runners_enabled: req.shared_runners_enabled,
        definition: None,
        default_timeout_seconds: req.default_timeout_seconds,
        created_at: Utc::now(),
    };

    state.store.insert_project(&project).await?;

    tracing::info!("Project created: {} ({})", project.name, project.id);

    Ok(project)
}

pub async fn get_project(state: &AppState, id: Uuid) -> Result<Project> {
    state
        .store
        .get_project(id)
        .await?
        .ok_or(ServiceError::not_found("project", id))
}

pub async fn update_project(state: &AppState, id: Uuid, req: UpdateProject) -> Result<Project> {
    req.validate()?;

    let mut project = get_project(state, id).await?;

    if let Some(name) = req.name {
        project.name = name;
    }
    if let Some(enabled) = req.shared_runners_enabled {
        project.shared_runners_enabled = enabled;
    }
    if let Some(timeout) = req.default_timeout_seconds {
        project.default_timeout_seconds = Some(timeout);
    }

    state.store.save_project(&project).await?;

    tracing::info!("Project updated: {}", project.id);

    Ok(project)
}

/// Replaces the definition used for future pipelines
pub async fn set_definition(
    state: &AppState,
    id: Uuid,
    definition: PipelineDefinition,
) -> Result<Project> {
    definition.validate()?;

    let mut project = get_project(state, id).await?;
    project.definition = Some(definition);
    state.store.save_project(&project).await?;

    tracing::info!("Pipeline definition updated for project: {}", project.id);

    Ok(project)
}

pub async fn set_member(state: &AppState, project_id: Uuid, req: SetMember) -> Result<Membership> {
    get_project(state, project_id).await?;

    let membership = Membership {
        project_id,
        user_id: req.user_id,
        access_level: req.access_level,
    };
    state.store.set_membership(&membership).await?;

    tracing::info!(
        "User {} is now {} on project {}",
        req.user_id,
        req.access_level,
        project_id
    );

    Ok(membership)
}

/// Fails unless the user has at least `required` access on the project
pub async fn require_access(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
    required: AccessLevel,
) -> Result<AccessLevel> {
    let level = state.store.access_level(project_id, user_id).await?;

    match level {
        Some(level) if level >= required => Ok(level),
        _ => Err(ServiceError::InsufficientPermission(format!(
            "User {} needs {} access on project {}",
            user_id, required, project_id
        ))),
    }
}
