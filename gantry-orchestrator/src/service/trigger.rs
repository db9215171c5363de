//! Trigger Service
//!
//! Pipeline trigger tokens: lifecycle, ownership and firing.

use chrono::Utc;
use gantry_core::domain::pipeline::{Actor, PipelineSource, Variable};
use gantry_core::domain::project::AccessLevel;
use gantry_core::domain::trigger::Trigger;
use gantry_core::dto::pipeline::PipelineView;
use gantry_core::dto::trigger::{
    CreateTrigger, FireTrigger, TriggerActor, TriggerCreated, TriggerSummary, UpdateTrigger,
};
use gantry_core::validation::Validate;
use uuid::Uuid;

use crate::service::pipeline::NewPipeline;
use crate::service::{Result, ServiceError, pipeline_service, project_service, token};
use crate::state::AppState;

const TRIGGER_TOKEN_PREFIX: &str = "gtt_";
const DEFAULT_SHA: &str = "HEAD";

async fn get_trigger(state: &AppState, id: Uuid) -> Result<Trigger> {
    state
        .store
        .get_trigger(id)
        .await?
        .ok_or(ServiceError::not_found("trigger", id))
}

/// Create a trigger owned by a maintainer of the project
///
/// The plaintext token is only part of this response.
pub async fn create_trigger(
    state: &AppState,
    project_id: Uuid,
    req: CreateTrigger,
) -> Result<TriggerCreated> {
    project_service::get_project(state, project_id).await?;
    project_service::require_access(state, project_id, req.owner_id, AccessLevel::Maintainer)
        .await?;

    let token = token::generate(TRIGGER_TOKEN_PREFIX);
    let trigger = Trigger {
        id: Uuid::new_v4(),
        project_id,
        owner_id: Some(req.owner_id),
        description: req.description,
        token_hash: token::hash(&token),
        token_preview: token::preview(&token),
        revoked: false,
        created_at: Utc::now(),
        last_used_at: None,
    };

    state.store.insert_trigger(&trigger).await?;
    tracing::info!("Trigger created: {} for project {}", trigger.id, project_id);

    Ok(TriggerCreated {
        trigger: trigger.into(),
        token,
    })
}

pub async fn list_triggers(state: &AppState, project_id: Uuid) -> Result<Vec<TriggerSummary>> {
    project_service::get_project(state, project_id).await?;

    let triggers = state.store.list_triggers(project_id).await?;
    Ok(triggers.into_iter().map(TriggerSummary::from).collect())
}

/// Change the description; only the owner may, and legacy triggers are frozen
pub async fn update_trigger(
    state: &AppState,
    id: Uuid,
    req: UpdateTrigger,
) -> Result<TriggerSummary> {
    let mut trigger = get_trigger(state, id).await?;

    if trigger.is_legacy() {
        return Err(ServiceError::InsufficientPermission(format!(
            "Trigger {} has no owner and cannot be edited; take ownership first",
            id
        )));
    }

    if !trigger.is_owned_by(req.actor_id) {
        return Err(ServiceError::InsufficientPermission(format!(
            "Only the owner can edit trigger {}",
            id
        )));
    }

    trigger.description = req.description;
    state.store.save_trigger(&trigger).await?;

    Ok(trigger.into())
}

pub async fn revoke_trigger(state: &AppState, id: Uuid, req: TriggerActor) -> Result<TriggerSummary> {
    let mut trigger = get_trigger(state, id).await?;
    project_service::require_access(state, trigger.project_id, req.user_id, AccessLevel::Maintainer)
        .await?;

    if !trigger.revoked {
        trigger.revoked = true;
        state.store.save_trigger(&trigger).await?;
        tracing::info!("Trigger revoked: {} by {}", id, req.user_id);
    }

    Ok(trigger.into())
}

/// Make `req.user_id` the owner; legacy triggers gain an owner this way
pub async fn take_ownership(
    state: &AppState,
    id: Uuid,
    req: TriggerActor,
) -> Result<TriggerSummary> {
    let mut trigger = get_trigger(state, id).await?;

    if trigger.revoked {
        return Err(ServiceError::InvalidState(format!(
            "Trigger {} is revoked",
            id
        )));
    }

    project_service::require_access(state, trigger.project_id, req.user_id, AccessLevel::Maintainer)
        .await?;

    trigger.owner_id = Some(req.user_id);
    state.store.save_trigger(&trigger).await?;
    tracing::info!("Trigger {} now owned by {}", id, req.user_id);

    Ok(trigger.into())
}

/// Start a pipeline with a trigger token
///
/// The token must be valid for `project_id`, and an owned trigger still
/// needs its owner to be at least a developer.
pub async fn fire(state: &AppState, project_id: Uuid, req: FireTrigger) -> Result<PipelineView> {
    req.validate()?;

    let mut trigger = state
        .store
        .find_trigger_by_token(&token::hash(&req.token))
        .await?
        .filter(|t| t.is_valid() && t.project_id == project_id)
        .ok_or(ServiceError::InvalidToken)?;

    if let Some(owner_id) = trigger.owner_id {
        project_service::require_access(state, project_id, owner_id, AccessLevel::Developer)
            .await?;
    }

    let project = project_service::get_project(state, project_id).await?;

    let variables = req
        .variables
        .into_iter()
        .map(|(key, value)| Variable::masked(key, value))
        .collect();

    let pipeline = pipeline_service::instantiate(
        state,
        &project,
        NewPipeline {
            ref_name: req.ref_name,
            sha: req.sha.unwrap_or_else(|| DEFAULT_SHA.to_string()),
            source: PipelineSource::Trigger,
            actor: Actor::Trigger(trigger.id),
            variables,
        },
    )
    .await?;

    trigger.last_used_at = Some(Utc::now());
    state.store.save_trigger(&trigger).await?;

    tracing::info!("Trigger {} fired pipeline {}", trigger.id, pipeline.id);

    pipeline_service::get_pipeline_view(state, pipeline.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::TestEnv;
    use gantry_core::domain::pipeline::MASKED_VALUE;
    use std::collections::BTreeMap;

    fn fire_req(token: &str) -> FireTrigger {
        FireTrigger {
            token: token.to_string(),
            ref_name: "main".to_string(),
            sha: None,
            variables: BTreeMap::from([("DEPLOY_KEY".to_string(), "s3cret".to_string())]),
        }
    }

    async fn legacy_trigger(env: &TestEnv) -> (Trigger, String) {
        let token = token::generate(TRIGGER_TOKEN_PREFIX);
        let trigger = Trigger {
            id: Uuid::new_v4(),
            project_id: env.project.id,
            owner_id: None,
            description: Some("old".to_string()),
            token_hash: token::hash(&token),
            token_preview: token::preview(&token),
            revoked: false,
            created_at: Utc::now(),
            last_used_at: None,
        };
        env.state.store.insert_trigger(&trigger).await.unwrap();
        (trigger, token)
    }

    #[tokio::test]
    async fn test_create_requires_maintainer() {
        let env = TestEnv::new().await;
        let developer = env.member(AccessLevel::Developer).await;

        let result = create_trigger(
            &env.state,
            env.project.id,
            CreateTrigger {
                owner_id: developer,
                description: None,
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InsufficientPermission(_))));
    }

    #[tokio::test]
    async fn test_fire_creates_masked_trigger_pipeline() {
        let env = TestEnv::new().await;
        let created = create_trigger(
            &env.state,
            env.project.id,
            CreateTrigger {
                owner_id: env.maintainer,
                description: Some("deploy".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(created.trigger.token_preview, token::preview(&created.token));

        let view = fire(&env.state, env.project.id, fire_req(&created.token))
            .await
            .unwrap();
        assert_eq!(view.pipeline.source, PipelineSource::Trigger);
        assert_eq!(view.pipeline.actor, Actor::Trigger(created.trigger.id));
        assert_eq!(view.pipeline.sha, DEFAULT_SHA);
        assert_eq!(view.pipeline.variables[0].value, MASKED_VALUE);

        // the stored pipeline keeps the real value for job payloads
        let stored = pipeline_service::get_pipeline(&env.state, view.pipeline.id)
            .await
            .unwrap();
        assert_eq!(stored.variables[0].value, "s3cret");

        let listed = list_triggers(&env.state, env.project.id).await.unwrap();
        assert!(listed[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_fire_rejects_bad_tokens() {
        let env = TestEnv::new().await;
        let created = create_trigger(
            &env.state,
            env.project.id,
            CreateTrigger {
                owner_id: env.maintainer,
                description: None,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            fire(&env.state, env.project.id, fire_req("gtt_unknown")).await,
            Err(ServiceError::InvalidToken)
        ));
        assert!(matches!(
            fire(&env.state, Uuid::new_v4(), fire_req(&created.token)).await,
            Err(ServiceError::InvalidToken)
        ));

        revoke_trigger(
            &env.state,
            created.trigger.id,
            TriggerActor {
                user_id: env.maintainer,
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            fire(&env.state, env.project.id, fire_req(&created.token)).await,
            Err(ServiceError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_fire_fails_when_owner_lost_access() {
        let env = TestEnv::new().await;
        let created = create_trigger(
            &env.state,
            env.project.id,
            CreateTrigger {
                owner_id: env.maintainer,
                description: None,
            },
        )
        .await
        .unwrap();

        env.set_access(env.maintainer, AccessLevel::Reporter).await;

        assert!(matches!(
            fire(&env.state, env.project.id, fire_req(&created.token)).await,
            Err(ServiceError::InsufficientPermission(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_trigger_fires_but_cannot_be_edited() {
        let env = TestEnv::new().await;
        let (trigger, token) = legacy_trigger(&env).await;

        fire(&env.state, env.project.id, fire_req(&token)).await.unwrap();

        let result = update_trigger(
            &env.state,
            trigger.id,
            UpdateTrigger {
                actor_id: env.maintainer,
                description: Some("new".to_string()),
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InsufficientPermission(_))));

        let listed = list_triggers(&env.state, env.project.id).await.unwrap();
        assert!(listed[0].legacy);
        assert!(listed[0].valid);
    }

    #[tokio::test]
    async fn test_take_ownership() {
        let env = TestEnv::new().await;
        let (trigger, _) = legacy_trigger(&env).await;
        let developer = env.member(AccessLevel::Developer).await;

        let result = take_ownership(&env.state, trigger.id, TriggerActor { user_id: developer }).await;
        assert!(matches!(result, Err(ServiceError::InsufficientPermission(_))));

        let owned = take_ownership(
            &env.state,
            trigger.id,
            TriggerActor {
                user_id: env.maintainer,
            },
        )
        .await
        .unwrap();
        assert_eq!(owned.owner_id, Some(env.maintainer));
        assert!(!owned.legacy);

        let updated = update_trigger(
            &env.state,
            trigger.id,
            UpdateTrigger {
                actor_id: env.maintainer,
                description: Some("deploys".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.description.as_deref(), Some("deploys"));
    }

    #[tokio::test]
    async fn test_revoked_trigger_keeps_owner() {
        let env = TestEnv::new().await;
        let (trigger, _) = legacy_trigger(&env).await;
        let actor = TriggerActor {
            user_id: env.maintainer,
        };

        let revoked = revoke_trigger(&env.state, trigger.id, actor).await.unwrap();
        assert!(!revoked.valid);

        assert!(matches!(
            take_ownership(&env.state, trigger.id, actor).await,
            Err(ServiceError::InvalidState(_))
        ));
    }
}
