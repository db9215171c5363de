//! Trigger command handlers
//!
//! Managing pipeline trigger tokens and starting pipelines with them.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use gantry_client::OrchestratorClient;
use gantry_core::dto::trigger::{
    CreateTrigger, FireTrigger, TriggerActor, TriggerSummary, UpdateTrigger,
};
use uuid::Uuid;

use crate::display;
use crate::types::parse_key_val;

/// Trigger subcommands
#[derive(Subcommand)]
pub enum TriggerCommands {
    /// Create a trigger token for a project
    Create {
        project: Uuid,

        /// Maintainer who owns the trigger
        #[arg(long)]
        owner: Uuid,

        #[arg(long)]
        description: Option<String>,
    },
    /// List a project's triggers
    List { project: Uuid },
    /// Change a trigger's description
    Update {
        id: Uuid,

        /// User making the change; must own the trigger
        #[arg(long)]
        actor: Uuid,

        #[arg(long)]
        description: Option<String>,
    },
    /// Revoke a trigger token
    Revoke {
        id: Uuid,

        #[arg(long)]
        actor: Uuid,
    },
    /// Become the owner of a trigger
    TakeOwnership {
        id: Uuid,

        #[arg(long)]
        user: Uuid,
    },
    /// Start a pipeline with a trigger token
    Fire {
        project: Uuid,

        #[arg(long, env = "GANTRY_TRIGGER_TOKEN", hide_env_values = true)]
        token: String,

        #[arg(long = "ref")]
        ref_name: String,

        #[arg(long)]
        sha: Option<String>,

        /// Variables as KEY=value pairs; their values are masked
        #[arg(short, long = "var", value_parser = parse_key_val)]
        variables: Vec<(String, String)>,
    },
}

pub async fn handle_trigger_command(
    command: TriggerCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        TriggerCommands::Create {
            project,
            owner,
            description,
        } => {
            let created = client
                .create_trigger(
                    project,
                    CreateTrigger {
                        owner_id: owner,
                        description,
                    },
                )
                .await?;
            println!("{}", "✓ Trigger created successfully!".green().bold());
            print_trigger(&created.trigger);
            println!("    Token:       {}", created.token.bold());
            println!("{}", "    The token is shown only once.".dimmed());
        }
        TriggerCommands::List { project } => {
            let triggers = client.list_triggers(project).await?;
            if triggers.is_empty() {
                println!("{}", "No triggers found.".yellow());
            } else {
                println!("{}", format!("Found {} trigger(s):", triggers.len()).bold());
                println!();
                for trigger in triggers {
                    print_trigger(&trigger);
                    println!();
                }
            }
        }
        TriggerCommands::Update {
            id,
            actor,
            description,
        } => {
            let trigger = client
                .update_trigger(
                    id,
                    UpdateTrigger {
                        actor_id: actor,
                        description,
                    },
                )
                .await?;
            println!("{}", "✓ Trigger updated".green().bold());
            print_trigger(&trigger);
        }
        TriggerCommands::Revoke { id, actor } => {
            let trigger = client
                .revoke_trigger(id, TriggerActor { user_id: actor })
                .await?;
            println!("{}", "✓ Trigger revoked".green().bold());
            print_trigger(&trigger);
        }
        TriggerCommands::TakeOwnership { id, user } => {
            let trigger = client
                .take_trigger_ownership(id, TriggerActor { user_id: user })
                .await?;
            println!("{}", "✓ Ownership transferred".green().bold());
            print_trigger(&trigger);
        }
        TriggerCommands::Fire {
            project,
            token,
            ref_name,
            sha,
            variables,
        } => {
            let view = client
                .fire_trigger(
                    project,
                    FireTrigger {
                        token,
                        ref_name,
                        sha,
                        variables: variables.into_iter().collect(),
                    },
                )
                .await?;
            println!("{}", "✓ Pipeline triggered".green().bold());
            println!("  ID:     {}", view.pipeline.id.to_string().cyan());
            println!("  Status: {}", display::pipeline_status(view.pipeline.status));
            println!("  Jobs:   {}", view.jobs.len());
            display::quota_warning(&view.quota_warning);
        }
    }

    Ok(())
}

fn print_trigger(trigger: &TriggerSummary) {
    println!("  {} Trigger {}", "▸".cyan(), trigger.id.to_string().bold());
    if let Some(description) = &trigger.description {
        println!("    Description: {}", description);
    }
    println!("    Token:       {}...", trigger.token_preview);
    match trigger.owner_id {
        Some(owner) => println!("    Owner:       {}", owner),
        None => println!("    Owner:       {}", "none (legacy)".yellow()),
    }
    println!(
        "    State:       {}",
        if trigger.valid {
            "valid".green()
        } else {
            "revoked".red()
        }
    );
    println!(
        "    Last used:   {}",
        display::optional_timestamp(&trigger.last_used_at).dimmed()
    );
}
