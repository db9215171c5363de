//! Project command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use gantry_client::OrchestratorClient;
use gantry_core::domain::pipeline::PipelineDefinition;
use gantry_core::domain::project::{AccessLevel, Project};
use gantry_core::dto::project::{CreateProject, SetMember, UpdateProject};
use uuid::Uuid;

use crate::display;

/// Project subcommands
#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project
    Create {
        /// Namespace the project's CI minutes are billed to
        #[arg(long)]
        namespace: Uuid,

        name: String,

        /// Do not run jobs on shared runners
        #[arg(long)]
        no_shared_runners: bool,

        /// Default job timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Get project details
    Get { id: Uuid },
    /// Update project settings
    Update {
        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        /// Enable or disable shared runners
        #[arg(long)]
        shared_runners: Option<bool>,

        /// Default job timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Set the pipeline definition from a JSON file
    SetDefinition {
        id: Uuid,

        /// Path to the definition file
        #[arg(short, long)]
        file: String,
    },
    /// Grant a user access to the project
    Member {
        id: Uuid,

        #[arg(long)]
        user: Uuid,

        /// guest, reporter, developer, maintainer or owner
        #[arg(long)]
        level: AccessLevel,
    },
}

pub async fn handle_project_command(
    command: ProjectCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        ProjectCommands::Create {
            namespace,
            name,
            no_shared_runners,
            timeout,
        } => {
            let project = client
                .create_project(CreateProject {
                    namespace_id: namespace,
                    name,
                    shared_runners_enabled: !no_shared_runners,
                    default_timeout_seconds: timeout,
                })
                .await?;
            println!("{}", "✓ Project created successfully!".green().bold());
            print_project(&project);
        }
        ProjectCommands::Get { id } => {
            print_project(&client.get_project(id).await?);
        }
        ProjectCommands::Update {
            id,
            name,
            shared_runners,
            timeout,
        } => {
            let project = client
                .update_project(
                    id,
                    UpdateProject {
                        name,
                        shared_runners_enabled: shared_runners,
                        default_timeout_seconds: timeout,
                    },
                )
                .await?;
            println!("{}", "✓ Project updated".green().bold());
            print_project(&project);
        }
        ProjectCommands::SetDefinition { id, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read definition file: {}", file))?;
            let definition: PipelineDefinition = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse definition file: {}", file))?;

            let project = client.set_definition(id, &definition).await?;
            println!("{}", "✓ Pipeline definition saved".green().bold());
            print_project(&project);
        }
        ProjectCommands::Member { id, user, level } => {
            let membership = client
                .set_member(
                    id,
                    SetMember {
                        user_id: user,
                        access_level: level,
                    },
                )
                .await?;
            println!(
                "{} {} is now {} on project {}",
                "✓".green(),
                membership.user_id.to_string().cyan(),
                membership.access_level.to_string().bold(),
                membership.project_id
            );
        }
    }

    Ok(())
}

fn print_project(project: &Project) {
    println!("{}", "Project Details:".bold());
    println!("  ID:             {}", project.id.to_string().cyan());
    println!("  Name:           {}", project.name.bold());
    println!("  Namespace:      {}", project.namespace_id.to_string().dimmed());
    println!(
        "  Shared runners: {}",
        if project.shared_runners_enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        }
    );
    if let Some(timeout) = project.default_timeout_seconds {
        println!("  Timeout:        {}s", timeout);
    }
    println!("  Created:        {}", display::timestamp(&project.created_at));

    match &project.definition {
        Some(definition) => {
            println!("\n{}", "Stages:".bold());
            for stage in &definition.stages {
                let jobs: Vec<&str> = stage.jobs.iter().map(|j| j.name.as_str()).collect();
                println!("  {} {}: {}", "▸".cyan(), stage.name.bold(), jobs.join(", "));
            }
        }
        None => println!("\n{}", "No pipeline definition set.".yellow()),
    }
}
