//! Pipeline command handlers
//!
//! Creating, listing, inspecting, canceling and deleting pipelines.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use gantry_client::OrchestratorClient;
use gantry_core::domain::pipeline::{Actor, PipelineSource, Variable};
use gantry_core::dto::pipeline::{CreatePipeline, PipelineSummary, PipelineView};
use uuid::Uuid;

use crate::display;
use crate::id_resolver::resolve_pipeline_id;
use crate::types::{IdOrPrefix, parse_key_val};

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create a pipeline from the project's definition
    Create {
        project: Uuid,

        /// Branch or tag to build
        #[arg(long = "ref")]
        ref_name: String,

        #[arg(long, default_value = "HEAD")]
        sha: String,

        /// User the pipeline runs as
        #[arg(long)]
        user: Uuid,

        /// Variables as KEY=value pairs
        #[arg(short, long = "var", value_parser = parse_key_val)]
        variables: Vec<(String, String)>,

        /// Variables whose values are hidden in output
        #[arg(long = "masked", value_parser = parse_key_val)]
        masked: Vec<(String, String)>,

        /// push, web or api
        #[arg(long, default_value = "web")]
        source: PipelineSource,
    },
    /// List a project's pipelines
    List { project: Uuid },
    /// Get pipeline details
    Get {
        /// Pipeline ID, or a prefix when --project is given
        id: String,

        #[arg(long)]
        project: Option<Uuid>,
    },
    /// Cancel every active job of a pipeline
    Cancel { id: Uuid },
    /// Delete a finished pipeline
    Delete { id: Uuid },
}

pub async fn handle_pipeline_command(
    command: PipelineCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        PipelineCommands::Create {
            project,
            ref_name,
            sha,
            user,
            variables,
            masked,
            source,
        } => {
            let variables = variables
                .into_iter()
                .map(|(k, v)| Variable::new(k, v))
                .chain(masked.into_iter().map(|(k, v)| Variable::masked(k, v)))
                .collect();

            let view = client
                .create_pipeline(
                    project,
                    CreatePipeline {
                        ref_name,
                        sha,
                        variables,
                        user_id: user,
                        source,
                    },
                )
                .await?;

            println!("{}", "✓ Pipeline created successfully!".green().bold());
            print_pipeline_details(&view);
        }
        PipelineCommands::List { project } => list_pipelines(client, project).await?,
        PipelineCommands::Get { id, project } => {
            let id_or_prefix = IdOrPrefix::parse(&id);
            let uuid = match (id_or_prefix.as_uuid(), project) {
                (Some(uuid), _) => uuid,
                (None, Some(project)) => resolve_pipeline_id(client, project, &id_or_prefix).await?,
                (None, None) => anyhow::bail!("A pipeline prefix needs --project"),
            };
            print_pipeline_details(&client.get_pipeline(uuid).await?);
        }
        PipelineCommands::Cancel { id } => {
            let pipeline = client.cancel_pipeline(id).await?;
            println!(
                "{} Pipeline {} is {}",
                "✓".green(),
                pipeline.id.to_string().cyan(),
                display::pipeline_status(pipeline.status)
            );
        }
        PipelineCommands::Delete { id } => {
            client.delete_pipeline(id).await?;
            println!(
                "{}",
                format!("✓ Pipeline {} deleted successfully!", id).green().bold()
            );
        }
    }

    Ok(())
}

async fn list_pipelines(client: &OrchestratorClient, project: Uuid) -> Result<()> {
    let pipelines = client.list_pipelines(project).await?;

    if pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
    } else {
        println!("{}", format!("Found {} pipeline(s):", pipelines.len()).bold());
        println!();
        for pipeline in pipelines {
            print_pipeline_summary(&pipeline);
        }
    }

    Ok(())
}

fn print_pipeline_summary(pipeline: &PipelineSummary) {
    println!("  {} Pipeline {}", "▸".cyan(), pipeline.id.to_string().dimmed());
    println!("    Ref:     {} ({})", pipeline.ref_name.bold(), pipeline.sha);
    println!("    Status:  {}", display::pipeline_status(pipeline.status));
    println!("    Source:  {}", pipeline.source.as_str());
    println!(
        "    Created: {}",
        display::timestamp(&pipeline.created_at).dimmed()
    );
    if pipeline.warnings {
        println!("    {}", "passed with warnings".yellow());
    }
    println!();
}

fn print_pipeline_details(view: &PipelineView) {
    let pipeline = &view.pipeline;

    println!("{}", "Pipeline Details:".bold());
    println!("  ID:       {}", pipeline.id.to_string().cyan());
    println!("  Project:  {}", pipeline.project_id.to_string().dimmed());
    println!("  Ref:      {} ({})", pipeline.ref_name.bold(), pipeline.sha);
    println!("  Status:   {}", display::pipeline_status(pipeline.status));
    println!("  Source:   {}", pipeline.source.as_str());
    match pipeline.actor {
        Actor::User(id) => println!("  User:     {}", id),
        Actor::Trigger(id) => println!("  Trigger:  {}", id),
    }
    println!("  Created:  {}", display::timestamp(&pipeline.created_at));
    if let Some(finished) = &pipeline.finished_at {
        println!("  Finished: {}", display::timestamp(finished));
    }
    if pipeline.warnings {
        println!("  {}", "Passed with warnings".yellow());
    }
    display::quota_warning(&view.quota_warning);

    if !pipeline.variables.is_empty() {
        println!("\n{}", "Variables:".bold());
        for variable in &pipeline.variables {
            println!("  {} = {}", variable.key.cyan(), variable.value);
        }
    }

    for stage in &pipeline.stages {
        println!("\n{}", stage.bold());
        for job in view.jobs.iter().filter(|j| &j.job.stage == stage) {
            let stuck = if job.stuck { " (stuck)".red() } else { "".normal() };
            let allowed = if job.job.allow_failure {
                " [allow failure]".dimmed()
            } else {
                "".normal()
            };
            println!(
                "  {} {} {}{}{} {}",
                "▸".cyan(),
                job.job.name,
                display::job_status(job.job.status),
                stuck,
                allowed,
                job.job.id.to_string().dimmed()
            );
        }
    }
}
