//! Runner command handlers
//!
//! Registering, listing, pausing and removing runners.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use gantry_client::OrchestratorClient;
use gantry_core::domain::runner::RunnerScope;
use gantry_core::dto::runner::{RegisterRunner, RunnerSummary};
use uuid::Uuid;

use crate::display;

/// Runner subcommands
#[derive(Subcommand)]
pub enum RunnerCommands {
    /// Register a runner and print its token
    Register {
        #[arg(long, default_value = "")]
        description: String,

        /// Comma-separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Only pick jobs that carry tags
        #[arg(long)]
        tagged_only: bool,

        /// Restrict the runner to these projects instead of sharing it
        #[arg(long = "project")]
        projects: Vec<Uuid>,
    },
    /// List all registered runners
    List,
    /// Get runner details
    Get { id: Uuid },
    /// Stop the runner from receiving jobs
    Pause { id: Uuid },
    /// Let a paused runner receive jobs again
    Resume { id: Uuid },
    /// Delete a runner; jobs it holds fail
    Remove { id: Uuid },
}

pub async fn handle_runner_command(
    command: RunnerCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    match command {
        RunnerCommands::Register {
            description,
            tags,
            tagged_only,
            projects,
        } => {
            let scope = if projects.is_empty() {
                RunnerScope::Shared
            } else {
                RunnerScope::Project {
                    project_ids: projects.into_iter().collect(),
                }
            };

            let registered = client
                .register_runner(RegisterRunner {
                    description,
                    scope,
                    tags: tags.into_iter().collect(),
                    run_untagged: !tagged_only,
                })
                .await?;

            println!("{}", "✓ Runner registered successfully!".green().bold());
            println!("  ID:    {}", registered.id.to_string().cyan());
            println!("  Token: {}", registered.token.bold());
            println!(
                "{}",
                "  The token is shown only once; set it as GANTRY_RUNNER_TOKEN.".dimmed()
            );
        }
        RunnerCommands::List => list_runners(client).await?,
        RunnerCommands::Get { id } => print_runner_summary(&client.get_runner(id).await?),
        RunnerCommands::Pause { id } => print_runner_summary(&client.pause_runner(id).await?),
        RunnerCommands::Resume { id } => print_runner_summary(&client.resume_runner(id).await?),
        RunnerCommands::Remove { id } => {
            client.delete_runner(id).await?;
            println!("{}", format!("✓ Runner {} removed", id).green().bold());
        }
    }

    Ok(())
}

async fn list_runners(client: &OrchestratorClient) -> Result<()> {
    let runners = client.list_runners().await?;

    if runners.is_empty() {
        println!("{}", "No runners registered.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} registered runner(s):", runners.len()).bold()
        );
        println!();
        for runner in runners {
            print_runner_summary(&runner);
        }
    }

    Ok(())
}

fn print_runner_summary(runner: &RunnerSummary) {
    println!("  {} Runner {}", "▸".cyan(), runner.id.to_string().bold());
    if !runner.description.is_empty() {
        println!("    Description:  {}", runner.description);
    }
    println!("    Status:       {}", display::runner_status(runner.status));
    match &runner.scope {
        RunnerScope::Shared => println!("    Scope:        shared"),
        RunnerScope::Project { project_ids } => {
            let ids: Vec<String> = project_ids.iter().map(Uuid::to_string).collect();
            println!("    Scope:        projects {}", ids.join(", "));
        }
    }
    if !runner.tags.is_empty() {
        let tags: Vec<&str> = runner.tags.iter().map(String::as_str).collect();
        println!("    Tags:         {}", tags.join(", "));
    }
    println!("    Untagged:     {}", runner.run_untagged);
    println!("    Running jobs: {}", runner.running_jobs);
    println!(
        "    Registered:   {}",
        display::timestamp(&runner.registered_at).dimmed()
    );
    println!(
        "    Last Seen:    {}",
        display::optional_timestamp(&runner.contacted_at).dimmed()
    );
    println!();
}
