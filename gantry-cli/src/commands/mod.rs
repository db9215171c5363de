//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod pipeline;
mod project;
mod quota;
mod runner;
mod trigger;

pub use job::JobCommands;
pub use pipeline::PipelineCommands;
pub use project::ProjectCommands;
pub use quota::QuotaCommands;
pub use runner::RunnerCommands;
pub use trigger::TriggerCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Runner management
    Runner {
        #[command(subcommand)]
        command: RunnerCommands,
    },
    /// Pipeline trigger tokens
    Trigger {
        #[command(subcommand)]
        command: TriggerCommands,
    },
    /// Namespace CI minute quotas
    Quota {
        #[command(subcommand)]
        command: QuotaCommands,
    },
}

/// Routes the command to the appropriate handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Project { command } => project::handle_project_command(command, &client).await,
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, &client).await,
        Commands::Job { command } => job::handle_job_command(command, &client).await,
        Commands::Runner { command } => runner::handle_runner_command(command, &client).await,
        Commands::Trigger { command } => trigger::handle_trigger_command(command, &client).await,
        Commands::Quota { command } => quota::handle_quota_command(command, &client).await,
    }
}
