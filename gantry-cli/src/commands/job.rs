//! Job command handlers
//!
//! Job details, manual actions, traces and artifacts.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use gantry_client::OrchestratorClient;
use gantry_core::domain::job::Job;
use gantry_core::domain::log::{LogEntry, LogLevel};
use gantry_core::dto::job::JobView;
use uuid::Uuid;

use crate::display;
use crate::id_resolver::resolve_job_id_in_pipeline;
use crate::types::IdOrPrefix;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Get job details
    Get {
        /// Job ID, or a prefix when --pipeline is given
        id: String,

        #[arg(long)]
        pipeline: Option<Uuid>,
    },
    /// Cancel a job
    Cancel { id: Uuid },
    /// Retry a finished job
    Retry { id: Uuid },
    /// Start a manual job
    Play { id: Uuid },
    /// Show a job's trace
    Trace { id: Uuid },
    /// List runners able to pick up a job
    Runners { id: Uuid },
    /// Download a job's artifact
    Artifact {
        id: Uuid,

        /// Output file
        #[arg(short, long)]
        output: String,
    },
}

pub async fn handle_job_command(command: JobCommands, client: &OrchestratorClient) -> Result<()> {
    match command {
        JobCommands::Get { id, pipeline } => {
            let id_or_prefix = IdOrPrefix::parse(&id);
            let uuid = match (id_or_prefix.as_uuid(), pipeline) {
                (Some(uuid), _) => uuid,
                (None, Some(pipeline)) => {
                    resolve_job_id_in_pipeline(client, pipeline, &id_or_prefix).await?
                }
                (None, None) => anyhow::bail!("A job prefix needs --pipeline"),
            };
            print_job_details(&client.get_job(uuid).await?);
        }
        JobCommands::Cancel { id } => print_action("canceled", &client.cancel_job(id).await?),
        JobCommands::Retry { id } => print_action("retried", &client.retry_job(id).await?),
        JobCommands::Play { id } => print_action("started", &client.play_job(id).await?),
        JobCommands::Trace { id } => get_trace(client, id).await?,
        JobCommands::Runners { id } => {
            let runners = client.candidate_runners(id).await?;
            if runners.is_empty() {
                println!("{}", "No runner can pick up this job.".yellow());
            } else {
                println!("{}", format!("{} candidate runner(s):", runners.len()).bold());
                for runner in runners {
                    println!(
                        "  {} {} {} ({} running)",
                        "▸".cyan(),
                        runner.id.to_string().bold(),
                        display::runner_status(runner.status),
                        runner.running_jobs
                    );
                }
            }
        }
        JobCommands::Artifact { id, output } => {
            let data = client.download_artifact(id).await?;
            std::fs::write(&output, &data)
                .with_context(|| format!("Failed to write artifact to {}", output))?;
            println!(
                "{} Saved {} bytes to {}",
                "✓".green(),
                data.len(),
                output.bold()
            );
        }
    }

    Ok(())
}

async fn get_trace(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let entries = client.get_trace(id).await?;

    if entries.is_empty() {
        println!("{}", "No trace for this job yet.".yellow());
    } else {
        println!("{}", format!("Trace for job {}:", id).bold());
        println!("{}", "─".repeat(80).dimmed());
        for entry in entries {
            print_log_entry(&entry);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

fn print_action(action: &str, job: &Job) {
    println!(
        "{} Job {} {} ({}), now {}",
        "✓".green(),
        job.name.bold(),
        action,
        job.id.to_string().dimmed(),
        display::job_status(job.status)
    );
}

fn print_job_details(view: &JobView) {
    let job = &view.job;

    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Name:        {} ({})", job.name.bold(), job.stage);
    println!("  Pipeline ID: {}", job.pipeline_id.to_string().dimmed());
    println!("  Status:      {}", display::job_status(job.status));
    println!("  When:        {}", job.when.as_str());
    if view.stuck {
        println!("  {}", "No runner can pick up this job".red());
    }
    if let Some(reason) = job.failure_reason {
        println!("  Failure:     {}", reason.to_string().red());
    }
    if let Some(code) = job.exit_code {
        println!("  Exit Code:   {}", code);
    }
    if !job.tags.is_empty() {
        let tags: Vec<&str> = job.tags.iter().map(String::as_str).collect();
        println!("  Tags:        {}", tags.join(", "));
    }
    println!("  Timeout:     {}s", job.timeout_seconds);
    println!("  Created:     {}", display::timestamp(&job.created_at));

    if let Some(started) = &job.started_at {
        println!("  Started:     {}", display::timestamp(started));
    }

    if let Some(finished) = &job.finished_at {
        println!("  Finished:    {}", display::timestamp(finished));

        if let Some(started) = job.started_at {
            let seconds = finished.signed_duration_since(started).num_seconds();
            println!("  Duration:    {}s", seconds);
        }
    }

    if let Some(runner) = job.runner_id {
        println!("  Runner:      {}", runner);
    }
    if let Some(original) = job.retried_from {
        println!("  Retry of:    {}", original.to_string().dimmed());
    }

    println!("\n{}", "Script:".bold());
    for line in &job.script {
        println!("  $ {}", line);
    }
}

fn print_log_entry(entry: &LogEntry) {
    let level = format!("{:?}", entry.level).to_uppercase();
    let level = match entry.level {
        LogLevel::Debug => level.dimmed(),
        LogLevel::Info => level.cyan(),
        LogLevel::Warning => level.yellow(),
        LogLevel::Error => level.red(),
    };

    println!(
        "{} [{}] {}",
        entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level,
        entry.message
    );
}
