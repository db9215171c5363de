//! Terminal formatting shared by command handlers

use chrono::{DateTime, Utc};
use colored::*;
use gantry_core::domain::job::JobStatus;
use gantry_core::domain::pipeline::PipelineStatus;
use gantry_core::domain::quota::QuotaStatus;
use gantry_core::domain::runner::RunnerStatus;

pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn optional_timestamp(at: &Option<DateTime<Utc>>) -> String {
    at.as_ref().map(timestamp).unwrap_or_else(|| "never".to_string())
}

pub fn job_status(status: JobStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        JobStatus::Created | JobStatus::Pending => text.yellow(),
        JobStatus::Running => text.cyan(),
        JobStatus::Success => text.green(),
        JobStatus::Failed => text.red(),
        JobStatus::Canceled | JobStatus::Skipped => text.dimmed(),
        JobStatus::Manual => text.magenta(),
    }
}

pub fn pipeline_status(status: PipelineStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        PipelineStatus::Created | PipelineStatus::Pending => text.yellow(),
        PipelineStatus::Running => text.cyan(),
        PipelineStatus::Success => text.green(),
        PipelineStatus::Failed => text.red(),
        PipelineStatus::Canceled | PipelineStatus::Skipped => text.dimmed(),
        PipelineStatus::Manual => text.magenta(),
    }
}

pub fn runner_status(status: RunnerStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        RunnerStatus::Online => text.green(),
        RunnerStatus::Offline => text.red(),
        RunnerStatus::Paused => text.yellow(),
    }
}

pub fn quota_status(status: QuotaStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        QuotaStatus::Ok => text.green(),
        QuotaStatus::NearLimit => text.yellow(),
        QuotaStatus::Exceeded => text.red().bold(),
    }
}

/// Prints a soft-quota warning if there is one
pub fn quota_warning(warning: &Option<String>) {
    if let Some(warning) = warning {
        println!("{} {}", "⚠".yellow(), warning.yellow());
    }
}
