//! Execution service
//!
//! Runs a job's script line by line through a shell in the job workspace,
//! streaming output into the trace buffer. The job timeout covers the whole
//! script; a timeout or cancellation kills the running command.

use async_trait::async_trait;
use gantry_core::domain::job::{FailureReason, JobOutcome};
use gantry_core::domain::log::LogLevel;
use gantry_core::dto::job::CompleteJob;
use gantry_core::validation::MAX_JOB_TIMEOUT_SECONDS;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::context::Context;

/// How a job execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Report this to the orchestrator
    Finished(CompleteJob),
    /// The orchestrator canceled the job; nothing to report
    Canceled,
}

impl ExecutionOutcome {
    fn failed(reason: FailureReason, exit_code: Option<i32>) -> Self {
        ExecutionOutcome::Finished(CompleteJob {
            outcome: JobOutcome::Failed { reason },
            exit_code,
        })
    }
}

/// Service trait for executing jobs
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn execute(&self, context: Arc<Context>) -> ExecutionOutcome;
}

enum CommandResult {
    Exited(Option<i32>),
    TimedOut,
    Canceled,
}

/// Executes script lines with `sh -c`
pub struct ShellExecutionService {
    shell: String,
}

impl ShellExecutionService {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    async fn run_command(
        &self,
        context: &Arc<Context>,
        line: &str,
        deadline: Instant,
        cancel: &mut watch::Receiver<bool>,
    ) -> std::io::Result<CommandResult> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(line)
            .current_dir(&context.workspace)
            .envs(
                context
                    .payload
                    .variables
                    .iter()
                    .map(|v| (v.key.as_str(), v.value.as_str())),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward_output(context.clone(), stdout, LogLevel::Info));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_output(context.clone(), stderr, LogLevel::Warning));
        }

        let result = tokio::select! {
            status = child.wait() => CommandResult::Exited(status?.code()),
            _ = tokio::time::sleep_until(deadline) => {
                child.kill().await?;
                CommandResult::TimedOut
            }
            _ = canceled(cancel) => {
                child.kill().await?;
                CommandResult::Canceled
            }
        };

        // A killed shell may leave children holding the pipes open
        let drain = matches!(result, CommandResult::Exited(_));
        for forwarder in forwarders {
            if drain {
                let _ = forwarder.await;
            } else {
                forwarder.abort();
            }
        }

        Ok(result)
    }
}

impl Default for ShellExecutionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionService for ShellExecutionService {
    async fn execute(&self, context: Arc<Context>) -> ExecutionOutcome {
        let payload = &context.payload;
        info!("Starting execution of job {} ({})", payload.job_id, payload.name);

        if let Err(e) = tokio::fs::create_dir_all(&context.workspace).await {
            context.log_error(format!("Failed to prepare workspace: {}", e));
            return ExecutionOutcome::failed(FailureReason::RunnerSystemFailure, None);
        }

        let deadline = deadline_after(payload.timeout_seconds);
        let mut cancel = context.cancellation();

        for line in &payload.script {
            context.log_info(format!("$ {}", line));
            debug!("Job {}: running `{}`", payload.job_id, line);

            match self.run_command(&context, line, deadline, &mut cancel).await {
                Ok(CommandResult::Exited(Some(0))) => {}
                Ok(CommandResult::Exited(code)) => {
                    context.log_error(match code {
                        Some(code) => format!("Command exited with code {}", code),
                        None => "Command was terminated by a signal".to_string(),
                    });
                    return ExecutionOutcome::failed(FailureReason::ScriptFailure, code);
                }
                Ok(CommandResult::TimedOut) => {
                    context.log_error(format!(
                        "Job exceeded its timeout of {} seconds",
                        payload.timeout_seconds
                    ));
                    return ExecutionOutcome::failed(FailureReason::ExecutionTimeout, None);
                }
                Ok(CommandResult::Canceled) => {
                    context.log_warning("Job canceled");
                    return ExecutionOutcome::Canceled;
                }
                Err(e) => {
                    warn!("Job {}: failed to run command: {}", payload.job_id, e);
                    context.log_error(format!("Failed to run command: {}", e));
                    return ExecutionOutcome::failed(FailureReason::RunnerSystemFailure, None);
                }
            }
        }

        context.log_info("Job succeeded");
        ExecutionOutcome::Finished(CompleteJob {
            outcome: JobOutcome::Success,
            exit_code: Some(0),
        })
    }
}

/// The orchestrator never hands out timeouts above the cap
fn deadline_after(timeout_seconds: u64) -> Instant {
    Instant::now() + Duration::from_secs(timeout_seconds.min(MAX_JOB_TIMEOUT_SECONDS))
}

/// Resolves once cancellation is requested
async fn canceled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|canceled| *canceled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn forward_output<R>(
    context: Arc<Context>,
    output: R,
    level: LogLevel,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(output).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            context.log(level, line);
        }
    })
}
