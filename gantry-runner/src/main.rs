//! Gantry Runner
//!
//! A worker that requests jobs from the orchestrator, runs their scripts
//! through a shell and streams the trace back.
//!
//! Architecture:
//! - Configuration: settings from the environment
//! - Services: script execution, trace buffering, tag discovery
//! - Scheduler: job requests and lifecycle management
//!
//! Without a `GANTRY_RUNNER_TOKEN` the runner registers itself first and
//! logs the token it was issued.

mod config;
mod context;
mod retry;
mod scheduler;
mod service;

use anyhow::{Context, Result};
use gantry_core::dto::runner::RegisterRunner;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::retry::Backoff;
use crate::scheduler::JobPoller;
use crate::service::{
    CapabilitiesService, ExecutionService, ShellExecutionService, StandardCapabilitiesService,
};
use gantry_client::OrchestratorClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gantry Runner");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: description={}, orchestrator_url={}",
        config.description, config.orchestrator_url
    );

    let client = OrchestratorClient::new(config.orchestrator_url.clone());

    let token = match &config.token {
        Some(token) => token.clone(),
        None => {
            let tags = StandardCapabilitiesService::new(config.tags.clone()).discover();
            for tag in &tags {
                info!("  - {}", tag);
            }

            let request = RegisterRunner {
                description: config.description.clone(),
                scope: config.scope.clone(),
                tags,
                run_untagged: config.run_untagged,
            };
            let token = register_with_retry(&client, request).await?;
            warn!("Set GANTRY_RUNNER_TOKEN={} to reuse this registration", token);
            token
        }
    };

    let client = Arc::new(client.with_runner_token(token));
    let executor: Arc<dyn ExecutionService> = Arc::new(ShellExecutionService::new());

    let poller = JobPoller::new(config.clone(), client, executor);

    info!(
        "Poll interval: {:?}, Log send interval: {:?}",
        config.poll_interval, config.log_send_interval
    );

    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Register with the orchestrator, retrying with exponential backoff
///
/// Returns the issued runner token.
async fn register_with_retry(client: &OrchestratorClient, request: RegisterRunner) -> Result<String> {
    let registered = Backoff::standard()
        .retry("Registration", || client.register_runner(request.clone()))
        .await?;

    info!("Registered as runner {}", registered.id);
    Ok(registered.token)
}
