//! Gantry CLI
//!
//! Command-line interface for interacting with the Gantry orchestrator.

mod commands;
mod config;
mod display;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Gantry CI/CD Pipeline CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "GANTRY_URL", default_value = "http://localhost:8080")]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pipeline_create() {
        let cli = Cli::try_parse_from([
            "gantry",
            "pipeline",
            "create",
            "7d0f4c57-9c1c-4a55-9a57-4f3a05d5f7a1",
            "--ref",
            "main",
            "--user",
            "0b9e1d2c-4a1f-4be4-8f5e-2d0f1d9a6c11",
            "-v",
            "DEPLOY=1",
        ])
        .unwrap();

        assert_eq!(cli.orchestrator_url, "http://localhost:8080");
        assert!(matches!(cli.command, Commands::Pipeline { .. }));
    }
}
