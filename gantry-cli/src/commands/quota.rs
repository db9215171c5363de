//! Quota command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use gantry_client::OrchestratorClient;
use gantry_core::dto::quota::QuotaView;
use uuid::Uuid;

use crate::display;

/// Quota subcommands
#[derive(Subcommand)]
pub enum QuotaCommands {
    /// Show a namespace's CI minute usage
    Get { namespace: Uuid },
    /// Set a namespace's monthly minute limit
    Set {
        namespace: Uuid,

        /// Limit in minutes; omit to remove the limit
        #[arg(long)]
        limit: Option<u64>,
    },
}

pub async fn handle_quota_command(
    command: QuotaCommands,
    client: &OrchestratorClient,
) -> Result<()> {
    let view = match command {
        QuotaCommands::Get { namespace } => client.get_quota(namespace).await?,
        QuotaCommands::Set { namespace, limit } => {
            let view = client.set_quota(namespace, limit).await?;
            println!("{}", "✓ Quota updated".green().bold());
            view
        }
    };

    print_quota(&view);
    Ok(())
}

fn print_quota(view: &QuotaView) {
    println!("{}", "CI Minutes:".bold());
    println!("  Namespace: {}", view.namespace_id.to_string().cyan());
    println!("  Used:      {}", view.consumed_minutes);
    match (view.limit_minutes, view.remaining_minutes) {
        (Some(limit), Some(remaining)) => {
            println!("  Limit:     {}", limit);
            println!("  Remaining: {}", remaining);
        }
        (Some(limit), None) => println!("  Limit:     {}", limit),
        (None, _) => println!("  Limit:     {}", "unlimited".dimmed()),
    }
    println!("  Status:    {}", display::quota_status(view.status));
    display::quota_warning(&view.warning);
}
