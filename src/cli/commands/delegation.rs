//! Implementation of the `ratify delegation` commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::ApprovalDelegation;

#[derive(Args, Debug)]
pub struct DelegationArgs {
    #[command(subcommand)]
    pub command: DelegationCommands,
}

#[derive(Subcommand, Debug)]
pub enum DelegationCommands {
    /// Register a delegation window
    Create {
        #[arg(long)]
        delegator: Uuid,
        #[arg(long)]
        delegate: Uuid,
        /// Limit to one workflow code (all workflows when omitted)
        #[arg(long)]
        workflow: Option<String>,
        /// RFC3339 start time (now when omitted)
        #[arg(long)]
        starts_at: Option<DateTime<Utc>>,
        /// RFC3339 end time; mutually exclusive with --days
        #[arg(long, conflicts_with = "days")]
        ends_at: Option<DateTime<Utc>>,
        /// Window length in days from the start
        #[arg(long)]
        days: Option<u32>,
    },
    /// Cancel a delegation (delegator only)
    Cancel {
        delegation_id: Uuid,
        #[arg(long)]
        actor: Uuid,
    },
    /// Active delegations an employee is party to
    List { employee: Uuid },
}

#[derive(Debug, serde::Serialize)]
struct DelegationListOutput {
    delegations: Vec<ApprovalDelegation>,
}

impl CommandOutput for DelegationListOutput {
    fn to_human(&self) -> String {
        if self.delegations.is_empty() {
            return "No active delegations.".to_string();
        }
        TableFormatter::new().format_delegations(&self.delegations)
    }
}

#[derive(Debug, serde::Serialize)]
struct DelegationOutput {
    delegation: ApprovalDelegation,
}

impl CommandOutput for DelegationOutput {
    fn to_human(&self) -> String {
        format!(
            "Delegation {} active {} through {}",
            self.delegation.id,
            self.delegation.starts_at.format("%Y-%m-%d"),
            self.delegation.ends_at.format("%Y-%m-%d"),
        )
    }
}

#[derive(Debug, serde::Serialize)]
struct MessageOutput {
    success: bool,
    message: String,
}

impl CommandOutput for MessageOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(args: DelegationArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        DelegationCommands::Create { delegator, delegate, workflow, starts_at, ends_at, days } => {
            let starts_at = starts_at.unwrap_or_else(Utc::now);
            let ends_at = match (ends_at, days) {
                (Some(end), _) => end,
                (None, Some(days)) => starts_at + Duration::days(i64::from(days)),
                (None, None) => starts_at + Duration::days(7),
            };
            let delegation = ctx
                .delegation
                .create_delegation(delegator, delegate, workflow, starts_at, ends_at)
                .await
                .context("Failed to create delegation")?;
            output(&DelegationOutput { delegation }, json_mode);
        }
        DelegationCommands::Cancel { delegation_id, actor } => {
            ctx.delegation.cancel_delegation(delegation_id, actor).await?;
            output(
                &MessageOutput { success: true, message: format!("Cancelled delegation {delegation_id}") },
                json_mode,
            );
        }
        DelegationCommands::List { employee } => {
            let delegations = ctx.delegation.active_delegations(employee).await?;
            output(&DelegationListOutput { delegations }, json_mode);
        }
    }
    Ok(())
}
