//! Implementation of the `ratify tasks` commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::{ApprovalTask, InboxEntry};
use crate::domain::ports::InboxFilter;

#[derive(Args, Debug)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: TasksCommands,
}

#[derive(Args, Debug, Default)]
pub struct FilterFlags {
    /// Only tasks of this workflow code
    #[arg(long)]
    pub workflow: Option<String>,

    /// Only tasks past their due time
    #[arg(long)]
    pub overdue: bool,

    /// Only department-owned tasks still claimable
    #[arg(long)]
    pub claimable: bool,
}

impl From<FilterFlags> for InboxFilter {
    fn from(flags: FilterFlags) -> Self {
        Self {
            definition_code: flags.workflow,
            overdue_only: flags.overdue,
            claimable_only: flags.claimable,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TasksCommands {
    /// Live tasks assigned to a user
    Mine {
        /// Employee id
        user: Uuid,
        #[command(flatten)]
        filter: FilterFlags,
    },
    /// Live tasks routed to a department inbox
    Department {
        /// Department id
        department: Uuid,
        #[command(flatten)]
        filter: FilterFlags,
    },
    /// Claim a department-owned task
    Claim {
        task_id: Uuid,
        #[arg(long)]
        claimant: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
struct InboxOutput {
    entries: Vec<InboxEntry>,
}

impl CommandOutput for InboxOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No open tasks.".to_string();
        }
        TableFormatter::new().format_inbox(&self.entries)
    }
}

#[derive(Debug, serde::Serialize)]
struct ClaimOutput {
    task: ApprovalTask,
}

impl CommandOutput for ClaimOutput {
    fn to_human(&self) -> String {
        format!("Claimed task {} (step {})", self.task.id, self.task.step_sequence)
    }
}

pub async fn execute(args: TasksArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        TasksCommands::Mine { user, filter } => {
            let entries = ctx.task_queue.my_tasks(user, &filter.into()).await?;
            output(&InboxOutput { entries }, json_mode);
        }
        TasksCommands::Department { department, filter } => {
            let entries = ctx.task_queue.department_tasks(department, &filter.into()).await?;
            output(&InboxOutput { entries }, json_mode);
        }
        TasksCommands::Claim { task_id, claimant } => {
            let task = ctx.task_queue.claim_task(task_id, claimant).await?;
            output(&ClaimOutput { task }, json_mode);
        }
    }
    Ok(())
}
