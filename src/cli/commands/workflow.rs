//! Implementation of the `ratify workflow` commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::WorkflowInstance;

#[derive(Args, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// Start a workflow over a business entity
    Start {
        /// Workflow definition code
        code: String,
        /// Entity type the workflow governs
        #[arg(long)]
        entity_type: String,
        /// Identifier of the business entity
        #[arg(long)]
        entity_id: String,
        /// Display reference for the entity
        #[arg(long)]
        reference: String,
        /// Initiating employee
        #[arg(long)]
        initiator: Uuid,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Approve a task
    Approve {
        task_id: Uuid,
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Reject a task
    Reject {
        task_id: Uuid,
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Ask the initiator for more information
    RequestInfo {
        task_id: Uuid,
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        question: String,
    },
    /// Answer an info request (initiator only)
    ProvideInfo {
        task_id: Uuid,
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        response: String,
    },
    /// Hand a task to another employee
    Delegate {
        task_id: Uuid,
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        delegate: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Cancel an in-progress instance
    Cancel {
        instance_id: Uuid,
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show an instance
    Show { instance_id: Uuid },
}

#[derive(Debug, serde::Serialize)]
struct InstanceOutput {
    instance: WorkflowInstance,
}

impl CommandOutput for InstanceOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_instance(&self.instance)
    }
}

pub async fn execute(args: WorkflowArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    let orchestrator = &ctx.orchestrator;

    let instance = match args.command {
        WorkflowCommands::Start { code, entity_type, entity_id, reference, initiator, comments } => {
            orchestrator
                .start_workflow(&code, &entity_type, &entity_id, &reference, initiator, comments)
                .await?
        }
        WorkflowCommands::Approve { task_id, actor, comments } => {
            orchestrator.approve_step(task_id, actor, comments).await?
        }
        WorkflowCommands::Reject { task_id, actor, reason } => {
            orchestrator.reject_step(task_id, actor, reason).await?
        }
        WorkflowCommands::RequestInfo { task_id, actor, question } => {
            orchestrator.request_more_info(task_id, actor, question).await?
        }
        WorkflowCommands::ProvideInfo { task_id, actor, response } => {
            orchestrator.provide_info(task_id, actor, response).await?
        }
        WorkflowCommands::Delegate { task_id, actor, delegate, reason } => {
            orchestrator.delegate_step(task_id, actor, delegate, reason).await?
        }
        WorkflowCommands::Cancel { instance_id, actor, reason } => {
            orchestrator.cancel_workflow(instance_id, actor, reason).await?
        }
        WorkflowCommands::Show { instance_id } => {
            use crate::domain::ports::InstanceRepository;
            ctx.instances.get(instance_id).await?.ok_or_else(|| anyhow!("No instance {instance_id}"))?
        }
    };

    output(&InstanceOutput { instance }, json_mode);
    Ok(())
}
