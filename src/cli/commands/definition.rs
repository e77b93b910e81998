//! Implementation of the `ratify definition` commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::WorkflowDefinition;
use crate::domain::ports::DefinitionRepository;

#[derive(Args, Debug)]
pub struct DefinitionArgs {
    #[command(subcommand)]
    pub command: DefinitionCommands,
}

#[derive(Subcommand, Debug)]
pub enum DefinitionCommands {
    /// Create a definition from a YAML file
    Create {
        /// Path to the definition YAML
        file: PathBuf,
    },
    /// List definitions
    List {
        /// Include inactive definitions
        #[arg(long)]
        all: bool,
    },
    /// Show one definition with its steps
    Show { code: String },
    /// Make a definition available for new instances
    Activate { code: String },
    /// Stop new instances of a definition (in-flight ones finish)
    Deactivate { code: String },
}

#[derive(Debug, serde::Serialize)]
struct DefinitionListOutput {
    definitions: Vec<WorkflowDefinition>,
}

impl CommandOutput for DefinitionListOutput {
    fn to_human(&self) -> String {
        if self.definitions.is_empty() {
            return "No workflow definitions found.".to_string();
        }
        TableFormatter::new().format_definitions(&self.definitions)
    }
}

#[derive(Debug, serde::Serialize)]
struct DefinitionDetailOutput {
    definition: WorkflowDefinition,
}

impl CommandOutput for DefinitionDetailOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_definition_detail(&self.definition)
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

pub async fn execute(args: DefinitionArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        DefinitionCommands::Create { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let definition: WorkflowDefinition =
                serde_yaml::from_str(&raw).with_context(|| format!("Invalid definition in {}", file.display()))?;
            ctx.definitions.create(&definition).await.context("Failed to create definition")?;
            output(
                &MessageOutput {
                    success: true,
                    message: format!("Created workflow definition '{}'", definition.code),
                },
                json_mode,
            );
        }
        DefinitionCommands::List { all } => {
            let definitions = ctx.definitions.list(!all).await?;
            output(&DefinitionListOutput { definitions }, json_mode);
        }
        DefinitionCommands::Show { code } => {
            let definition = ctx
                .definitions
                .get_by_code(&code)
                .await?
                .ok_or_else(|| anyhow!("No definition with code '{code}'"))?;
            output(&DefinitionDetailOutput { definition }, json_mode);
        }
        DefinitionCommands::Activate { code } => {
            let definition = ctx
                .definitions
                .get_by_code(&code)
                .await?
                .ok_or_else(|| anyhow!("No definition with code '{code}'"))?;
            ctx.definitions.set_active(definition.id, true).await?;
            output(&MessageOutput { success: true, message: format!("Activated '{code}'") }, json_mode);
        }
        DefinitionCommands::Deactivate { code } => {
            let definition = ctx
                .definitions
                .get_by_code(&code)
                .await?
                .ok_or_else(|| anyhow!("No definition with code '{code}'"))?;
            ctx.definitions.set_active(definition.id, false).await?;
            output(&MessageOutput { success: true, message: format!("Deactivated '{code}'") }, json_mode);
        }
    }
    Ok(())
}
