//! Command-line interface for the approval engine.

pub mod commands;
pub mod context;
pub mod output;

pub use context::AppContext;
pub use output::{output, CommandOutput, TableFormatter};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ratify", about = "Approval workflow engine", version)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local database and default configuration
    Init(commands::init::InitArgs),
    /// Manage workflow definitions
    Definition(commands::definition::DefinitionArgs),
    /// Start and act on workflow instances
    Workflow(commands::workflow::WorkflowArgs),
    /// Inbox views and claiming
    Tasks(commands::tasks::TasksArgs),
    /// Manage approval delegations
    Delegation(commands::delegation::DelegationArgs),
    /// Process overdue tasks once (cron target)
    Sweep(commands::sweep::SweepArgs),
    /// History, audit, dashboard, and statistics
    Report(commands::report::ReportArgs),
    /// Manage the employee/department/role directory
    Directory(commands::directory::DirectoryArgs),
}

/// Print an error and exit non-zero, honoring `--json`.
pub fn handle_error(error: anyhow::Error, json_mode: bool) {
    if json_mode {
        let body = serde_json::json!({ "success": false, "error": format!("{error:#}") });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {error:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
