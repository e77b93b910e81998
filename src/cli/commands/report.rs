//! Implementation of the `ratify report` commands.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::HistoryEntry;
use crate::services::{AuditReport, Dashboard, Statistics};

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Raw ordered history of one instance
    History { instance_id: Uuid },
    /// Per-step audit timeline with durations
    Audit { instance_id: Uuid },
    /// Live counts across the engine
    Dashboard,
    /// Outcome statistics over a period
    Stats {
        /// Look back this many days
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Debug, serde::Serialize)]
struct HistoryOutput {
    entries: Vec<HistoryEntry>,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No history.".to_string();
        }
        TableFormatter::new().format_history(&self.entries)
    }
}

#[derive(Debug, serde::Serialize)]
struct AuditOutput {
    report: AuditReport,
}

impl CommandOutput for AuditOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_audit(&self.report)
    }
}

#[derive(Debug, serde::Serialize)]
struct DashboardOutput {
    dashboard: Dashboard,
}

impl CommandOutput for DashboardOutput {
    fn to_human(&self) -> String {
        let d = &self.dashboard;
        let mut lines = vec![
            format!("In progress: {} ({} on hold)", d.in_progress_instances, d.on_hold_instances),
            format!("Open tasks:  {} ({} overdue)", d.open_tasks, d.overdue_tasks),
        ];
        if !d.per_definition.is_empty() {
            lines.push("Per workflow:".to_string());
            for (code, count) in &d.per_definition {
                lines.push(format!("  {code}: {count}"));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
struct StatsOutput {
    statistics: Statistics,
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        let s = &self.statistics;
        let mut lines = vec![
            format!(
                "Started: {} (approved {}, rejected {}, cancelled {}, in progress {})",
                s.started, s.approved, s.rejected, s.cancelled, s.in_progress
            ),
            format!("Approval rate: {:.0}%", s.approval_rate * 100.0),
        ];
        if let Some(hours) = s.avg_completion_hours {
            lines.push(format!("Avg completion: {hours:.1}h"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ReportArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        ReportCommands::History { instance_id } => {
            let entries = ctx.reporting.workflow_history(instance_id).await?;
            output(&HistoryOutput { entries }, json_mode);
        }
        ReportCommands::Audit { instance_id } => {
            let report = ctx.reporting.audit_report(instance_id).await?;
            output(&AuditOutput { report }, json_mode);
        }
        ReportCommands::Dashboard => {
            let dashboard = ctx.reporting.dashboard().await?;
            output(&DashboardOutput { dashboard }, json_mode);
        }
        ReportCommands::Stats { days } => {
            let to = Utc::now();
            let from = to - Duration::days(i64::from(days));
            let statistics = ctx.reporting.statistics(from, to).await?;
            output(&StatsOutput { statistics }, json_mode);
        }
    }
    Ok(())
}
