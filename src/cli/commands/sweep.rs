//! Implementation of the `ratify sweep` command, the external scheduler's
//! cron target.

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;
use crate::services::SweepReport;

#[derive(Args, Debug)]
pub struct SweepArgs {}

#[derive(Debug, serde::Serialize)]
struct SweepOutput {
    report: SweepReport,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        format!(
            "Sweep: {} scanned, {} escalated, {} reminded, {} skipped, {} failed",
            r.scanned, r.escalated, r.reminded, r.skipped, r.failed
        )
    }
}

pub async fn execute(_args: SweepArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    let report = ctx.escalation.process_overdue_steps().await?;
    output(&SweepOutput { report }, json_mode);
    Ok(())
}
