//! Output formatting for the CLI: `--json` machine output and comfy-table
//! human output.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{
    ApprovalDelegation, Employee, HistoryEntry, InboxEntry, TaskStatus, WorkflowDefinition,
    WorkflowInstance,
};
use crate::services::AuditReport;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum length, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Table formatter for CLI output.
pub struct TableFormatter {
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self { use_colors: console::colors_enabled() }
    }

    fn base_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_BORDERS_ONLY).set_content_arrangement(ContentArrangement::Dynamic);
        table
    }

    fn header(names: &[&str]) -> Vec<Cell> {
        names.iter().map(|n| Cell::new(n).add_attribute(Attribute::Bold)).collect()
    }

    fn status_cell(&self, text: &str, color: Color) -> Cell {
        if self.use_colors {
            Cell::new(text).fg(color)
        } else {
            Cell::new(text)
        }
    }

    pub fn format_definitions(&self, definitions: &[WorkflowDefinition]) -> String {
        let mut table = self.base_table();
        table.set_header(Self::header(&["Code", "Name", "Entity", "Steps", "Parallel", "Active"]));
        for def in definitions {
            let parallel = match (def.allow_parallel_approval, def.require_all_approvers) {
                (true, true) => "all",
                (true, false) => "any",
                _ => "sequential",
            };
            table.add_row(vec![
                Cell::new(&def.code),
                Cell::new(truncate(&def.name, 30)),
                Cell::new(&def.entity_type),
                Cell::new(def.steps.len()),
                Cell::new(parallel),
                self.status_cell(
                    if def.active { "active" } else { "inactive" },
                    if def.active { Color::Green } else { Color::DarkGrey },
                ),
            ]);
        }
        table.to_string()
    }

    pub fn format_definition_detail(&self, definition: &WorkflowDefinition) -> String {
        let mut lines = vec![
            format!("{} ({})", definition.name, definition.code),
            format!("Entity type: {}", definition.entity_type),
            format!(
                "Mode: {}",
                match (definition.allow_parallel_approval, definition.require_all_approvers) {
                    (true, true) => "parallel, all approvers",
                    (true, false) => "parallel, first decision wins",
                    _ => "sequential",
                }
            ),
        ];
        if let Some(sla) = definition.sla_hours {
            lines.push(format!("SLA: {sla}h"));
        }

        let mut table = self.base_table();
        table.set_header(Self::header(&["Seq", "Name", "Type", "Approver", "Escalation"]));
        for step in definition.ordered_steps() {
            let (kind, value) = step.approver.encode();
            let escalation = match (step.escalation_hours, step.escalation_role) {
                (Some(h), Some(_)) => format!("{h}h, reassigned"),
                (Some(h), None) => format!("{h}h, reminder"),
                _ => "-".to_string(),
            };
            table.add_row(vec![
                Cell::new(step.sequence),
                Cell::new(&step.name),
                Cell::new(step.step_type.as_str()),
                Cell::new(format!("{kind}:{}", truncate(&value, 36))),
                Cell::new(escalation),
            ]);
        }
        lines.push(table.to_string());
        lines.join("\n")
    }

    pub fn format_inbox(&self, entries: &[InboxEntry]) -> String {
        let mut table = self.base_table();
        table.set_header(Self::header(&["Task", "Workflow", "Entity", "Step", "Status", "Due"]));
        for entry in entries {
            let due = entry.task.due_at.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string());
            table.add_row(vec![
                Cell::new(short_id(&entry.task.id)),
                Cell::new(&entry.definition_code),
                Cell::new(truncate(&entry.entity_reference, 40)),
                Cell::new(entry.task.step_sequence),
                self.status_cell(entry.task.status.as_str(), task_status_color(entry.task.status)),
                Cell::new(due),
            ]);
        }
        table.to_string()
    }

    pub fn format_instance(&self, instance: &WorkflowInstance) -> String {
        let mut lines = vec![
            format!("Instance {}", instance.id),
            format!("Workflow: {} ({})", instance.definition_code, instance.entity_type),
            format!("Entity: {}", instance.entity_reference),
            format!(
                "Status: {}{}",
                instance.status,
                if instance.on_hold { " (on hold)" } else { "" }
            ),
            format!("Current step: {}", instance.current_sequence),
            format!("Started: {}", instance.started_at.format("%Y-%m-%d %H:%M")),
        ];
        if let Some(completed) = instance.completed_at {
            lines.push(format!("Completed: {}", completed.format("%Y-%m-%d %H:%M")));
        }
        lines.join("\n")
    }

    pub fn format_history(&self, entries: &[HistoryEntry]) -> String {
        let mut table = self.base_table();
        table.set_header(Self::header(&["When", "Step", "Action", "Actor", "Detail"]));
        for entry in entries {
            table.add_row(vec![
                Cell::new(entry.recorded_at.format("%Y-%m-%d %H:%M:%S")),
                Cell::new(entry.step_sequence.map_or_else(|| "-".to_string(), |s| s.to_string())),
                Cell::new(entry.action.as_str()),
                Cell::new(entry.actor_id.as_ref().map_or_else(|| "-".to_string(), short_id)),
                Cell::new(truncate(entry.detail.as_deref().unwrap_or("-"), 48)),
            ]);
        }
        table.to_string()
    }

    pub fn format_audit(&self, report: &AuditReport) -> String {
        let mut lines = vec![
            format!("Audit: {} / {}", report.definition_code, report.entity_reference),
            format!("Status: {}", report.status),
        ];
        let mut table = self.base_table();
        table.set_header(Self::header(&["Seq", "Step", "Activated", "Resolved", "Hours", "Outcome"]));
        for step in &report.steps {
            let fmt_time =
                |t: Option<chrono::DateTime<chrono::Utc>>| t.map_or_else(|| "-".to_string(), |t| t.format("%m-%d %H:%M").to_string());
            table.add_row(vec![
                Cell::new(step.sequence),
                Cell::new(&step.name),
                Cell::new(fmt_time(step.activated_at)),
                Cell::new(fmt_time(step.resolved_at)),
                Cell::new(step.duration_hours.map_or_else(|| "-".to_string(), |h| format!("{h:.1}"))),
                self.status_cell(
                    step.outcome.unwrap_or("pending"),
                    match step.outcome {
                        Some("approved") => Color::Green,
                        Some("rejected") => Color::Red,
                        _ => Color::Yellow,
                    },
                ),
            ]);
        }
        lines.push(table.to_string());
        lines.join("\n")
    }

    pub fn format_employees(&self, employees: &[Employee]) -> String {
        let mut table = self.base_table();
        table.set_header(Self::header(&["Id", "Name", "Email", "Department", "Manager", "Active"]));
        for employee in employees {
            table.add_row(vec![
                Cell::new(short_id(&employee.id)),
                Cell::new(&employee.name),
                Cell::new(&employee.email),
                Cell::new(employee.department_id.as_ref().map_or_else(|| "-".to_string(), short_id)),
                Cell::new(employee.manager_id.as_ref().map_or_else(|| "-".to_string(), short_id)),
                Cell::new(if employee.active { "yes" } else { "no" }),
            ]);
        }
        table.to_string()
    }

    pub fn format_delegations(&self, delegations: &[ApprovalDelegation]) -> String {
        let mut table = self.base_table();
        table.set_header(Self::header(&["Id", "Delegator", "Delegate", "Scope", "From", "Until"]));
        for delegation in delegations {
            table.add_row(vec![
                Cell::new(short_id(&delegation.id)),
                Cell::new(short_id(&delegation.delegator_id)),
                Cell::new(short_id(&delegation.delegate_id)),
                Cell::new(delegation.workflow_code.as_deref().unwrap_or("all workflows")),
                Cell::new(delegation.starts_at.format("%Y-%m-%d")),
                Cell::new(delegation.ends_at.format("%Y-%m-%d")),
            ]);
        }
        table.to_string()
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn task_status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Assigned => Color::Cyan,
        TaskStatus::InfoRequested => Color::Yellow,
        TaskStatus::Approved => Color::Green,
        TaskStatus::Rejected => Color::Red,
        _ => Color::DarkGrey,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long string indeed", 10), "a very...");
    }
}
