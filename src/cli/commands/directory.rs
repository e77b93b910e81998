//! Implementation of the `ratify directory` commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::AppContext;
use crate::domain::models::{Department, Employee, Role};
use crate::domain::ports::Directory;

#[derive(Args, Debug)]
pub struct DirectoryArgs {
    #[command(subcommand)]
    pub command: DirectoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum DirectoryCommands {
    /// Add or update an employee
    AddEmployee {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        department: Option<Uuid>,
        #[arg(long)]
        manager: Option<Uuid>,
    },
    /// Add or update a department
    AddDepartment {
        #[arg(long)]
        name: String,
        /// Employee who heads the department
        #[arg(long)]
        head: Option<Uuid>,
    },
    /// Add or update a role
    AddRole {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
    },
    /// Put an employee into a role
    AssignRole {
        #[arg(long)]
        role: String,
        #[arg(long)]
        employee: Uuid,
    },
    /// List all employees
    ListEmployees,
}

#[derive(Debug, serde::Serialize)]
struct CreatedOutput {
    id: Uuid,
    message: String,
}

impl CommandOutput for CreatedOutput {
    fn to_human(&self) -> String {
        format!("{} ({})", self.message, self.id)
    }
}

#[derive(Debug, serde::Serialize)]
struct EmployeeListOutput {
    employees: Vec<Employee>,
}

impl CommandOutput for EmployeeListOutput {
    fn to_human(&self) -> String {
        if self.employees.is_empty() {
            return "No employees.".to_string();
        }
        TableFormatter::new().format_employees(&self.employees)
    }
}

pub async fn execute(args: DirectoryArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        DirectoryCommands::AddEmployee { name, email, department, manager } => {
            let mut employee = Employee::new(name.clone(), email);
            employee.department_id = department;
            employee.manager_id = manager;
            ctx.directory.upsert_employee(&employee).await?;
            output(&CreatedOutput { id: employee.id, message: format!("Added employee {name}") }, json_mode);
        }
        DirectoryCommands::AddDepartment { name, head } => {
            let mut department = Department::new(name.clone());
            department.head_id = head;
            ctx.directory.upsert_department(&department).await?;
            output(&CreatedOutput { id: department.id, message: format!("Added department {name}") }, json_mode);
        }
        DirectoryCommands::AddRole { code, name } => {
            let role = Role::new(code.clone(), name);
            ctx.directory.upsert_role(&role).await?;
            output(&CreatedOutput { id: role.id, message: format!("Added role {code}") }, json_mode);
        }
        DirectoryCommands::AssignRole { role, employee } => {
            let role = ctx
                .directory
                .role_by_code(&role)
                .await?
                .ok_or_else(|| anyhow!("No role with code '{role}'"))?;
            ctx.directory.assign_role(role.id, employee).await?;
            output(
                &CreatedOutput { id: employee, message: format!("Assigned role {}", role.code) },
                json_mode,
            );
        }
        DirectoryCommands::ListEmployees => {
            let employees = ctx.directory.list_employees().await?;
            output(&EmployeeListOutput { employees }, json_mode);
        }
    }
    Ok(())
}
