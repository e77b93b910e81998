//! SQLite-backed directory: org-structure lookups plus the admin writes the
//! CLI uses to seed employees, departments, and roles.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Department, Employee, Role};
use crate::domain::ports::Directory;

use super::util::{parse_opt_uuid, parse_uuid};

#[derive(Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_employee(&self, employee: &Employee) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO employees (id, name, email, department_id, manager_id, active)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   email = excluded.email,
                   department_id = excluded.department_id,
                   manager_id = excluded.manager_id,
                   active = excluded.active"#,
        )
        .bind(employee.id.to_string())
        .bind(&employee.name)
        .bind(&employee.email)
        .bind(employee.department_id.map(|id| id.to_string()))
        .bind(employee.manager_id.map(|id| id.to_string()))
        .bind(employee.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_department(&self, department: &Department) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO departments (id, name, head_id)
               VALUES (?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET name = excluded.name, head_id = excluded.head_id"#,
        )
        .bind(department.id.to_string())
        .bind(&department.name)
        .bind(department.head_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_role(&self, role: &Role) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO roles (id, code, name)
               VALUES (?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name"#,
        )
        .bind(role.id.to_string())
        .bind(&role.code)
        .bind(&role.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn assign_role(&self, role_id: Uuid, employee_id: Uuid) -> DomainResult<()> {
        if self.employee(employee_id).await?.is_none() {
            return Err(DomainError::EmployeeNotFound(employee_id));
        }
        sqlx::query("INSERT OR IGNORE INTO role_members (role_id, employee_id) VALUES (?, ?)")
            .bind(role_id.to_string())
            .bind(employee_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unassign_role(&self, role_id: Uuid, employee_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM role_members WHERE role_id = ? AND employee_id = ?")
            .bind(role_id.to_string())
            .bind(employee_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_employees(&self) -> DomainResult<Vec<Employee>> {
        let rows: Vec<EmployeeRow> = sqlx::query_as("SELECT * FROM employees ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn list_departments(&self) -> DomainResult<Vec<Department>> {
        let rows: Vec<DepartmentRow> = sqlx::query_as("SELECT * FROM departments ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn list_roles(&self) -> DomainResult<Vec<Role>> {
        let rows: Vec<RoleRow> = sqlx::query_as("SELECT * FROM roles ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn employee(&self, id: Uuid) -> DomainResult<Option<Employee>> {
        let row: Option<EmployeeRow> = sqlx::query_as("SELECT * FROM employees WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn department(&self, id: Uuid) -> DomainResult<Option<Department>> {
        let row: Option<DepartmentRow> = sqlx::query_as("SELECT * FROM departments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn role(&self, id: Uuid) -> DomainResult<Option<Role>> {
        let row: Option<RoleRow> = sqlx::query_as("SELECT * FROM roles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn role_by_code(&self, code: &str) -> DomainResult<Option<Role>> {
        let row: Option<RoleRow> = sqlx::query_as("SELECT * FROM roles WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn role_members(&self, role_id: Uuid) -> DomainResult<Vec<Employee>> {
        let rows: Vec<EmployeeRow> = sqlx::query_as(
            r#"SELECT e.* FROM employees e
               JOIN role_members rm ON rm.employee_id = e.id
               WHERE rm.role_id = ? AND e.active = 1
               ORDER BY e.id"#,
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: String,
    name: String,
    email: String,
    department_id: Option<String>,
    manager_id: Option<String>,
    active: bool,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = DomainError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            department_id: parse_opt_uuid(row.department_id.as_deref())?,
            manager_id: parse_opt_uuid(row.manager_id.as_deref())?,
            active: row.active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DepartmentRow {
    id: String,
    name: String,
    head_id: Option<String>,
}

impl TryFrom<DepartmentRow> for Department {
    type Error = DomainError;

    fn try_from(row: DepartmentRow) -> Result<Self, Self::Error> {
        Ok(Department {
            id: parse_uuid(&row.id)?,
            name: row.name,
            head_id: parse_opt_uuid(row.head_id.as_deref())?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: String,
    code: String,
    name: String,
}

impl TryFrom<RoleRow> for Role {
    type Error = DomainError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Role { id: parse_uuid(&row.id)?, code: row.code, name: row.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> SqliteDirectory {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteDirectory::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_employee_updates_in_place() {
        let dir = setup().await;
        let mut employee = Employee::new("Dana Reyes", "dana@example.com");
        dir.upsert_employee(&employee).await.unwrap();

        employee.email = "dana.reyes@example.com".into();
        dir.upsert_employee(&employee).await.unwrap();

        let loaded = dir.employee(employee.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, "dana.reyes@example.com");
        assert_eq!(dir.list_employees().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_members_excludes_inactive() {
        let dir = setup().await;
        let role = Role::new("FINANCE_APPROVER", "Finance Approver");
        dir.upsert_role(&role).await.unwrap();

        let active = Employee::new("Ari Chen", "ari@example.com");
        let mut inactive = Employee::new("Lee Novak", "lee@example.com");
        inactive.active = false;
        dir.upsert_employee(&active).await.unwrap();
        dir.upsert_employee(&inactive).await.unwrap();
        dir.assign_role(role.id, active.id).await.unwrap();
        dir.assign_role(role.id, inactive.id).await.unwrap();

        let members = dir.role_members(role.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, active.id);
    }

    #[tokio::test]
    async fn test_employee_department_must_exist_first() {
        let dir = setup().await;

        let dangling = Employee::new("Noa Lind", "noa@example.com").with_department(Uuid::new_v4());
        assert!(dir.upsert_employee(&dangling).await.is_err());

        let department = crate::domain::models::Department::new("Ops");
        dir.upsert_department(&department).await.unwrap();
        let employee = Employee::new("Noa Lind", "noa@example.com").with_department(department.id);
        dir.upsert_employee(&employee).await.unwrap();
    }

    #[tokio::test]
    async fn test_assign_role_requires_employee() {
        let dir = setup().await;
        let role = Role::new("HR", "Human Resources");
        dir.upsert_role(&role).await.unwrap();

        assert!(matches!(
            dir.assign_role(role.id, Uuid::new_v4()).await,
            Err(DomainError::EmployeeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_role_lookup_by_code() {
        let dir = setup().await;
        let role = Role::new("CFO", "Chief Financial Officer");
        dir.upsert_role(&role).await.unwrap();

        let loaded = dir.role_by_code("CFO").await.unwrap().unwrap();
        assert_eq!(loaded.id, role.id);
        assert!(dir.role_by_code("CEO").await.unwrap().is_none());
    }
}
