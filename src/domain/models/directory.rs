//! Directory records: the identity data approver resolution reads.
//!
//! Hosts embed the engine against their own identity source by implementing
//! the `Directory` port; these records are the shape that port speaks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An employee who can initiate workflows and act on tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub active: bool,
}

impl Employee {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            department_id: None,
            manager_id: None,
            active: true,
        }
    }

    pub fn with_department(mut self, department_id: Uuid) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn with_manager(mut self, manager_id: Uuid) -> Self {
        self.manager_id = Some(manager_id);
        self
    }
}

/// A department with an optional head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub head_id: Option<Uuid>,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), name: name.into(), head_id: None }
    }

    pub fn with_head(mut self, head_id: Uuid) -> Self {
        self.head_id = Some(head_id);
        self
    }
}

/// A named role; approver specs reference roles by id or code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

impl Role {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), code: code.into(), name: name.into() }
    }
}
