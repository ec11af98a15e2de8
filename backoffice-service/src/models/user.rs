//! Staff accounts and their roles.

use super::{Entity, EntityRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    Accountant,
    Hr,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Supervisor => "supervisor",
            Role::Accountant => "accountant",
            Role::Hr => "hr",
            Role::Agent => "agent",
        }
    }

    /// admin, manager, supervisor
    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Supervisor)
    }

    /// admin, manager, supervisor, accountant
    pub fn is_finance(&self) -> bool {
        self.is_manager() || *self == Role::Accountant
    }

    /// Roles allowed to record sales.
    pub fn can_sell(&self) -> bool {
        self.is_manager() || *self == Role::Agent
    }

    /// Roles allowed to post approved DSRs to the books.
    pub fn can_post(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Accountant)
    }

    /// Roles allowed to manage employees and leave.
    pub fn is_hr_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub branch: String,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

impl EntityRecord for User {
    const ENTITY: Entity = Entity::Users;

    fn id(&self) -> &str {
        &self.id
    }
}
