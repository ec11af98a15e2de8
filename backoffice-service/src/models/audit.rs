//! Audit trail entries.

use super::{Entity, EntityRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserLogin,
    UserLogout,
    CreateDsr,
    UpdateDsrStatus,
    DeleteDsr,
    CreateInvoice,
    UpdateInvoiceStatus,
    DeleteInvoice,
    CreateCustomer,
    DeleteCustomer,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserLogin => "USER_LOGIN",
            AuditAction::UserLogout => "USER_LOGOUT",
            AuditAction::CreateDsr => "CREATE_DSR",
            AuditAction::UpdateDsrStatus => "UPDATE_DSR_STATUS",
            AuditAction::DeleteDsr => "DELETE_DSR",
            AuditAction::CreateInvoice => "CREATE_INVOICE",
            AuditAction::UpdateInvoiceStatus => "UPDATE_INVOICE_STATUS",
            AuditAction::DeleteInvoice => "DELETE_INVOICE",
            AuditAction::CreateCustomer => "CREATE_CUSTOMER",
            AuditAction::DeleteCustomer => "DELETE_CUSTOMER",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub action: AuditAction,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl EntityRecord for AuditLogEntry {
    const ENTITY: Entity = Entity::AuditLog;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_serialize_in_screaming_case() {
        for action in [AuditAction::UpdateDsrStatus, AuditAction::UserLogin] {
            let v = serde_json::to_value(action).unwrap();
            assert_eq!(v, action.as_str());
        }
    }
}
