//! Entity addressing shared by the repository adapters and the RPC layer.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use service_core::error::AppError;
use std::fmt;
use std::str::FromStr;

/// A stored record: a flat JSON object with camelCase keys.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Entity collections, addressed on the wire by their sheet names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Entity {
    Users,
    Customers,
    Suppliers,
    Travelers,
    Dsrs,
    Invoices,
    SupplierBills,
    LeaveRequests,
    CashHandovers,
    AttendanceLog,
    AuditLog,
    Tasks,
}

impl Entity {
    pub const ALL: [Entity; 12] = [
        Entity::Users,
        Entity::Customers,
        Entity::Suppliers,
        Entity::Travelers,
        Entity::Dsrs,
        Entity::Invoices,
        Entity::SupplierBills,
        Entity::LeaveRequests,
        Entity::CashHandovers,
        Entity::AttendanceLog,
        Entity::AuditLog,
        Entity::Tasks,
    ];

    pub fn sheet_name(&self) -> &'static str {
        match self {
            Entity::Users => "Users",
            Entity::Customers => "Customers",
            Entity::Suppliers => "Suppliers",
            Entity::Travelers => "Travelers",
            Entity::Dsrs => "DSRs",
            Entity::Invoices => "Invoices",
            Entity::SupplierBills => "SupplierBills",
            Entity::LeaveRequests => "LeaveRequests",
            Entity::CashHandovers => "CashHandovers",
            Entity::AttendanceLog => "AttendanceLog",
            Entity::AuditLog => "AuditLog",
            Entity::Tasks => "Tasks",
        }
    }

    /// Table name used by the PostgreSQL adapter.
    pub fn table_name(&self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Customers => "customers",
            Entity::Suppliers => "suppliers",
            Entity::Travelers => "travelers",
            Entity::Dsrs => "dsrs",
            Entity::Invoices => "invoices",
            Entity::SupplierBills => "supplier_bills",
            Entity::LeaveRequests => "leave_requests",
            Entity::CashHandovers => "cash_handovers",
            Entity::AttendanceLog => "attendance_log",
            Entity::AuditLog => "audit_log",
            Entity::Tasks => "tasks",
        }
    }

    /// Key of this collection in the `fetchAllData` snapshot.
    pub fn data_key(&self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Customers => "customers",
            Entity::Suppliers => "suppliers",
            Entity::Travelers => "travelers",
            Entity::Dsrs => "dsrs",
            Entity::Invoices => "invoices",
            Entity::SupplierBills => "supplierBills",
            Entity::LeaveRequests => "leaveRequests",
            Entity::CashHandovers => "cashHandovers",
            Entity::AttendanceLog => "attendanceLog",
            Entity::AuditLog => "auditLog",
            Entity::Tasks => "tasks",
        }
    }

    /// Prefix of generated ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Entity::Users => "EMP",
            Entity::Customers => "CUST",
            Entity::Suppliers => "SUP",
            Entity::Travelers => "TR",
            Entity::Dsrs => "DSR",
            Entity::Invoices => "INV",
            Entity::SupplierBills => "BILL",
            Entity::LeaveRequests => "LR",
            Entity::CashHandovers => "CH",
            Entity::AttendanceLog => "ATT",
            Entity::AuditLog => "LOG",
            Entity::Tasks => "TASK",
        }
    }

    /// Fields that only typed commands may change.
    pub fn protected_fields(&self) -> &'static [&'static str] {
        match self {
            Entity::Dsrs => &["id", "status", "sellingFare", "commission", "vatOnCommission"],
            Entity::Invoices => &[
                "id",
                "status",
                "invoiceNo",
                "subtotal",
                "vat",
                "total",
                "qrCodeTlv",
                "dsrId",
                "items",
                "firstViewedAt",
            ],
            Entity::Customers => &["id", "totalSpend"],
            Entity::SupplierBills | Entity::LeaveRequests | Entity::CashHandovers => {
                &["id", "status"]
            }
            _ => &["id"],
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

impl FromStr for Entity {
    type Err = AppError;

    /// Accepts either the sheet name (`SupplierBills`) or the table name (`supplier_bills`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Entity::ALL
            .into_iter()
            .find(|e| e.sheet_name() == s || e.table_name() == s)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown entity '{}'", s)))
    }
}

impl TryFrom<String> for Entity {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Entity> for String {
    fn from(value: Entity) -> Self {
        value.sheet_name().to_string()
    }
}

/// A typed model stored in one entity collection.
pub trait EntityRecord: Serialize + DeserializeOwned {
    const ENTITY: Entity;

    fn id(&self) -> &str;

    fn to_record(&self) -> Result<Record, AppError> {
        match serde_json::to_value(self)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode record: {}", e)))?
        {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(AppError::InternalError(anyhow::anyhow!(
                "{} encoded as non-object JSON: {}",
                Self::ENTITY,
                other
            ))),
        }
    }

    /// Decodes a record read back from the store.
    fn from_record(record: Record) -> Result<Self, AppError> {
        serde_json::from_value(serde_json::Value::Object(record)).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!(
                "Stored {} record is malformed: {}",
                Self::ENTITY,
                e
            ))
        })
    }

    /// Decodes caller-supplied data, reporting shape errors as a bad request.
    fn from_input(record: Record) -> Result<Self, AppError> {
        serde_json::from_value(serde_json::Value::Object(record)).map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Invalid {} record: {}", Self::ENTITY, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sheet_and_table_names() {
        assert_eq!("DSRs".parse::<Entity>().unwrap(), Entity::Dsrs);
        assert_eq!("supplier_bills".parse::<Entity>().unwrap(), Entity::SupplierBills);
        assert!("Campaigns".parse::<Entity>().is_err());
    }

    #[test]
    fn serializes_as_sheet_name() {
        let v = serde_json::to_value(Entity::AttendanceLog).unwrap();
        assert_eq!(v, "AttendanceLog");
        let e: Entity = serde_json::from_value(serde_json::json!("DSRs")).unwrap();
        assert_eq!(e, Entity::Dsrs);
    }

    #[test]
    fn id_is_protected_everywhere() {
        for entity in Entity::ALL {
            assert!(entity.protected_fields().contains(&"id"), "{}", entity);
        }
    }
}
