//! Sample agency data for demos and tests.
//!
//! The fares of the sample DSRs are kept exactly as recorded, including the
//! ones that disagree with the fare derivation; `fareDiscrepancies` reports them.

use crate::models::{
    AttendanceRecord, AuditLogEntry, CashHandover, Customer, Dsr, Entity, EntityRecord, Invoice,
    LeaveRequest, Supplier, SupplierBill, Task, Traveler, User,
};
use crate::services::numbering::latest_sequence;
use crate::store::{Mutation, Repository};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use service_core::error::AppError;
use tracing::info;

/// Seeds an empty store. Returns `false` when users already exist.
pub async fn seed_demo_data(store: &dyn Repository) -> Result<bool, AppError> {
    if !store.get_all(Entity::Users).await?.is_empty() {
        return Ok(false);
    }

    let invoices: Vec<Invoice> = decode(invoices())?;

    let mut batch = Vec::new();
    batch.extend(inserts::<User>(users())?);
    batch.extend(inserts::<Customer>(customers())?);
    batch.extend(inserts::<Supplier>(suppliers())?);
    batch.extend(inserts::<Traveler>(travelers())?);
    batch.extend(inserts::<Dsr>(dsrs())?);
    for invoice in &invoices {
        batch.push(Mutation::insert(invoice)?);
    }
    batch.extend(inserts::<SupplierBill>(supplier_bills())?);
    batch.extend(inserts::<LeaveRequest>(leave_requests())?);
    batch.extend(inserts::<CashHandover>(cash_handovers())?);
    batch.extend(inserts::<AttendanceRecord>(attendance_log())?);
    batch.extend(inserts::<AuditLogEntry>(audit_log())?);
    batch.extend(inserts::<Task>(tasks())?);

    let records = batch.len();
    store.apply(batch).await?;

    if let Some(sequence) = latest_sequence(invoices.iter().map(|i| i.invoice_no.as_str())) {
        store.set_invoice_sequence(sequence).await?;
    }

    info!(records, backend = store.backend(), "Seeded demo data");
    Ok(true)
}

fn decode<T: DeserializeOwned>(values: Value) -> Result<Vec<T>, AppError> {
    serde_json::from_value(values)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Invalid demo data: {}", e)))
}

fn inserts<T: EntityRecord>(values: Value) -> Result<Vec<Mutation>, AppError> {
    decode::<T>(values)?.iter().map(Mutation::insert).collect()
}

fn users() -> Value {
    json!([
        { "id": "1", "username": "gm", "role": "admin", "branch": "Riyadh", "name": "General Manager", "email": "gm@arwatravelksa.com" },
        { "id": "2", "username": "manager", "role": "manager", "branch": "Riyadh", "name": "Sales Manager", "email": "manager@arwa.tech" },
        { "id": "3", "username": "agent", "role": "agent", "branch": "Jeddah", "name": "Sales Agent", "email": "agent@arwa.tech" },
        { "id": "4", "username": "accountant", "role": "accountant", "branch": "Riyadh", "name": "Finance Accountant", "email": "accountant@arwa.tech" },
        { "id": "5", "username": "hr", "role": "hr", "branch": "Riyadh", "name": "HR Specialist", "email": "hr@arwa.tech" },
        { "id": "6", "username": "supervisor", "role": "supervisor", "branch": "Dammam", "name": "Team Supervisor", "email": "supervisor@arwa.tech" }
    ])
}

fn customers() -> Value {
    json!([
        { "id": "CUST-1", "name": "Saudi Aramco", "phone": "+966501234567", "email": "contact@aramco.com", "type": "corporate", "totalSpend": 45000 },
        { "id": "CUST-2", "name": "Abdullah Al-Qahtani", "phone": "+966559876543", "email": "a.qahtani@example.com", "type": "individual", "totalSpend": 8250 },
        { "id": "CUST-3", "name": "STC Solutions", "phone": "+966533219876", "email": "info@stcs.com.sa", "type": "corporate", "totalSpend": 19800 },
        { "id": "CUST-4", "name": "Fatima Al-Zahrani", "phone": "+966567891234", "email": "f.zahrani@example.com", "type": "individual", "totalSpend": 12000 }
    ])
}

fn suppliers() -> Value {
    json!([
        { "id": "SUP-1", "name": "Saudia Airlines", "type": "airline" },
        { "id": "SUP-2", "name": "Sabre GDS", "type": "gds" },
        { "id": "SUP-3", "name": "Hilton Hotels", "type": "hotelier" },
        { "id": "SUP-4", "name": "Amadeus", "type": "gds" }
    ])
}

fn travelers() -> Value {
    json!([
        { "id": "TR-1", "name": "John Doe", "passportNo": "A12345678", "nationality": "American", "customerId": "CUST-1" },
        { "id": "TR-2", "name": "Jane Smith", "passportNo": "B87654321", "nationality": "British", "customerId": "CUST-1" }
    ])
}

fn dsrs() -> Value {
    json!([
        {
            "id": "DSR-1", "date": "2024-07-20", "agentUsername": "agent", "agentName": "Sales Agent",
            "customerId": "CUST-2", "supplierId": "SUP-1", "serviceType": "flight", "pnr": "AB1CDE",
            "ticketNo": "157-1234567890", "route": "JED-DXB-JED", "sellingFare": 2300, "status": "approved",
            "baseFare": 1800, "taxes": 400, "discount": 0, "netFare": 2100, "commission": 200,
            "vatOnCommission": 30, "paymentMethod": "card", "remarks": "Customer requested an aisle seat."
        },
        {
            "id": "DSR-2", "date": "2024-07-21", "agentUsername": "agent", "agentName": "Sales Agent",
            "customerId": "CUST-1", "supplierId": "SUP-1", "serviceType": "flight", "pnr": "FG2HIJ",
            "ticketNo": "157-9876543210", "route": "RUH-LHR-RUH", "sellingFare": 4500, "status": "posted",
            "baseFare": 3800, "taxes": 500, "discount": 0, "netFare": 4200, "commission": 300,
            "vatOnCommission": 45, "paymentMethod": "credit"
        },
        {
            "id": "DSR-3", "date": "2024-07-22", "agentUsername": "manager", "agentName": "Sales Manager",
            "customerId": "CUST-3", "supplierId": "SUP-3", "serviceType": "hotel", "pnr": "HLMNO4",
            "ticketNo": "N/A", "route": "Jeddah Hilton - 3 Nights", "sellingFare": 1700, "status": "submitted",
            "baseFare": 1600, "taxes": 0, "discount": 0, "netFare": 1550, "commission": 150,
            "vatOnCommission": 22.5, "paymentMethod": "credit",
            "remarks": "Corporate booking, direct bill to STC Solutions."
        },
        {
            "id": "DSR-4", "date": "2024-07-23", "agentUsername": "agent", "agentName": "Sales Agent",
            "customerId": "CUST-4", "serviceType": "visa", "pnr": "VSAPQR5", "ticketNo": "N/A",
            "route": "Schengen Visa Service", "sellingFare": 850, "status": "draft", "baseFare": 800,
            "taxes": 0, "discount": 0, "netFare": 750, "commission": 100, "vatOnCommission": 15,
            "paymentMethod": "cash"
        }
    ])
}

fn invoices() -> Value {
    json!([
        {
            "id": "INV-1", "invoiceNo": "INV-2024-0001", "date": "2024-07-20", "customerId": "CUST-2",
            "dsrId": "DSR-1",
            "items": [{ "id": "1", "description": "Flight - JED-DXB-JED", "qty": 1, "unitPrice": 2300, "lineTotal": 2300 }],
            "subtotal": 2300, "vat": 30, "total": 2330, "status": "paid"
        },
        {
            "id": "INV-2", "invoiceNo": "INV-2024-0002", "date": "2024-07-21", "customerId": "CUST-1",
            "dsrId": "DSR-2",
            "items": [{ "id": "1", "description": "Flight - RUH-LHR-RUH", "qty": 1, "unitPrice": 4500, "lineTotal": 4500 }],
            "subtotal": 4500, "vat": 45, "total": 4545, "status": "ready"
        }
    ])
}

fn supplier_bills() -> Value {
    json!([
        { "id": "BILL-1", "billNo": "SA-54321", "supplierId": "SUP-1", "dsrId": "DSR-1", "date": "2024-07-20", "total": 2100, "status": "unpaid" },
        { "id": "BILL-2", "billNo": "SA-54322", "supplierId": "SUP-1", "dsrId": "DSR-2", "date": "2024-07-21", "total": 4200, "status": "paid" }
    ])
}

fn leave_requests() -> Value {
    json!([
        { "id": "LR-1", "employeeId": "3", "employeeName": "Sales Agent", "startDate": "2024-08-01", "endDate": "2024-08-05", "reason": "Annual Leave", "status": "approved" },
        { "id": "LR-2", "employeeId": "2", "employeeName": "Sales Manager", "startDate": "2024-08-10", "endDate": "2024-08-12", "reason": "Personal Matter", "status": "pending" }
    ])
}

fn cash_handovers() -> Value {
    json!([
        {
            "id": "CH-1", "agentId": "3", "agentName": "Sales Agent", "managerId": "2", "managerName": "Sales Manager",
            "amount": 500, "dateInitiated": "2024-07-22T10:00:00Z", "dateConfirmed": "2024-07-22T11:00:00Z",
            "status": "confirmed"
        }
    ])
}

fn attendance_log() -> Value {
    json!([
        { "id": "ATT-1", "employeeId": "3", "employeeName": "Sales Agent", "clockInTime": "2024-07-23T09:00:00Z", "clockOutTime": "2024-07-23T17:00:00Z" },
        { "id": "ATT-2", "employeeId": "2", "employeeName": "Sales Manager", "clockInTime": "2024-07-23T08:45:00Z" }
    ])
}

fn audit_log() -> Value {
    json!([
        { "id": "LOG-1", "timestamp": "2024-07-23T09:00:00Z", "userId": "3", "userName": "Sales Agent", "action": "USER_LOGIN", "details": "User Sales Agent logged in." }
    ])
}

fn tasks() -> Value {
    json!([
        {
            "id": "TASK-1", "title": "Follow up with Saudi Aramco",
            "description": "Contact Mr. Ahmed regarding the new corporate travel package.",
            "status": "todo", "priority": "high", "dueDate": "2024-08-05", "assignedTo": "2", "createdBy": "1",
            "createdAt": "2024-07-28T10:00:00Z"
        },
        {
            "id": "TASK-2", "title": "Prepare Q3 Sales Report",
            "description": "Compile all sales data for the third quarter and create a summary report.",
            "status": "in-progress", "priority": "medium", "dueDate": "2024-08-15", "assignedTo": "4", "createdBy": "2",
            "createdAt": "2024-07-25T14:30:00Z"
        },
        {
            "id": "TASK-3", "title": "Finalize Jeddah branch marketing materials",
            "description": "Review and approve the final designs for the new marketing brochures.",
            "status": "todo", "priority": "medium", "dueDate": "2024-08-10", "assignedTo": "3", "createdBy": "2",
            "createdAt": "2024-07-29T09:00:00Z"
        },
        {
            "id": "TASK-4", "title": "Audit end-of-month DSRs",
            "description": "Verify all DSRs submitted in the last week of July for accuracy.",
            "status": "done", "priority": "high", "dueDate": "2024-08-01", "assignedTo": "6", "createdBy": "1",
            "createdAt": "2024-07-26T11:00:00Z"
        },
        {
            "id": "TASK-5", "title": "Onboard new hire",
            "description": "Complete the HR onboarding process for the new agent.",
            "status": "in-progress", "priority": "low", "dueDate": "2024-08-08", "assignedTo": "5", "createdBy": "1",
            "createdAt": "2024-07-30T16:00:00Z"
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InvoiceSequence, MemoryStore};

    #[tokio::test]
    async fn seeds_once_and_restores_the_invoice_counter() {
        let store = MemoryStore::new();
        assert!(seed_demo_data(&store).await.unwrap());
        assert!(!seed_demo_data(&store).await.unwrap());

        assert_eq!(store.get_all(Entity::Users).await.unwrap().len(), 6);
        assert_eq!(store.get_all(Entity::Tasks).await.unwrap().len(), 5);
        assert_eq!(
            store.next_invoice_sequence(2024).await.unwrap(),
            InvoiceSequence {
                year: 2024,
                counter: 3
            }
        );
    }

    #[tokio::test]
    async fn sample_fares_are_stored_as_recorded() {
        let store = MemoryStore::new();
        seed_demo_data(&store).await.unwrap();
        let dsr = store.get(Entity::Dsrs, "DSR-1").await.unwrap().unwrap();
        assert_eq!(dsr["sellingFare"], json!(2300.0));
        assert_eq!(dsr["status"], "approved");
    }
}
