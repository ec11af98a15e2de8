//! Domain models for backoffice-service.

mod audit;
mod cash;
mod customer;
mod dsr;
mod entity;
mod hr;
mod invoice;
mod task;
mod user;

pub use audit::{AuditAction, AuditLogEntry};
pub use cash::{CashHandover, HandoverStatus};
pub use customer::{Customer, CustomerType, Supplier, SupplierType, Traveler};
pub use dsr::{Dsr, DsrStatus, PaymentMethod, ServiceType};
pub use entity::{Entity, EntityRecord, Record};
pub use hr::{AttendanceRecord, LeaveRequest, LeaveStatus};
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus, SupplierBill, SupplierBillStatus};
pub use task::{Task, TaskPriority, TaskStatus};
pub use user::{Role, User};
