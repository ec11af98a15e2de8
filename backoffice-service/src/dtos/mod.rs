//! Payload shapes of the RPC actions.
//!
//! Field names follow the camelCase the web client sends. Typed commands
//! carry the acting user's id in `actorId`.

use crate::models::{
    CustomerType, DsrStatus, LeaveStatus, PaymentMethod, Record, Role, ServiceType, SupplierBillStatus,
    SupplierType, TaskPriority, TaskStatus,
};
use crate::store::RecordUpdate;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Incoming RPC envelope.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// Outgoing RPC envelope.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub status: RpcStatus,
    pub data: Value,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcStatus {
    Success,
    Error,
}

impl RpcResponse {
    pub fn success(data: Value, message: impl Into<String>) -> Self {
        Self {
            status: RpcStatus::Success,
            data,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RpcStatus::Error,
            data: Value::Null,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Generic record actions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    pub actor_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRequest {
    pub entity: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub entity: String,
    pub data: Record,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub entity: String,
    pub id: String,
    pub data: Record,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    pub entity: String,
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub entity: String,
    pub updates: Vec<RecordUpdate>,
}

// ---------------------------------------------------------------------------
// Shared command shapes
// ---------------------------------------------------------------------------

/// A command on one record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdRequest {
    pub actor_id: String,
    pub id: String,
}

/// A command on several records.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdsRequest {
    pub actor_id: String,
    pub ids: Vec<String>,
}

/// Field changes to one record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    pub actor_id: String,
    pub id: String,
    pub data: Record,
}

// ---------------------------------------------------------------------------
// DSRs
// ---------------------------------------------------------------------------

/// Customer details used when the DSR names a customer that may not exist yet.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type", default = "default_customer_type")]
    pub customer_type: CustomerType,
}

fn default_customer_type() -> CustomerType {
    CustomerType::Individual
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDsrRequest {
    pub actor_id: String,
    /// Managers may record a sale on behalf of an agent.
    #[serde(default)]
    pub agent_username: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub customer: Option<CustomerRef>,
    #[serde(default)]
    pub traveler_id: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub service_type: ServiceType,
    #[serde(default)]
    #[validate(length(max = 16))]
    pub pnr: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub ticket_no: String,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub route: String,
    #[serde(default)]
    pub airline: Option<String>,
    pub base_fare: Decimal,
    #[serde(default)]
    pub taxes: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub net_fare: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDsrsRequest {
    pub actor_id: String,
    #[serde(default)]
    pub status: Option<DsrStatus>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    /// Matched case-insensitively against customer name, PNR, ticket no and route.
    #[serde(default)]
    pub search: Option<String>,
}

/// submit / approve / reject / post.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsrStepRequest {
    pub actor_id: String,
    pub id: String,
    /// Required when rejecting.
    #[serde(default)]
    pub remark: Option<String>,
}

// ---------------------------------------------------------------------------
// Invoices and supplier bills
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInvoiceRequest {
    pub id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddSupplierBillRequest {
    pub actor_id: String,
    #[validate(length(min = 1, max = 64))]
    pub bill_no: String,
    pub supplier_id: String,
    #[serde(default)]
    pub dsr_id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub total: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillStatusRequest {
    pub actor_id: String,
    pub id: String,
    pub status: SupplierBillStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZatcaPreviewRequest {
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub vat_number: Option<String>,
    /// ISO-8601; the current time when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
    pub invoice_total: Decimal,
    pub vat_total: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_no: Option<String>,
    pub tlv_base64: String,
    pub qr_png_base64: String,
}

// ---------------------------------------------------------------------------
// Parties and employees
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCustomerRequest {
    pub actor_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type", default = "default_customer_type")]
    pub customer_type: CustomerType,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddSupplierRequest {
    pub actor_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "type")]
    pub supplier_type: SupplierType,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddTravelerRequest {
    pub actor_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub passport_no: String,
    #[serde(default)]
    pub nationality: String,
    pub customer_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddEmployeeRequest {
    pub actor_id: String,
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

// ---------------------------------------------------------------------------
// HR, cash and tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestLeaveRequest {
    pub actor_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveDecisionRequest {
    pub actor_id: String,
    pub id: String,
    pub status: LeaveStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    In,
    Out,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatus {
    pub status: Presence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<crate::models::AttendanceRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateHandoverRequest {
    pub actor_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddTaskRequest {
    pub actor_id: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_task_status")]
    pub status: TaskStatus,
    #[serde(default = "default_task_priority")]
    pub priority: TaskPriority,
    pub due_date: NaiveDate,
    pub assigned_to: String,
}

fn default_task_status() -> TaskStatus {
    TaskStatus::Todo
}

fn default_task_priority() -> TaskPriority {
    TaskPriority::Medium
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub actor_id: String,
    #[serde(default, alias = "startDate")]
    pub from: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashLedgerRequest {
    pub actor_id: String,
    pub agent_id: String,
}

/// Result of a bulk command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub affected: Vec<String>,
    pub skipped: Vec<String>,
}
