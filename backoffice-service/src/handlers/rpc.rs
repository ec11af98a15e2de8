//! The `{action, payload}` JSON RPC endpoint.
//!
//! Both outcomes are answered with HTTP 200 and a `{status, data, message}`
//! envelope. The body is read as text so `text/plain` callers work too.

use crate::dtos::{RpcRequest, RpcResponse};
use crate::services::{record_error, record_rpc_request, BackOffice};
use crate::startup::AppState;
use axum::{extract::State, Json};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use service_core::error::AppError;
use std::time::Instant;
use tracing::{debug, error, Instrument};

/// Every action name the endpoint understands.
pub const ACTIONS: &[&str] = &[
    "testConnection",
    "login",
    "logout",
    "fetchAllData",
    "getAll",
    "add",
    "update",
    "bulkDelete",
    "bulkUpdate",
    "createDsr",
    "updateDsr",
    "listDsrs",
    "submitDsr",
    "approveDsr",
    "rejectDsr",
    "postDsr",
    "bulkDeleteDsrs",
    "getInvoice",
    "acknowledgeInvoice",
    "markInvoicePaid",
    "bulkMarkInvoicesPaid",
    "voidInvoice",
    "bulkDeleteInvoices",
    "invoiceQr",
    "addSupplierBill",
    "updateSupplierBillStatus",
    "bulkMarkSupplierBillsPaid",
    "bulkDeleteSupplierBills",
    "addCustomer",
    "bulkDeleteCustomers",
    "addSupplier",
    "addTraveler",
    "addEmployee",
    "updateEmployee",
    "requestLeave",
    "updateLeaveStatus",
    "clockIn",
    "clockOut",
    "attendanceStatus",
    "initiateHandover",
    "confirmHandover",
    "addTask",
    "updateTask",
    "salesSummary",
    "agentPerformance",
    "commissionReport",
    "supplierBillsReport",
    "agentCashLedger",
    "fareDiscrepancies",
    "zatcaPreview",
];

pub async fn rpc(State(state): State<AppState>, body: String) -> Json<RpcResponse> {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            record_error("bad_request");
            return Json(RpcResponse::error(format!("Invalid request body: {}", e)));
        }
    };

    let label = if ACTIONS.contains(&request.action.as_str()) {
        request.action.as_str()
    } else {
        "unknown"
    };
    let span = tracing::info_span!("rpc", action = %label);
    let start = Instant::now();
    let result = dispatch(&state.backoffice, &request.action, request.payload)
        .instrument(span)
        .await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok((data, message)) => {
            record_rpc_request(label, "success", elapsed);
            Json(RpcResponse::success(data, message))
        }
        Err(e) => {
            record_rpc_request(label, "error", elapsed);
            record_error(e.kind());
            if e.is_server_error() {
                error!(action = %label, error = ?e, "RPC action failed");
            } else {
                debug!(action = %label, error = %e, "RPC action rejected");
            }
            Json(RpcResponse::error(e.public_message()))
        }
    }
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, AppError> {
    serde_json::from_value(payload)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid payload: {}", e)))
}

fn reply<T: Serialize>(data: T, message: &str) -> Result<(Value, String), AppError> {
    let data = serde_json::to_value(data)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode response: {}", e)))?;
    Ok((data, message.to_string()))
}

/// Routes one action to the matching [`BackOffice`] operation.
pub async fn dispatch(
    bo: &BackOffice,
    action: &str,
    payload: Value,
) -> Result<(Value, String), AppError> {
    match action {
        "testConnection" => reply(bo.test_connection().await?, "Connection successful!"),
        "login" => reply(bo.login(parse(payload)?).await?, "Login successful."),
        "logout" => {
            bo.logout(parse(payload)?).await?;
            reply(Value::Null, "Logged out.")
        }
        "fetchAllData" => reply(bo.fetch_all_data().await?, "Data loaded."),
        "getAll" => reply(bo.get_all(parse(payload)?).await?, "Records loaded."),
        "add" => reply(bo.add(parse(payload)?).await?, "Record added."),
        "update" => reply(bo.update(parse(payload)?).await?, "Record updated."),
        "bulkDelete" => {
            let deleted = bo.bulk_delete(parse(payload)?).await?;
            reply(json!({ "count": deleted }), "Records deleted.")
        }
        "bulkUpdate" => {
            let updated = bo.bulk_update(parse(payload)?).await?;
            reply(json!({ "count": updated }), "Records updated.")
        }

        "createDsr" => reply(bo.create_dsr(parse(payload)?).await?, "DSR created."),
        "updateDsr" => reply(bo.update_dsr(parse(payload)?).await?, "DSR updated."),
        "listDsrs" => reply(bo.list_dsrs(parse(payload)?).await?, "DSRs loaded."),
        "submitDsr" => reply(bo.submit_dsr(parse(payload)?).await?, "DSR submitted for approval."),
        "approveDsr" => reply(bo.approve_dsr(parse(payload)?).await?, "DSR approved."),
        "rejectDsr" => reply(bo.reject_dsr(parse(payload)?).await?, "DSR rejected."),
        "postDsr" => reply(bo.post_dsr(parse(payload)?).await?, "DSR posted."),
        "bulkDeleteDsrs" => reply(bo.bulk_delete_dsrs(parse(payload)?).await?, "DSRs deleted."),

        "getInvoice" => reply(bo.get_invoice(parse(payload)?).await?, "Invoice loaded."),
        "acknowledgeInvoice" => reply(
            bo.acknowledge_invoice(parse(payload)?).await?,
            "Invoice acknowledged.",
        ),
        "markInvoicePaid" => reply(
            bo.mark_invoice_paid(parse(payload)?).await?,
            "Invoice marked as paid.",
        ),
        "bulkMarkInvoicesPaid" => reply(
            bo.bulk_mark_invoices_paid(parse(payload)?).await?,
            "Invoices marked as paid.",
        ),
        "voidInvoice" => reply(bo.void_invoice(parse(payload)?).await?, "Invoice voided."),
        "bulkDeleteInvoices" => reply(
            bo.bulk_delete_invoices(parse(payload)?).await?,
            "Invoices deleted.",
        ),
        "invoiceQr" => reply(bo.invoice_qr(parse(payload)?).await?, "QR code generated."),
        "zatcaPreview" => reply(bo.zatca_preview(parse(payload)?)?, "QR code generated."),

        "addSupplierBill" => reply(
            bo.add_supplier_bill(parse(payload)?).await?,
            "Supplier bill added.",
        ),
        "updateSupplierBillStatus" => reply(
            bo.update_supplier_bill_status(parse(payload)?).await?,
            "Supplier bill updated.",
        ),
        "bulkMarkSupplierBillsPaid" => reply(
            bo.bulk_mark_supplier_bills_paid(parse(payload)?).await?,
            "Supplier bills marked as paid.",
        ),
        "bulkDeleteSupplierBills" => {
            let deleted = bo.bulk_delete_supplier_bills(parse(payload)?).await?;
            reply(json!({ "count": deleted }), "Supplier bills deleted.")
        }

        "addCustomer" => reply(bo.add_customer(parse(payload)?).await?, "Customer added."),
        "bulkDeleteCustomers" => reply(
            bo.bulk_delete_customers(parse(payload)?).await?,
            "Customers deleted.",
        ),
        "addSupplier" => reply(bo.add_supplier(parse(payload)?).await?, "Supplier added."),
        "addTraveler" => reply(bo.add_traveler(parse(payload)?).await?, "Traveler added."),
        "addEmployee" => reply(bo.add_employee(parse(payload)?).await?, "Employee added."),
        "updateEmployee" => reply(bo.update_employee(parse(payload)?).await?, "Employee updated."),

        "requestLeave" => reply(bo.request_leave(parse(payload)?).await?, "Leave requested."),
        "updateLeaveStatus" => reply(
            bo.update_leave_status(parse(payload)?).await?,
            "Leave request updated.",
        ),
        "clockIn" => reply(bo.clock_in(parse(payload)?).await?, "Clocked in."),
        "clockOut" => reply(bo.clock_out(parse(payload)?).await?, "Clocked out."),
        "attendanceStatus" => reply(
            bo.attendance_status(parse(payload)?).await?,
            "Attendance status loaded.",
        ),

        "initiateHandover" => reply(
            bo.initiate_handover(parse(payload)?).await?,
            "Cash handover initiated.",
        ),
        "confirmHandover" => reply(
            bo.confirm_handover(parse(payload)?).await?,
            "Cash handover confirmed.",
        ),

        "addTask" => reply(bo.add_task(parse(payload)?).await?, "Task added."),
        "updateTask" => reply(bo.update_task(parse(payload)?).await?, "Task updated."),

        "salesSummary" => reply(bo.sales_summary(parse(payload)?).await?, "Report generated."),
        "agentPerformance" => reply(
            bo.agent_performance(parse(payload)?).await?,
            "Report generated.",
        ),
        "commissionReport" => reply(
            bo.commission_report(parse(payload)?).await?,
            "Report generated.",
        ),
        "supplierBillsReport" => reply(
            bo.supplier_bills_report(parse(payload)?).await?,
            "Report generated.",
        ),
        "agentCashLedger" => reply(
            bo.agent_cash_ledger(parse(payload)?).await?,
            "Report generated.",
        ),
        "fareDiscrepancies" => reply(
            bo.fare_discrepancies(parse(payload)?).await?,
            "Report generated.",
        ),

        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown action: {}",
            other
        ))),
    }
}
