//! Integration tests for parties, HR, cash handovers and tasks.

mod common;

use common::{num, spawn_app, users};
use serde_json::json;

#[tokio::test]
async fn add_customer_starts_with_zero_spend() {
    let app = spawn_app().await;

    let customer = app
        .ok(
            "addCustomer",
            json!({ "actorId": users::AGENT, "name": " Ahmed ", "phone": "+966522222222", "type": "individual" }),
        )
        .await;
    assert_eq!(customer["name"], "Ahmed");
    assert_eq!(num(&customer["totalSpend"]), 0.0);

    let log = app.ok("getAll", json!({ "entity": "AuditLog" })).await;
    assert!(log
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["action"] == "CREATE_CUSTOMER" && e["targetId"] == customer["id"]));
}

#[tokio::test]
async fn customers_with_dsrs_are_not_deleted() {
    let app = spawn_app().await;
    let fresh = app
        .ok("addCustomer", json!({ "actorId": users::MANAGER, "name": "Temp" }))
        .await;
    let fresh_id = fresh["id"].as_str().unwrap();

    let outcome = app
        .ok(
            "bulkDeleteCustomers",
            json!({ "actorId": users::MANAGER, "ids": ["CUST-1", fresh_id] }),
        )
        .await;
    assert_eq!(outcome["affected"], json!([fresh_id]));
    assert_eq!(outcome["skipped"], json!(["CUST-1"]));
}

#[tokio::test]
async fn travelers_need_an_existing_customer() {
    let app = spawn_app().await;

    let traveler = app
        .ok(
            "addTraveler",
            json!({ "actorId": users::AGENT, "name": "Omar", "passportNo": "k1234567", "nationality": "Saudi", "customerId": "CUST-2" }),
        )
        .await;
    assert_eq!(traveler["passportNo"], "K1234567");

    let message = app
        .err(
            "addTraveler",
            json!({ "actorId": users::AGENT, "name": "Omar", "customerId": "CUST-404" }),
        )
        .await;
    assert!(message.starts_with("Not found"), "{message}");
}

#[tokio::test]
async fn suppliers_are_added_by_finance() {
    let app = spawn_app().await;

    let supplier = app
        .ok(
            "addSupplier",
            json!({ "actorId": users::ACCOUNTANT, "name": "Flynas", "type": "airline" }),
        )
        .await;
    assert!(supplier["id"].as_str().unwrap().starts_with("SUP-"));

    let message = app
        .err("addSupplier", json!({ "actorId": users::HR, "name": "X", "type": "other" }))
        .await;
    assert!(message.starts_with("Forbidden"), "{message}");
}

#[tokio::test]
async fn employee_usernames_are_unique_ignoring_case() {
    let app = spawn_app().await;

    let employee = app
        .ok(
            "addEmployee",
            json!({ "actorId": users::HR, "username": "agent2", "email": "agent2@arwa.tech", "role": "agent", "branch": "Jeddah", "name": "Second Agent" }),
        )
        .await;
    let employee_id = employee["id"].as_str().unwrap();
    assert!(employee_id.starts_with("EMP-"));

    let message = app
        .err(
            "addEmployee",
            json!({ "actorId": users::HR, "username": "AGENT2", "email": "x@arwa.tech", "role": "agent", "name": "Dup" }),
        )
        .await;
    assert!(message.starts_with("Conflict"), "{message}");

    let message = app
        .err(
            "updateEmployee",
            json!({ "actorId": users::ADMIN, "id": employee_id, "data": { "username": "Manager" } }),
        )
        .await;
    assert!(message.starts_with("Conflict"), "{message}");

    let updated = app
        .ok(
            "updateEmployee",
            json!({ "actorId": users::ADMIN, "id": employee_id, "data": { "branch": "Dammam" } }),
        )
        .await;
    assert_eq!(updated["branch"], "Dammam");
    assert_eq!(updated["username"], "agent2");
}

#[tokio::test]
async fn only_hr_and_admin_manage_employees() {
    let app = spawn_app().await;
    let message = app
        .err(
            "addEmployee",
            json!({ "actorId": users::MANAGER, "username": "x", "email": "x@arwa.tech", "role": "agent", "name": "X" }),
        )
        .await;
    assert!(message.starts_with("Forbidden"), "{message}");
}

#[tokio::test]
async fn leave_requests_are_decided_once() {
    let app = spawn_app().await;

    let message = app
        .err(
            "requestLeave",
            json!({ "actorId": users::AGENT, "startDate": "2024-09-10", "endDate": "2024-09-01", "reason": "Trip" }),
        )
        .await;
    assert!(message.contains("endDate"), "{message}");

    let leave = app
        .ok(
            "requestLeave",
            json!({ "actorId": users::AGENT, "startDate": "2024-09-01", "endDate": "2024-09-03", "reason": "Family visit" }),
        )
        .await;
    assert_eq!(leave["status"], "pending");
    assert_eq!(leave["employeeName"], "Sales Agent");

    let message = app
        .err(
            "updateLeaveStatus",
            json!({ "actorId": users::MANAGER, "id": leave["id"], "status": "approved" }),
        )
        .await;
    assert!(message.starts_with("Forbidden"), "{message}");

    let decided = app
        .ok(
            "updateLeaveStatus",
            json!({ "actorId": users::HR, "id": leave["id"], "status": "rejected" }),
        )
        .await;
    assert_eq!(decided["status"], "rejected");

    let message = app
        .err(
            "updateLeaveStatus",
            json!({ "actorId": users::HR, "id": leave["id"], "status": "approved" }),
        )
        .await;
    assert!(message.starts_with("Conflict"), "{message}");
}

#[tokio::test]
async fn clock_in_and_out() {
    let app = spawn_app().await;

    let status = app
        .ok("attendanceStatus", json!({ "actorId": users::AGENT }))
        .await;
    assert_eq!(status["status"], "out");

    let record = app.ok("clockIn", json!({ "actorId": users::AGENT })).await;
    assert!(record["clockOutTime"].is_null());

    let message = app.err("clockIn", json!({ "actorId": users::AGENT })).await;
    assert!(message.contains("already clocked in"), "{message}");

    let status = app
        .ok("attendanceStatus", json!({ "actorId": users::AGENT }))
        .await;
    assert_eq!(status["status"], "in");
    assert_eq!(status["record"]["id"], record["id"]);

    let closed = app.ok("clockOut", json!({ "actorId": users::AGENT })).await;
    assert!(closed["clockOutTime"].is_string());

    let message = app.err("clockOut", json!({ "actorId": users::AGENT })).await;
    assert!(message.contains("not clocked in"), "{message}");
}

#[tokio::test]
async fn seeded_open_record_blocks_a_second_clock_in() {
    let app = spawn_app().await;
    let message = app.err("clockIn", json!({ "actorId": users::MANAGER })).await;
    assert!(message.starts_with("Conflict"), "{message}");
}

#[tokio::test]
async fn clock_out_closes_every_open_record() {
    let app = spawn_app().await;
    for (id, at) in [("ATT-90", "2024-07-24T08:00:00Z"), ("ATT-91", "2024-07-24T08:00:01Z")] {
        app.ok(
            "add",
            json!({
                "entity": "AttendanceLog",
                "data": { "id": id, "employeeId": users::AGENT, "employeeName": "Sales Agent", "clockInTime": at }
            }),
        )
        .await;
    }

    let closed = app.ok("clockOut", json!({ "actorId": users::AGENT })).await;
    assert_eq!(closed["id"], "ATT-91");

    let status = app
        .ok("attendanceStatus", json!({ "actorId": users::AGENT }))
        .await;
    assert_eq!(status["status"], "out");
}

#[tokio::test]
async fn cash_handover_is_confirmed_by_a_manager() {
    let app = spawn_app().await;

    let message = app
        .err("initiateHandover", json!({ "actorId": users::AGENT, "amount": 0 }))
        .await;
    assert!(message.contains("greater than zero"), "{message}");

    let handover = app
        .ok("initiateHandover", json!({ "actorId": users::AGENT, "amount": 750 }))
        .await;
    assert_eq!(handover["status"], "pending");
    assert!(handover["managerId"].is_null());

    let message = app
        .err("confirmHandover", json!({ "actorId": users::AGENT, "id": handover["id"] }))
        .await;
    assert!(message.starts_with("Forbidden"), "{message}");

    let confirmed = app
        .ok("confirmHandover", json!({ "actorId": users::MANAGER, "id": handover["id"] }))
        .await;
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["managerName"], "Sales Manager");
    assert!(confirmed["dateConfirmed"].is_string());

    let message = app
        .err("confirmHandover", json!({ "actorId": users::ACCOUNTANT, "id": handover["id"] }))
        .await;
    assert!(message.starts_with("Conflict"), "{message}");
}

#[tokio::test]
async fn tasks_are_stamped_and_guarded() {
    let app = spawn_app().await;

    let task = app
        .ok(
            "addTask",
            json!({ "actorId": users::MANAGER, "title": "Renew IATA licence", "dueDate": "2024-09-30", "assignedTo": users::ACCOUNTANT }),
        )
        .await;
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["createdBy"], users::MANAGER);
    assert!(task["createdAt"].is_string());

    let updated = app
        .ok(
            "updateTask",
            json!({ "actorId": users::ACCOUNTANT, "id": task["id"], "data": { "status": "in-progress", "createdBy": "3" } }),
        )
        .await;
    assert_eq!(updated["status"], "in-progress");
    assert_eq!(updated["createdBy"], users::MANAGER);

    let message = app
        .err(
            "updateTask",
            json!({ "actorId": users::HR, "id": task["id"], "data": { "status": "done" } }),
        )
        .await;
    assert!(message.starts_with("Forbidden"), "{message}");

    let message = app
        .err(
            "addTask",
            json!({ "actorId": users::MANAGER, "title": "Ghost", "dueDate": "2024-09-30", "assignedTo": "99" }),
        )
        .await;
    assert!(message.starts_with("Not found"), "{message}");
}
