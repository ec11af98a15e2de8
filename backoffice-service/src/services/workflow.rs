//! Status state machines and the role rules that guard them.
//!
//! These functions are pure: they decide whether a step is allowed and what
//! the resulting status is. Writing the step is left to the caller, which
//! re-checks the current status inside its atomic batch.

use crate::models::{
    Dsr, DsrStatus, HandoverStatus, InvoiceStatus, LeaveStatus, Role, SupplierBillStatus, User,
};
use service_core::error::AppError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsrAction {
    Submit,
    Approve,
    Reject,
    Post,
}

impl DsrAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DsrAction::Submit => "submit",
            DsrAction::Approve => "approve",
            DsrAction::Reject => "reject",
            DsrAction::Post => "post",
        }
    }
}

impl fmt::Display for DsrAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceAction {
    MarkPaid,
    Void,
}

impl InvoiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceAction::MarkPaid => "mark as paid",
            InvoiceAction::Void => "void",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error("cannot {action} {subject} that is {current}")]
    InvalidTransition {
        subject: &'static str,
        current: String,
        action: &'static str,
    },

    #[error("role '{role}' is not allowed to {action}")]
    NotPermitted { role: Role, action: &'static str },

    #[error("only the owning agent may submit this DSR")]
    NotOwner,

    #[error("a remark is required to reject a DSR")]
    MissingRemark,
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::InvalidTransition { .. } => AppError::Conflict(err.into()),
            WorkflowError::NotPermitted { .. } | WorkflowError::NotOwner => {
                AppError::Forbidden(err.into())
            }
            WorkflowError::MissingRemark => AppError::BadRequest(err.into()),
        }
    }
}

fn invalid(subject: &'static str, current: impl fmt::Display, action: &'static str) -> WorkflowError {
    WorkflowError::InvalidTransition {
        subject,
        current: current.to_string(),
        action,
    }
}

/// Fails with [`WorkflowError::NotPermitted`] unless `allowed` holds for the actor's role.
pub fn require_role(
    actor: &User,
    allowed: fn(&Role) -> bool,
    action: &'static str,
) -> Result<(), WorkflowError> {
    if allowed(&actor.role) {
        Ok(())
    } else {
        Err(WorkflowError::NotPermitted {
            role: actor.role,
            action,
        })
    }
}

/// Status a DSR moves to under `action`.
///
/// Only draft -> submitted -> approved -> posted and submitted -> draft exist.
pub fn dsr_transition(current: DsrStatus, action: DsrAction) -> Result<DsrStatus, WorkflowError> {
    match (current, action) {
        (DsrStatus::Draft, DsrAction::Submit) => Ok(DsrStatus::Submitted),
        (DsrStatus::Submitted, DsrAction::Approve) => Ok(DsrStatus::Approved),
        (DsrStatus::Submitted, DsrAction::Reject) => Ok(DsrStatus::Draft),
        (DsrStatus::Approved, DsrAction::Post) => Ok(DsrStatus::Posted),
        (current, action) => Err(invalid("a DSR", current, action.as_str())),
    }
}

/// Checks that `actor` may perform `action` on `dsr`.
pub fn authorize_dsr(dsr: &Dsr, action: DsrAction, actor: &User) -> Result<(), WorkflowError> {
    match action {
        DsrAction::Submit => {
            if dsr.agent_username.eq_ignore_ascii_case(&actor.username) {
                Ok(())
            } else {
                Err(WorkflowError::NotOwner)
            }
        }
        DsrAction::Approve => require_role(actor, Role::is_manager, "approve DSRs"),
        DsrAction::Reject => require_role(actor, Role::is_manager, "reject DSRs"),
        DsrAction::Post => require_role(actor, Role::can_post, "post DSRs"),
    }
}

/// Authorises and resolves one DSR step.
pub fn plan_dsr_step(
    dsr: &Dsr,
    action: DsrAction,
    actor: &User,
) -> Result<DsrStatus, WorkflowError> {
    authorize_dsr(dsr, action, actor)?;
    dsr_transition(dsr.status, action)
}

/// Only `ready` invoices can be paid or voided.
pub fn invoice_transition(
    current: InvoiceStatus,
    action: InvoiceAction,
) -> Result<InvoiceStatus, WorkflowError> {
    match (current, action) {
        (InvoiceStatus::Ready, InvoiceAction::MarkPaid) => Ok(InvoiceStatus::Paid),
        (InvoiceStatus::Ready, InvoiceAction::Void) => Ok(InvoiceStatus::Void),
        (current, action) => Err(invalid("an invoice", current, action.as_str())),
    }
}

/// Only `unpaid` bills change status, to `paid` or `void`.
pub fn bill_transition(
    current: SupplierBillStatus,
    target: SupplierBillStatus,
) -> Result<SupplierBillStatus, WorkflowError> {
    match (current, target) {
        (SupplierBillStatus::Unpaid, SupplierBillStatus::Paid | SupplierBillStatus::Void) => {
            Ok(target)
        }
        (current, SupplierBillStatus::Paid) => Err(invalid("a supplier bill", current, "pay")),
        (current, _) => Err(invalid("a supplier bill", current, "change")),
    }
}

/// Only `pending` requests are decided, to `approved` or `rejected`.
pub fn leave_transition(current: LeaveStatus, target: LeaveStatus) -> Result<LeaveStatus, WorkflowError> {
    match (current, target) {
        (LeaveStatus::Pending, LeaveStatus::Approved | LeaveStatus::Rejected) => Ok(target),
        (current, _) => Err(invalid("a leave request", current, "decide")),
    }
}

pub fn handover_confirmation(current: HandoverStatus) -> Result<HandoverStatus, WorkflowError> {
    match current {
        HandoverStatus::Pending => Ok(HandoverStatus::Confirmed),
        HandoverStatus::Confirmed => Err(invalid("a cash handover", "confirmed", "confirm")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(username: &str, role: Role) -> User {
        User {
            id: "U".to_string(),
            username: username.to_string(),
            email: format!("{}@arwa.tech", username),
            role,
            branch: "Riyadh".to_string(),
            name: username.to_string(),
        }
    }

    fn dsr(status: &str) -> Dsr {
        serde_json::from_value(json!({
            "id": "DSR-9",
            "date": "2024-07-23",
            "agentUsername": "agent",
            "customerId": "CUST-4",
            "serviceType": "visa",
            "baseFare": 800,
            "netFare": 750,
            "status": status,
            "paymentMethod": "cash"
        }))
        .unwrap()
    }

    #[test]
    fn only_forward_steps_and_reject_are_accepted() {
        use DsrAction::*;
        use DsrStatus::*;

        let statuses = [Draft, Submitted, Approved, Posted];
        let actions = [Submit, Approve, Reject, Post];
        let allowed = [
            (Draft, Submit, Submitted),
            (Submitted, Approve, Approved),
            (Submitted, Reject, Draft),
            (Approved, Post, Posted),
        ];

        for status in statuses {
            for action in actions {
                let expected = allowed
                    .iter()
                    .find(|(s, a, _)| *s == status && *a == action)
                    .map(|(_, _, to)| *to);
                match expected {
                    Some(to) => assert_eq!(dsr_transition(status, action), Ok(to)),
                    None => assert!(matches!(
                        dsr_transition(status, action),
                        Err(WorkflowError::InvalidTransition { .. })
                    )),
                }
            }
        }
    }

    #[test]
    fn invalid_transition_names_status_and_action() {
        let err = dsr_transition(DsrStatus::Posted, DsrAction::Approve).unwrap_err();
        assert_eq!(err.to_string(), "cannot approve a DSR that is posted");
    }

    #[test]
    fn submit_requires_owner() {
        let d = dsr("draft");
        assert!(plan_dsr_step(&d, DsrAction::Submit, &user("agent", Role::Agent)).is_ok());
        assert_eq!(
            plan_dsr_step(&d, DsrAction::Submit, &user("manager", Role::Manager)),
            Err(WorkflowError::NotOwner)
        );
    }

    #[test]
    fn approve_and_post_require_roles() {
        let submitted = dsr("submitted");
        assert!(matches!(
            plan_dsr_step(&submitted, DsrAction::Approve, &user("agent", Role::Agent)),
            Err(WorkflowError::NotPermitted { .. })
        ));
        assert_eq!(
            plan_dsr_step(&submitted, DsrAction::Approve, &user("sv", Role::Supervisor)),
            Ok(DsrStatus::Approved)
        );

        let approved = dsr("approved");
        assert!(plan_dsr_step(&approved, DsrAction::Post, &user("sv", Role::Supervisor)).is_err());
        assert_eq!(
            plan_dsr_step(&approved, DsrAction::Post, &user("acc", Role::Accountant)),
            Ok(DsrStatus::Posted)
        );
    }

    #[test]
    fn workflow_errors_map_to_app_errors() {
        let conflict: AppError = dsr_transition(DsrStatus::Draft, DsrAction::Post)
            .unwrap_err()
            .into();
        assert!(matches!(conflict, AppError::Conflict(_)));

        let forbidden: AppError = WorkflowError::NotOwner.into();
        assert!(matches!(forbidden, AppError::Forbidden(_)));
    }

    #[test]
    fn invoices_bills_leave_and_handovers() {
        assert_eq!(
            invoice_transition(InvoiceStatus::Ready, InvoiceAction::MarkPaid),
            Ok(InvoiceStatus::Paid)
        );
        assert!(invoice_transition(InvoiceStatus::Paid, InvoiceAction::Void).is_err());
        assert!(invoice_transition(InvoiceStatus::Void, InvoiceAction::MarkPaid).is_err());

        assert!(bill_transition(SupplierBillStatus::Unpaid, SupplierBillStatus::Void).is_ok());
        assert!(bill_transition(SupplierBillStatus::Paid, SupplierBillStatus::Void).is_err());
        assert!(bill_transition(SupplierBillStatus::Unpaid, SupplierBillStatus::Unpaid).is_err());

        assert!(leave_transition(LeaveStatus::Pending, LeaveStatus::Rejected).is_ok());
        assert!(leave_transition(LeaveStatus::Approved, LeaveStatus::Rejected).is_err());
        assert!(leave_transition(LeaveStatus::Pending, LeaveStatus::Pending).is_err());

        assert!(handover_confirmation(HandoverStatus::Pending).is_ok());
        assert!(handover_confirmation(HandoverStatus::Confirmed).is_err());
    }
}
