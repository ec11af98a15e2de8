//! DSR commands: capture, edit, listing and the approval workflow.

use super::records::{deletable, prepare_update};
use super::{audit, patch, status_is, BackOffice};
use crate::dtos::{BulkOutcome, CreateDsrRequest, DsrStepRequest, IdsRequest, ListDsrsRequest, PatchRequest};
use crate::models::{
    AuditAction, Customer, Dsr, DsrStatus, Entity, EntityRecord, Invoice, InvoiceItem, InvoiceStatus,
    Role, Supplier, SupplierBill, SupplierBillStatus, Traveler, User,
};
use crate::services::fares::apply_derivation;
use crate::services::ids::{next_id, now};
use crate::services::metrics::{DSR_TRANSITIONS_TOTAL, INVOICES_TOTAL};
use crate::services::numbering::next_invoice_number;
use crate::services::workflow::{plan_dsr_step, require_role, DsrAction, WorkflowError};
use crate::services::zatca::invoice_tlv;
use crate::store::Mutation;
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use service_core::error::AppError;
use std::collections::HashMap;
use tracing::{info, instrument};
use validator::Validate;

/// Everything a submission wrote.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub dsr: Dsr,
    pub invoice: Invoice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_bill: Option<SupplierBill>,
    pub voided_invoices: Vec<String>,
    pub voided_bills: Vec<String>,
}

impl BackOffice {
    /// Records a sale as a draft DSR, creating the customer when the phone
    /// number is not known yet.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id))]
    pub async fn create_dsr(&self, req: CreateDsrRequest) -> Result<Dsr, AppError> {
        req.validate()?;
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::can_sell, "create DSRs")?;

        let agent = match req.agent_username.as_deref().map(str::trim) {
            Some(username) if !username.is_empty() && !username.eq_ignore_ascii_case(&actor.username) => {
                require_role(&actor, Role::is_manager, "record DSRs for another agent")?;
                self.list::<User>()
                    .await?
                    .into_iter()
                    .find(|u| u.username.eq_ignore_ascii_case(username))
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User '{}' not found", username)))?
            }
            _ => actor.clone(),
        };

        let mut batch = Vec::new();
        let customer = match (non_empty(req.customer_id), req.customer) {
            (Some(id), _) => self.load::<Customer>(&id).await?,
            (None, Some(details)) => {
                let phone = normalize_phone(&details.phone);
                let existing = self
                    .list::<Customer>()
                    .await?
                    .into_iter()
                    .find(|c| normalize_phone(&c.phone) == phone);
                match existing {
                    Some(customer) => customer,
                    None => {
                        let customer = Customer {
                            id: next_id(Entity::Customers.id_prefix()),
                            name: details.name.trim().to_string(),
                            phone: details.phone.trim().to_string(),
                            email: details.email.trim().to_string(),
                            customer_type: details.customer_type,
                            total_spend: Decimal::ZERO,
                        };
                        batch.push(Mutation::insert(&customer)?);
                        batch.push(audit(
                            &actor,
                            AuditAction::CreateCustomer,
                            format!("Created customer {} ({})", customer.name, customer.id),
                            Some(&customer.id),
                        )?);
                        customer
                    }
                }
            }
            (None, None) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Either customerId or customer details are required"
                )))
            }
        };

        let supplier_id = non_empty(req.supplier_id);
        if let Some(id) = &supplier_id {
            self.load::<Supplier>(id).await?;
        }
        let traveler_id = non_empty(req.traveler_id);
        if let Some(id) = &traveler_id {
            self.load::<Traveler>(id).await?;
        }

        let mut dsr = Dsr {
            id: next_id(Entity::Dsrs.id_prefix()),
            date: req.date.unwrap_or_else(|| now().date_naive()),
            agent_username: agent.username,
            agent_name: agent.name,
            customer_id: customer.id,
            traveler_id,
            supplier_id,
            service_type: req.service_type,
            pnr: req.pnr.trim().to_uppercase(),
            ticket_no: req.ticket_no.trim().to_string(),
            route: req.route.trim().to_uppercase(),
            airline: non_empty(req.airline),
            base_fare: req.base_fare,
            taxes: req.taxes,
            discount: req.discount,
            net_fare: req.net_fare,
            selling_fare: Decimal::ZERO,
            commission: Decimal::ZERO,
            vat_on_commission: Decimal::ZERO,
            status: DsrStatus::Draft,
            payment_method: req.payment_method,
            remarks: non_empty(req.remarks),
        };
        apply_derivation(&mut dsr)?;
        dsr.validate()?;

        batch.push(Mutation::insert(&dsr)?);
        batch.push(audit(
            &actor,
            AuditAction::CreateDsr,
            format!("Created DSR ({}) for PNR {}", dsr.id, dsr.pnr),
            Some(&dsr.id),
        )?);
        self.commit("create_dsr", batch).await?;

        info!(dsr_id = %dsr.id, customer_id = %dsr.customer_id, "DSR created");
        Ok(dsr)
    }

    /// Edits a draft DSR and re-derives its fares.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, dsr_id = %req.id))]
    pub async fn update_dsr(&self, req: PatchRequest) -> Result<Dsr, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let current = self
            .store
            .get(Entity::Dsrs, &req.id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("DSRs '{}' not found", req.id)))?;
        let dsr = Dsr::from_record(current.clone())?;
        if !dsr.agent_username.eq_ignore_ascii_case(&actor.username) && !actor.role.is_manager() {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "only the owning agent or a manager may edit this DSR"
            )));
        }

        let prepared = prepare_update(Entity::Dsrs, &current, req.data)?;
        self.commit(
            "update_dsr",
            vec![Mutation::update(Entity::Dsrs, &req.id, prepared.patch, prepared.guard)],
        )
        .await?;
        self.load(&req.id).await
    }

    /// Newest first. Agents only see their own DSRs.
    pub async fn list_dsrs(&self, req: ListDsrsRequest) -> Result<Vec<Dsr>, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let customer_names: HashMap<String, String> = self
            .list::<Customer>()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name.to_lowercase()))
            .collect();
        let needle = req
            .search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut dsrs: Vec<Dsr> = self
            .list::<Dsr>()
            .await?
            .into_iter()
            .filter(|d| actor.role != Role::Agent || d.agent_username.eq_ignore_ascii_case(&actor.username))
            .filter(|d| req.status.map_or(true, |s| d.status == s))
            .filter(|d| req.service_type.map_or(true, |s| d.service_type == s))
            .filter(|d| {
                let Some(needle) = &needle else {
                    return true;
                };
                let customer = customer_names.get(&d.customer_id).map(String::as_str).unwrap_or("");
                [customer, d.pnr.as_str(), d.ticket_no.as_str(), d.route.as_str()]
                    .iter()
                    .any(|field| field.to_lowercase().contains(needle.as_str()))
            })
            .collect();

        dsrs.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        Ok(dsrs)
    }

    /// draft -> submitted. Issues the invoice and, when a supplier is linked,
    /// the supplier bill. Earlier live invoices and bills of the DSR are voided.
    ///
    /// The invoice number is drawn once every check has passed, but outside the
    /// batch: a batch that then fails its guards leaves a gap in the sequence.
    /// Issued numbers still strictly increase within a year.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, dsr_id = %req.id))]
    pub async fn submit_dsr(&self, req: DsrStepRequest) -> Result<SubmitOutcome, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let mut dsr: Dsr = self.load(&req.id).await?;
        let next = plan_dsr_step(&dsr, DsrAction::Submit, &actor)?;

        let issued_at = now();
        let today = issued_at.date_naive();

        let mut batch = Vec::new();

        let mut voided_invoices = Vec::new();
        for old in self.list::<Invoice>().await? {
            if old.dsr_id == dsr.id && old.status == InvoiceStatus::Ready {
                batch.push(Mutation::update(
                    Entity::Invoices,
                    &old.id,
                    patch(json!({ "status": InvoiceStatus::Void.as_str() })),
                    status_is(InvoiceStatus::Ready.as_str()),
                ));
                batch.push(audit(
                    &actor,
                    AuditAction::UpdateInvoiceStatus,
                    format!("Voided invoice {} on resubmission of DSR ({})", old.invoice_no, dsr.id),
                    Some(&old.id),
                )?);
                voided_invoices.push(old.id);
            }
        }
        let mut voided_bills = Vec::new();
        for old in self.list::<SupplierBill>().await? {
            if old.dsr_id == dsr.id && old.status == SupplierBillStatus::Unpaid {
                batch.push(Mutation::update(
                    Entity::SupplierBills,
                    &old.id,
                    patch(json!({ "status": SupplierBillStatus::Void.as_str() })),
                    status_is(SupplierBillStatus::Unpaid.as_str()),
                ));
                voided_bills.push(old.id);
            }
        }

        let subtotal = dsr.selling_fare;
        let vat = dsr.vat_on_commission;
        let total = subtotal + vat;
        let invoice_no = next_invoice_number(self.store(), issued_at.year()).await?;
        let invoice = Invoice {
            id: next_id(Entity::Invoices.id_prefix()),
            invoice_no,
            date: today,
            customer_id: dsr.customer_id.clone(),
            dsr_id: dsr.id.clone(),
            items: vec![InvoiceItem {
                id: "1".to_string(),
                description: dsr.invoice_line_description(),
                qty: 1,
                unit_price: subtotal,
                line_total: subtotal,
            }],
            subtotal,
            vat,
            total,
            status: InvoiceStatus::Ready,
            qr_code_tlv: Some(invoice_tlv(
                &self.settings.seller_name,
                &self.settings.vat_number,
                issued_at,
                total,
                vat,
            )?),
            first_viewed_at: None,
        };
        batch.push(Mutation::insert(&invoice)?);
        batch.push(audit(
            &actor,
            AuditAction::CreateInvoice,
            format!("Issued invoice {} for DSR ({})", invoice.invoice_no, dsr.id),
            Some(&invoice.id),
        )?);

        let supplier_bill = match &dsr.supplier_id {
            Some(supplier_id) => {
                let bill = SupplierBill {
                    id: next_id(Entity::SupplierBills.id_prefix()),
                    bill_no: dsr.bill_no(),
                    supplier_id: supplier_id.clone(),
                    dsr_id: dsr.id.clone(),
                    date: today,
                    total: dsr.net_fare,
                    status: SupplierBillStatus::Unpaid,
                };
                batch.push(Mutation::insert(&bill)?);
                Some(bill)
            }
            None => None,
        };

        let remarks = "Submitted for approval.";
        batch.extend(step_mutations(
            &actor,
            &dsr,
            next,
            Some(remarks),
            format!("Submitted DSR ({}) for approval. Status changed to {}", dsr.id, next),
        )?);
        self.commit("submit_dsr", batch).await?;

        DSR_TRANSITIONS_TOTAL
            .with_label_values(&[DsrAction::Submit.as_str()])
            .inc();
        INVOICES_TOTAL
            .with_label_values(&[InvoiceStatus::Ready.as_str()])
            .inc();
        info!(
            dsr_id = %dsr.id,
            invoice_no = %invoice.invoice_no,
            voided = voided_invoices.len(),
            "DSR submitted"
        );

        dsr.status = next;
        dsr.remarks = Some(remarks.to_string());
        Ok(SubmitOutcome {
            dsr,
            invoice,
            supplier_bill,
            voided_invoices,
            voided_bills,
        })
    }

    /// submitted -> approved.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, dsr_id = %req.id))]
    pub async fn approve_dsr(&self, req: DsrStepRequest) -> Result<Dsr, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let dsr: Dsr = self.load(&req.id).await?;
        let next = plan_dsr_step(&dsr, DsrAction::Approve, &actor)?;
        let details = format!("Approved DSR ({}). Status changed to {}", dsr.id, next);
        self.finish_step(&actor, dsr, DsrAction::Approve, next, Some("DSR Approved."), details)
            .await
    }

    /// submitted -> draft, keeping the reason as the DSR's remark.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, dsr_id = %req.id))]
    pub async fn reject_dsr(&self, req: DsrStepRequest) -> Result<Dsr, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let dsr: Dsr = self.load(&req.id).await?;
        let next = plan_dsr_step(&dsr, DsrAction::Reject, &actor)?;
        let reason = non_empty(req.remark).ok_or(WorkflowError::MissingRemark)?;
        let details = format!(
            "Rejected DSR ({}). Status changed to {}. Reason: {}",
            dsr.id, next, reason
        );
        self.finish_step(&actor, dsr, DsrAction::Reject, next, Some(reason.as_str()), details)
            .await
    }

    /// approved -> posted.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, dsr_id = %req.id))]
    pub async fn post_dsr(&self, req: DsrStepRequest) -> Result<Dsr, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let dsr: Dsr = self.load(&req.id).await?;
        let next = plan_dsr_step(&dsr, DsrAction::Post, &actor)?;
        let details = format!("Posted DSR ({}). Status changed to {}", dsr.id, next);
        self.finish_step(&actor, dsr, DsrAction::Post, next, None, details)
            .await
    }

    /// Managers delete DSRs that are not posted; the rest are reported as skipped.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, count = req.ids.len()))]
    pub async fn bulk_delete_dsrs(&self, req: IdsRequest) -> Result<BulkOutcome, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_manager, "delete DSRs")?;

        let mut batch = Vec::new();
        let mut outcome = BulkOutcome {
            affected: Vec::new(),
            skipped: Vec::new(),
        };
        for id in req.ids {
            match self.find::<Dsr>(&id).await? {
                Some(dsr) if dsr.status != DsrStatus::Posted => {
                    batch.push(Mutation::delete(Entity::Dsrs, &id, deletable(Entity::Dsrs)));
                    batch.push(audit(
                        &actor,
                        AuditAction::DeleteDsr,
                        format!("Deleted DSR ({}) for PNR {}", dsr.id, dsr.pnr),
                        Some(&dsr.id),
                    )?);
                    outcome.affected.push(id);
                }
                _ => outcome.skipped.push(id),
            }
        }
        if !batch.is_empty() {
            self.commit("bulk_delete_dsrs", batch).await?;
        }
        info!(deleted = outcome.affected.len(), skipped = outcome.skipped.len(), "DSRs deleted");
        Ok(outcome)
    }

    async fn finish_step(
        &self,
        actor: &User,
        mut dsr: Dsr,
        action: DsrAction,
        next: DsrStatus,
        remarks: Option<&str>,
        details: String,
    ) -> Result<Dsr, AppError> {
        let batch = step_mutations(actor, &dsr, next, remarks, details)?;
        self.commit(action.as_str(), batch).await?;

        DSR_TRANSITIONS_TOTAL.with_label_values(&[action.as_str()]).inc();
        info!(dsr_id = %dsr.id, from = %dsr.status, to = %next, "DSR status changed");

        dsr.status = next;
        if let Some(remarks) = remarks {
            dsr.remarks = Some(remarks.to_string());
        }
        Ok(dsr)
    }
}

/// Status write guarded on the status the step was planned from, plus its audit entry.
pub(super) fn step_mutations(
    actor: &User,
    dsr: &Dsr,
    next: DsrStatus,
    remarks: Option<&str>,
    details: String,
) -> Result<Vec<Mutation>, AppError> {
    let mut changes = patch(json!({ "status": next.as_str() }));
    if let Some(remarks) = remarks {
        changes.insert("remarks".to_string(), remarks.into());
    }
    Ok(vec![
        Mutation::update(Entity::Dsrs, &dsr.id, changes, status_is(dsr.status.as_str())),
        audit(actor, AuditAction::UpdateDsrStatus, details, Some(&dsr.id))?,
    ])
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Digits only, so `+966 50 123 4567` and `+966501234567` match.
fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers_compare_by_digits() {
        assert_eq!(normalize_phone("+966 50 123 4567"), normalize_phone("966-50-1234567"));
    }

    #[test]
    fn blank_optional_ids_are_dropped() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" SUP-1 ".to_string())), Some("SUP-1".to_string()));
    }
}
