//! Invoice and supplier-bill commands, plus the ZATCA QR views.

use super::records::deletable;
use super::{audit, patch, status_is, BackOffice};
use crate::dtos::{
    AddSupplierBillRequest, BillStatusRequest, BulkOutcome, GetInvoiceRequest, IdRequest,
    IdsRequest, QrPayload, ZatcaPreviewRequest,
};
use crate::models::{
    AuditAction, Customer, Dsr, DsrStatus, Entity, Invoice, InvoiceStatus, Record, Role, Supplier,
    SupplierBill, SupplierBillStatus,
};
use crate::services::ids::{next_id, now};
use crate::services::metrics::{DSR_TRANSITIONS_TOTAL, INVOICES_TOTAL};
use crate::services::workflow::{bill_transition, invoice_transition, require_role, InvoiceAction};
use crate::services::zatca::{
    format_amount, format_timestamp, generate_tlv_base64, invoice_tlv, render_qr_png_base64,
};
use crate::store::{Mutation, Precondition};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::error::AppError;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};
use validator::Validate;

/// DSR statuses under which invoices and supplier bills may be paid.
const SETTLEABLE: [DsrStatus; 2] = [DsrStatus::Approved, DsrStatus::Posted];

impl BackOffice {
    /// Reads an invoice. Never changes anything.
    pub async fn get_invoice(&self, req: GetInvoiceRequest) -> Result<Invoice, AppError> {
        self.load(&req.id).await
    }

    /// Stamps `firstViewedAt` the first time finance opens the invoice and,
    /// when configured, locks the DSR by posting it.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, invoice_id = %req.id))]
    pub async fn acknowledge_invoice(&self, req: IdRequest) -> Result<Invoice, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "acknowledge invoices")?;

        let mut invoice: Invoice = self.load(&req.id).await?;
        if invoice.first_viewed_at.is_some() {
            return Ok(invoice);
        }

        let viewed_at = now();
        let mut batch = vec![
            Mutation::update(
                Entity::Invoices,
                &invoice.id,
                patch(json!({ "firstViewedAt": viewed_at })),
                Some(Precondition::field_is("firstViewedAt", Value::Null)),
            ),
            audit(
                &actor,
                AuditAction::UpdateInvoiceStatus,
                format!("Acknowledged invoice {}", invoice.invoice_no),
                Some(&invoice.id),
            )?,
        ];

        let mut locked = false;
        // A voided invoice belongs to an earlier submission and must not post the live one.
        if self.settings.lock_dsr_on_invoice_ack && invoice.status != InvoiceStatus::Void {
            match self.find::<Dsr>(&invoice.dsr_id).await? {
                Some(dsr) if dsr.status != DsrStatus::Posted => {
                    batch.push(Mutation::update(
                        Entity::Dsrs,
                        &dsr.id,
                        patch(json!({ "status": DsrStatus::Posted.as_str() })),
                        status_is(dsr.status.as_str()),
                    ));
                    batch.push(audit(
                        &actor,
                        AuditAction::UpdateDsrStatus,
                        format!(
                            "Locked DSR ({}) on acknowledgement of invoice {}. Status changed to {}",
                            dsr.id,
                            invoice.invoice_no,
                            DsrStatus::Posted
                        ),
                        Some(&dsr.id),
                    )?);
                    locked = true;
                }
                Some(_) => {}
                None => warn!(dsr_id = %invoice.dsr_id, "Invoice references a missing DSR"),
            }
        }

        if let Err(err) = self.commit("acknowledge_invoice", batch).await {
            // A concurrent acknowledgement already stamped it.
            if matches!(err, AppError::Conflict(_)) {
                let current: Invoice = self.load(&req.id).await?;
                if current.first_viewed_at.is_some() {
                    return Ok(current);
                }
            }
            return Err(err);
        }

        if locked {
            DSR_TRANSITIONS_TOTAL.with_label_values(&["acknowledge"]).inc();
        }
        info!(invoice_no = %invoice.invoice_no, locked, "Invoice acknowledged");
        invoice.first_viewed_at = Some(viewed_at);
        Ok(invoice)
    }

    /// ready -> paid, adding the total to the customer's spend.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, invoice_id = %req.id))]
    pub async fn mark_invoice_paid(&self, req: IdRequest) -> Result<Invoice, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "mark invoices paid")?;

        let mut invoice: Invoice = self.load(&req.id).await?;
        let next = invoice_transition(invoice.status, InvoiceAction::MarkPaid)?;
        let settle = self.settlement_guard(&invoice.dsr_id, "invoice", &invoice.invoice_no).await?;

        let mut batch = vec![
            Mutation::update(
                Entity::Invoices,
                &invoice.id,
                patch(json!({ "status": next.as_str() })),
                status_is(invoice.status.as_str()),
            ),
            audit(
                &actor,
                AuditAction::UpdateInvoiceStatus,
                format!("Marked invoice {} as paid.", invoice.invoice_no),
                Some(&invoice.id),
            )?,
        ];
        batch.extend(settle);
        batch.extend(
            self.spend_updates(BTreeMap::from([(invoice.customer_id.clone(), invoice.total)]))
                .await?,
        );
        self.commit("mark_invoice_paid", batch).await?;

        INVOICES_TOTAL.with_label_values(&[next.as_str()]).inc();
        info!(invoice_no = %invoice.invoice_no, total = %invoice.total, "Invoice paid");
        invoice.status = next;
        Ok(invoice)
    }

    /// Marks every listed `ready` invoice paid in one batch; others are skipped.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, count = req.ids.len()))]
    pub async fn bulk_mark_invoices_paid(&self, req: IdsRequest) -> Result<BulkOutcome, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "mark invoices paid")?;

        let mut batch = Vec::new();
        let mut spend: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut outcome = BulkOutcome {
            affected: Vec::new(),
            skipped: Vec::new(),
        };
        for id in req.ids {
            let invoice = match self.find::<Invoice>(&id).await? {
                Some(invoice) if invoice.status == InvoiceStatus::Ready => invoice,
                _ => {
                    outcome.skipped.push(id);
                    continue;
                }
            };
            match self.settlement_guard(&invoice.dsr_id, "invoice", &invoice.invoice_no).await {
                Ok(settle) => {
                    batch.extend(settle);
                    batch.push(Mutation::update(
                        Entity::Invoices,
                        &invoice.id,
                        patch(json!({ "status": InvoiceStatus::Paid.as_str() })),
                        status_is(InvoiceStatus::Ready.as_str()),
                    ));
                    *spend.entry(invoice.customer_id).or_default() += invoice.total;
                    outcome.affected.push(id);
                }
                Err(AppError::Conflict(_)) => outcome.skipped.push(id),
                Err(e) => return Err(e),
            }
        }
        if outcome.affected.is_empty() {
            return Ok(outcome);
        }

        batch.extend(self.spend_updates(spend).await?);
        batch.push(audit(
            &actor,
            AuditAction::UpdateInvoiceStatus,
            format!("Bulk marked {} invoices as paid.", outcome.affected.len()),
            None,
        )?);
        self.commit("bulk_mark_invoices_paid", batch).await?;

        INVOICES_TOTAL
            .with_label_values(&[InvoiceStatus::Paid.as_str()])
            .inc_by(outcome.affected.len() as f64);
        Ok(outcome)
    }

    /// ready -> void. Paid invoices stay paid.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, invoice_id = %req.id))]
    pub async fn void_invoice(&self, req: IdRequest) -> Result<Invoice, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "void invoices")?;

        let mut invoice: Invoice = self.load(&req.id).await?;
        let next = invoice_transition(invoice.status, InvoiceAction::Void)?;
        self.commit(
            "void_invoice",
            vec![
                Mutation::update(
                    Entity::Invoices,
                    &invoice.id,
                    patch(json!({ "status": next.as_str() })),
                    status_is(invoice.status.as_str()),
                ),
                audit(
                    &actor,
                    AuditAction::UpdateInvoiceStatus,
                    format!("Voided invoice {}.", invoice.invoice_no),
                    Some(&invoice.id),
                )?,
            ],
        )
        .await?;

        INVOICES_TOTAL.with_label_values(&[next.as_str()]).inc();
        invoice.status = next;
        Ok(invoice)
    }

    /// Deletes invoices that are not paid; paid ones are reported as skipped.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, count = req.ids.len()))]
    pub async fn bulk_delete_invoices(&self, req: IdsRequest) -> Result<BulkOutcome, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "delete invoices")?;

        let mut batch = Vec::new();
        let mut outcome = BulkOutcome {
            affected: Vec::new(),
            skipped: Vec::new(),
        };
        for id in req.ids {
            match self.find::<Invoice>(&id).await? {
                Some(invoice) if invoice.status != InvoiceStatus::Paid => {
                    batch.push(Mutation::delete(Entity::Invoices, &id, deletable(Entity::Invoices)));
                    batch.push(audit(
                        &actor,
                        AuditAction::DeleteInvoice,
                        format!("Deleted invoice {}.", invoice.invoice_no),
                        Some(&invoice.id),
                    )?);
                    outcome.affected.push(id);
                }
                _ => outcome.skipped.push(id),
            }
        }
        if !batch.is_empty() {
            self.commit("bulk_delete_invoices", batch).await?;
        }
        Ok(outcome)
    }

    /// The invoice's TLV payload rendered as a QR code.
    pub async fn invoice_qr(&self, req: GetInvoiceRequest) -> Result<QrPayload, AppError> {
        let invoice: Invoice = self.load(&req.id).await?;
        let tlv = match invoice.qr_code_tlv.clone() {
            Some(tlv) => tlv,
            // Seeded invoices carry no payload; use the start of the invoice day.
            None => invoice_tlv(
                &self.settings.seller_name,
                &self.settings.vat_number,
                invoice.date.and_time(NaiveTime::MIN).and_utc(),
                invoice.total,
                invoice.vat,
            )?,
        };
        let qr_png_base64 = render_qr_png_base64(&tlv)?;
        Ok(QrPayload {
            invoice_id: Some(invoice.id),
            invoice_no: Some(invoice.invoice_no),
            tlv_base64: tlv,
            qr_png_base64,
        })
    }

    /// TLV payload and QR code for arbitrary values, defaulting to the configured seller.
    pub fn zatca_preview(&self, req: ZatcaPreviewRequest) -> Result<QrPayload, AppError> {
        let seller_name = req
            .seller_name
            .unwrap_or_else(|| self.settings.seller_name.clone());
        let vat_number = req
            .vat_number
            .unwrap_or_else(|| self.settings.vat_number.clone());
        let timestamp = req.timestamp.unwrap_or_else(|| format_timestamp(now()));

        let tlv = generate_tlv_base64(
            &seller_name,
            &vat_number,
            &timestamp,
            &format_amount(req.invoice_total),
            &format_amount(req.vat_total),
        )?;
        let qr_png_base64 = render_qr_png_base64(&tlv)?;
        Ok(QrPayload {
            invoice_id: None,
            invoice_no: None,
            tlv_base64: tlv,
            qr_png_base64,
        })
    }

    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, bill_no = %req.bill_no))]
    pub async fn add_supplier_bill(&self, req: AddSupplierBillRequest) -> Result<SupplierBill, AppError> {
        req.validate()?;
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "record supplier bills")?;
        if req.total < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!("total must not be negative")));
        }
        self.load::<Supplier>(&req.supplier_id).await?;
        let dsr_id = match req.dsr_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => self.load::<Dsr>(&id).await?.id,
            None => String::new(),
        };

        let bill = SupplierBill {
            id: next_id(Entity::SupplierBills.id_prefix()),
            bill_no: req.bill_no.trim().to_string(),
            supplier_id: req.supplier_id,
            dsr_id,
            date: req.date.unwrap_or_else(|| now().date_naive()),
            total: req.total,
            status: SupplierBillStatus::Unpaid,
        };
        self.commit("add_supplier_bill", vec![Mutation::insert(&bill)?])
            .await?;
        Ok(bill)
    }

    /// unpaid -> paid | void.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, bill_id = %req.id))]
    pub async fn update_supplier_bill_status(
        &self,
        req: BillStatusRequest,
    ) -> Result<SupplierBill, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "change supplier bills")?;

        let mut bill: SupplierBill = self.load(&req.id).await?;
        let next = bill_transition(bill.status, req.status)?;
        let mut batch = vec![Mutation::update(
            Entity::SupplierBills,
            &bill.id,
            patch(json!({ "status": next.as_str() })),
            status_is(bill.status.as_str()),
        )];
        if next == SupplierBillStatus::Paid {
            batch.extend(self.settlement_guard(&bill.dsr_id, "supplier bill", &bill.bill_no).await?);
        }
        self.commit("update_supplier_bill_status", batch).await?;
        bill.status = next;
        Ok(bill)
    }

    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, count = req.ids.len()))]
    pub async fn bulk_mark_supplier_bills_paid(
        &self,
        req: IdsRequest,
    ) -> Result<BulkOutcome, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "change supplier bills")?;

        let mut batch = Vec::new();
        let mut outcome = BulkOutcome {
            affected: Vec::new(),
            skipped: Vec::new(),
        };
        for id in req.ids {
            let bill = match self.find::<SupplierBill>(&id).await? {
                Some(bill) if bill.status == SupplierBillStatus::Unpaid => bill,
                _ => {
                    outcome.skipped.push(id);
                    continue;
                }
            };
            match self.settlement_guard(&bill.dsr_id, "supplier bill", &bill.bill_no).await {
                Ok(settle) => {
                    batch.extend(settle);
                    batch.push(Mutation::update(
                        Entity::SupplierBills,
                        &id,
                        patch(json!({ "status": SupplierBillStatus::Paid.as_str() })),
                        status_is(SupplierBillStatus::Unpaid.as_str()),
                    ));
                    outcome.affected.push(id);
                }
                Err(AppError::Conflict(_)) => outcome.skipped.push(id),
                Err(e) => return Err(e),
            }
        }
        if !batch.is_empty() {
            self.commit("bulk_mark_supplier_bills_paid", batch).await?;
        }
        Ok(outcome)
    }

    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, count = req.ids.len()))]
    pub async fn bulk_delete_supplier_bills(&self, req: IdsRequest) -> Result<u64, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "delete supplier bills")?;
        self.store.bulk_delete(Entity::SupplierBills, &req.ids).await
    }

    /// Settling a document is only allowed once its DSR is approved or posted,
    /// so a rejection can never strand a paid invoice or bill. The returned
    /// no-op update re-checks that status inside the settling batch.
    async fn settlement_guard(
        &self,
        dsr_id: &str,
        kind: &str,
        number: &str,
    ) -> Result<Option<Mutation>, AppError> {
        if dsr_id.is_empty() {
            return Ok(None);
        }
        let Some(dsr) = self.find::<Dsr>(dsr_id).await? else {
            warn!(dsr_id = %dsr_id, "Settling a document whose DSR no longer exists");
            return Ok(None);
        };
        if !SETTLEABLE.contains(&dsr.status) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "cannot settle {} {} while DSR ({}) is {}",
                kind,
                number,
                dsr.id,
                dsr.status
            )));
        }
        let allowed: Vec<&str> = SETTLEABLE.iter().map(DsrStatus::as_str).collect();
        Ok(Some(Mutation::update(
            Entity::Dsrs,
            &dsr.id,
            Record::new(),
            Some(Precondition::field_in("status", allowed.as_slice())),
        )))
    }

    /// `totalSpend` increments, each guarded on the value it was computed from.
    async fn spend_updates(
        &self,
        spend: BTreeMap<String, Decimal>,
    ) -> Result<Vec<Mutation>, AppError> {
        let mut updates = Vec::new();
        for (customer_id, amount) in spend {
            let Some(customer) = self.find::<Customer>(&customer_id).await? else {
                warn!(customer_id = %customer_id, "Paid invoice references a missing customer");
                continue;
            };
            let current = serde_json::to_value(customer.total_spend)?;
            updates.push(Mutation::update(
                Entity::Customers,
                &customer.id,
                patch(json!({ "totalSpend": customer.total_spend + amount })),
                Some(Precondition {
                    field: "totalSpend".to_string(),
                    one_of: vec![current],
                }),
            ));
        }
        Ok(updates)
    }
}
