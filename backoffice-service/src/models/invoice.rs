//! Customer invoices and supplier bills.

use super::{Entity, EntityRecord};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Ready,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Ready => "ready",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: String,
    pub description: String,
    pub qty: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_no: String,
    pub date: NaiveDate,
    pub customer_id: String,
    pub dsr_id: String,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_tlv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_viewed_at: Option<DateTime<Utc>>,
}

impl EntityRecord for Invoice {
    const ENTITY: Entity = Entity::Invoices;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierBillStatus {
    Unpaid,
    Paid,
    Void,
}

impl SupplierBillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierBillStatus::Unpaid => "unpaid",
            SupplierBillStatus::Paid => "paid",
            SupplierBillStatus::Void => "void",
        }
    }
}

impl fmt::Display for SupplierBillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupplierBill {
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub bill_no: String,
    pub supplier_id: String,
    #[serde(default)]
    pub dsr_id: String,
    pub date: NaiveDate,
    pub total: Decimal,
    pub status: SupplierBillStatus,
}

impl EntityRecord for SupplierBill {
    const ENTITY: Entity = Entity::SupplierBills;

    fn id(&self) -> &str {
        &self.id
    }
}
