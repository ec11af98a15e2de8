//! Daily sales records.

use super::{Entity, EntityRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// DSR lifecycle: draft -> submitted -> approved -> posted, with reject back to draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DsrStatus {
    Draft,
    Submitted,
    Approved,
    Posted,
}

impl DsrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DsrStatus::Draft => "draft",
            DsrStatus::Submitted => "submitted",
            DsrStatus::Approved => "approved",
            DsrStatus::Posted => "posted",
        }
    }
}

impl fmt::Display for DsrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Flight,
    Hotel,
    Visa,
    Other,
}

impl ServiceType {
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Flight,
        ServiceType::Hotel,
        ServiceType::Visa,
        ServiceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Flight => "flight",
            ServiceType::Hotel => "hotel",
            ServiceType::Visa => "visa",
            ServiceType::Other => "other",
        }
    }

    /// Capitalised label used on invoice lines.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Flight => "Flight",
            ServiceType::Hotel => "Hotel",
            ServiceType::Visa => "Visa",
            ServiceType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Credit,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Dsr {
    pub id: String,
    pub date: NaiveDate,
    #[validate(length(min = 1))]
    pub agent_username: String,
    #[serde(default)]
    pub agent_name: String,
    #[validate(length(min = 1))]
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traveler_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<String>,
    pub service_type: ServiceType,
    #[serde(default)]
    pub pnr: String,
    #[serde(default)]
    pub ticket_no: String,
    #[serde(default)]
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    pub base_fare: Decimal,
    #[serde(default)]
    pub taxes: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub net_fare: Decimal,
    #[serde(default)]
    pub selling_fare: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default)]
    pub vat_on_commission: Decimal,
    pub status: DsrStatus,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Dsr {
    /// Supplier bill number: `B-` followed by the PNR, or the last four
    /// characters of the DSR id when there is no PNR.
    pub fn bill_no(&self) -> String {
        let pnr = self.pnr.trim();
        if pnr.is_empty() {
            let chars: Vec<char> = self.id.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            format!("B-{}", tail)
        } else {
            format!("B-{}", pnr)
        }
    }

    /// Description of the single invoice line a submitted DSR produces.
    pub fn invoice_line_description(&self) -> String {
        match self.pnr.trim() {
            "" => format!("{} - {}", self.service_type.label(), self.route),
            pnr => format!("{} - {} (PNR: {})", self.service_type.label(), self.route, pnr),
        }
    }
}

impl EntityRecord for Dsr {
    const ENTITY: Entity = Entity::Dsrs;

    fn id(&self) -> &str {
        &self.id
    }
}
