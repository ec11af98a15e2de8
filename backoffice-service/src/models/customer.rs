//! Customers, suppliers and travelers.

use super::{Entity, EntityRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    Individual,
    Corporate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type")]
    pub customer_type: CustomerType,
    /// Changed only when invoices are marked paid.
    #[serde(default)]
    pub total_spend: Decimal,
}

impl EntityRecord for Customer {
    const ENTITY: Entity = Entity::Customers;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierType {
    Airline,
    Hotelier,
    Gds,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "type")]
    pub supplier_type: SupplierType,
}

impl EntityRecord for Supplier {
    const ENTITY: Entity = Entity::Suppliers;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Traveler {
    pub id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub passport_no: String,
    #[serde(default)]
    pub nationality: String,
    pub customer_id: String,
}

impl EntityRecord for Traveler {
    const ENTITY: Entity = Entity::Travelers;

    fn id(&self) -> &str {
        &self.id
    }
}
