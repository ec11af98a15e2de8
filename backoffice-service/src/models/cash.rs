//! Cash handovers from agents to managers.

use super::{Entity, EntityRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoverStatus {
    Pending,
    Confirmed,
}

impl HandoverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoverStatus::Pending => "pending",
            HandoverStatus::Confirmed => "confirmed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashHandover {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
    pub amount: Decimal,
    pub date_initiated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_confirmed: Option<DateTime<Utc>>,
    pub status: HandoverStatus,
}

impl EntityRecord for CashHandover {
    const ENTITY: Entity = Entity::CashHandovers;

    fn id(&self) -> &str {
        &self.id
    }
}
