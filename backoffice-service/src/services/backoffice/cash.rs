//! Cash handovers from agents to managers.

use super::{patch, status_is, BackOffice};
use crate::dtos::{IdRequest, InitiateHandoverRequest};
use crate::models::{CashHandover, Entity, HandoverStatus, Role};
use crate::services::ids::{next_id, now};
use crate::services::workflow::{handover_confirmation, require_role};
use crate::store::Mutation;
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;
use tracing::{info, instrument};

impl BackOffice {
    /// Records cash the acting agent hands over; it stays pending until confirmed.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, amount = %req.amount))]
    pub async fn initiate_handover(&self, req: InitiateHandoverRequest) -> Result<CashHandover, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        if req.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!("amount must be greater than zero")));
        }

        let handover = CashHandover {
            id: next_id(Entity::CashHandovers.id_prefix()),
            agent_id: actor.id,
            agent_name: actor.name,
            manager_id: None,
            manager_name: None,
            amount: req.amount,
            date_initiated: now(),
            date_confirmed: None,
            status: HandoverStatus::Pending,
        };
        self.commit("initiate_handover", vec![Mutation::insert(&handover)?])
            .await?;
        Ok(handover)
    }

    /// pending -> confirmed, stamping the confirming manager.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, handover_id = %req.id))]
    pub async fn confirm_handover(&self, req: IdRequest) -> Result<CashHandover, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "confirm cash handovers")?;

        let mut handover: CashHandover = self.load(&req.id).await?;
        let next = handover_confirmation(handover.status)?;
        let confirmed_at = now();
        self.commit(
            "confirm_handover",
            vec![Mutation::update(
                Entity::CashHandovers,
                &handover.id,
                patch(json!({
                    "status": next.as_str(),
                    "managerId": actor.id,
                    "managerName": actor.name,
                    "dateConfirmed": confirmed_at,
                })),
                status_is(handover.status.as_str()),
            )],
        )
        .await?;

        info!(handover_id = %handover.id, amount = %handover.amount, "Cash handover confirmed");
        handover.status = next;
        handover.manager_id = Some(actor.id);
        handover.manager_name = Some(actor.name);
        handover.date_confirmed = Some(confirmed_at);
        Ok(handover)
    }
}
