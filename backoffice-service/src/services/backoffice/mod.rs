//! The back-office application service.
//!
//! [`BackOffice`] owns the repository handle and the workflow settings and
//! exposes one method per RPC action. Every command reads what it needs,
//! decides with the pure rules in [`crate::services::workflow`] and
//! [`crate::services::fares`], then writes all of its records, audit entry
//! included, as one guarded [`Mutation`] batch.

mod cash;
mod dsrs;
mod hr;
mod invoices;
mod parties;
mod records;
mod reporting;
mod tasks;

pub use dsrs::SubmitOutcome;

use crate::models::{AuditAction, AuditLogEntry, Entity, EntityRecord, Record, User};
use crate::services::ids::{next_id, now};
use crate::store::{Mutation, Precondition, Repository};
use serde_json::Value;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SELLER_NAME: &str = "ARWA TRAVEL & EVENTS";
pub const DEFAULT_VAT_NUMBER: &str = "310263881300003";

/// Business settings that shape the workflow.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub seller_name: String,
    pub vat_number: String,
    /// Acknowledging an invoice forces its DSR to `posted`.
    pub lock_dsr_on_invoice_ack: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            seller_name: DEFAULT_SELLER_NAME.to_string(),
            vat_number: DEFAULT_VAT_NUMBER.to_string(),
            lock_dsr_on_invoice_ack: true,
        }
    }
}

#[derive(Clone)]
pub struct BackOffice {
    store: Arc<dyn Repository>,
    settings: Arc<WorkflowSettings>,
}

impl BackOffice {
    pub fn new(store: Arc<dyn Repository>, settings: WorkflowSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &dyn Repository {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Resolves the acting user of a typed command.
    async fn actor(&self, actor_id: &str) -> Result<User, AppError> {
        let actor_id = actor_id.trim();
        if actor_id.is_empty() {
            return Err(AppError::Unauthorized(anyhow::anyhow!("actorId is required")));
        }
        self.find::<User>(actor_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unknown user '{}'", actor_id)))
    }

    async fn find<T: EntityRecord>(&self, id: &str) -> Result<Option<T>, AppError> {
        self.store
            .get(T::ENTITY, id)
            .await?
            .map(T::from_record)
            .transpose()
    }

    async fn load<T: EntityRecord>(&self, id: &str) -> Result<T, AppError> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("{} '{}' not found", T::ENTITY, id)))
    }

    async fn list<T: EntityRecord>(&self) -> Result<Vec<T>, AppError> {
        self.store
            .get_all(T::ENTITY)
            .await?
            .into_iter()
            .map(T::from_record)
            .collect()
    }

    async fn commit(&self, step: &str, batch: Vec<Mutation>) -> Result<(), AppError> {
        debug!(step, mutations = batch.len(), "Applying batch");
        self.store.apply(batch).await
    }
}

/// Audit entry written inside the batch of the command it describes.
fn audit(
    actor: &User,
    action: AuditAction,
    details: impl Into<String>,
    target_id: Option<&str>,
) -> Result<Mutation, AppError> {
    Mutation::insert(&AuditLogEntry {
        id: next_id(Entity::AuditLog.id_prefix()),
        timestamp: now(),
        user_id: actor.id.clone(),
        user_name: actor.name.clone(),
        action,
        details: details.into(),
        target_id: target_id.map(str::to_string),
    })
}

/// Turns a `json!({...})` literal into a patch.
fn patch(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn status_is(status: &str) -> Option<Precondition> {
    Some(Precondition::field_is("status", status))
}
