//! Backend-agnostic record storage.
//!
//! Every adapter stores flat camelCase records per [`Entity`] and applies
//! [`Mutation`] batches atomically: either every mutation of a batch is
//! written or none is.

mod case;
mod memory;
mod postgres;

pub use case::{camel_to_snake, convert_keys, snake_to_camel};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{Entity, EntityRecord, Record};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;

/// Guard evaluated against the current stored record before an update or delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    pub field: String,
    /// The stored value must equal one of these; a missing field reads as `null`.
    pub one_of: Vec<Value>,
}

impl Precondition {
    pub fn field_is(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            one_of: vec![value.into()],
        }
    }

    pub fn field_in<V: Into<Value> + Clone>(field: &str, values: &[V]) -> Self {
        Self {
            field: field.to_string(),
            one_of: values.iter().cloned().map(Into::into).collect(),
        }
    }

    pub fn holds(&self, record: &Record) -> bool {
        let current = record.get(&self.field).unwrap_or(&Value::Null);
        self.one_of.contains(current)
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Fails with a conflict if the id already exists.
    Insert { entity: Entity, record: Record },
    /// Shallow merge. Fails if the record is missing or the guard does not hold.
    Update {
        entity: Entity,
        id: String,
        patch: Record,
        guard: Option<Precondition>,
    },
    /// A missing record is skipped; a failing guard aborts the batch.
    Delete {
        entity: Entity,
        id: String,
        guard: Option<Precondition>,
    },
}

impl Mutation {
    pub fn insert<T: EntityRecord>(model: &T) -> Result<Self, AppError> {
        Ok(Mutation::Insert {
            entity: T::ENTITY,
            record: model.to_record()?,
        })
    }

    pub fn update(entity: Entity, id: &str, patch: Record, guard: Option<Precondition>) -> Self {
        Mutation::Update {
            entity,
            id: id.to_string(),
            patch,
            guard,
        }
    }

    pub fn delete(entity: Entity, id: &str, guard: Option<Precondition>) -> Self {
        Mutation::Delete {
            entity,
            id: id.to_string(),
            guard,
        }
    }
}

/// One entry of a bulk update: the record id and the fields to merge.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordUpdate {
    pub id: String,
    #[serde(default)]
    pub data: Record,
}

/// Year and counter of the last issued invoice number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceSequence {
    pub year: i32,
    pub counter: u32,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Backend name, as configured.
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), AppError>;

    /// Records in insertion order.
    async fn get_all(&self, entity: Entity) -> Result<Vec<Record>, AppError>;

    async fn get(&self, entity: Entity, id: &str) -> Result<Option<Record>, AppError>;

    /// Inserts a record that already carries its `id`.
    async fn add(&self, entity: Entity, record: Record) -> Result<Record, AppError>;

    /// Shallow-merges `patch` into the record. The `id` key is never changed.
    async fn update(&self, entity: Entity, id: &str, patch: Record) -> Result<Record, AppError>;

    /// Returns the number of records removed.
    async fn bulk_delete(&self, entity: Entity, ids: &[String]) -> Result<u64, AppError>;

    /// Merges each patch into its record; missing ids are skipped. Returns the
    /// number of records changed.
    async fn bulk_update(&self, entity: Entity, updates: Vec<RecordUpdate>) -> Result<u64, AppError>;

    /// Applies every mutation or none.
    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), AppError>;

    /// Advances the invoice counter for `year`: +1 within the same year, 1 on a new year.
    async fn next_invoice_sequence(&self, year: i32) -> Result<InvoiceSequence, AppError>;

    /// Overwrites the invoice counter. Used when seeding demo data.
    async fn set_invoice_sequence(&self, sequence: InvoiceSequence) -> Result<(), AppError>;
}

pub(crate) fn without_id(mut patch: Record) -> Record {
    patch.remove("id");
    patch
}

pub(crate) fn record_id(entity: Entity, record: &Record) -> Result<String, AppError> {
    match record.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(AppError::BadRequest(anyhow::anyhow!(
            "{} record is missing a string id",
            entity
        ))),
    }
}

pub(crate) fn not_found(entity: Entity, id: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} record '{}' not found", entity, id))
}

pub(crate) fn guard_failed(entity: Entity, id: &str, guard: &Precondition) -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "{} record '{}' changed concurrently: expected {} to be one of {:?}",
        entity,
        id,
        guard.field,
        guard.one_of
    ))
}

/// Next counter value given the stored sequence.
pub(crate) fn advance(current: Option<InvoiceSequence>, year: i32) -> InvoiceSequence {
    match current {
        Some(seq) if seq.year == year => InvoiceSequence {
            year,
            counter: seq.counter + 1,
        },
        _ => InvoiceSequence { year, counter: 1 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn precondition_treats_missing_field_as_null() {
        let record: Record = serde_json::from_value(json!({ "id": "INV-1" })).unwrap();
        assert!(Precondition::field_is("firstViewedAt", Value::Null).holds(&record));
        assert!(!Precondition::field_is("status", "ready").holds(&record));
    }

    #[test]
    fn precondition_matches_any_allowed_value() {
        let record: Record = serde_json::from_value(json!({ "status": "approved" })).unwrap();
        let guard = Precondition::field_in("status", &["draft", "submitted", "approved"]);
        assert!(guard.holds(&record));
        assert!(!Precondition::field_is("status", "posted").holds(&record));
    }

    #[test]
    fn sequence_resets_on_new_year() {
        let last = Some(InvoiceSequence {
            year: 2024,
            counter: 41,
        });
        assert_eq!(advance(last, 2024).counter, 42);
        assert_eq!(
            advance(last, 2025),
            InvoiceSequence {
                year: 2025,
                counter: 1
            }
        );
        assert_eq!(advance(None, 2025).counter, 1);
    }
}
