//! In-process store for demo mode and tests.

use super::{
    advance, guard_failed, not_found, record_id, without_id, InvoiceSequence, Mutation,
    RecordUpdate, Repository,
};
use crate::models::{Entity, Record};
use crate::services::metrics::STORE_OPERATION_DURATION;
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<Entity, Vec<Record>>,
    sequence: Option<InvoiceSequence>,
}

/// Writers are serialised by the lock; batches are staged on copies of the
/// touched tables and swapped in only when every mutation succeeded.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn merge(target: &mut Record, patch: Record) {
    for (key, value) in without_id(patch) {
        target.insert(key, value);
    }
}

fn position(table: &[Record], id: &str) -> Option<usize> {
    table
        .iter()
        .position(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
}

fn apply_one(table: &mut Vec<Record>, mutation: Mutation) -> Result<(), AppError> {
    match mutation {
        Mutation::Insert { entity, record } => {
            let id = record_id(entity, &record)?;
            if position(table, &id).is_some() {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "{} record '{}' already exists",
                    entity,
                    id
                )));
            }
            table.push(record);
        }
        Mutation::Update {
            entity,
            id,
            patch,
            guard,
        } => {
            let pos = position(table, &id).ok_or_else(|| not_found(entity, &id))?;
            if let Some(guard) = guard {
                if !guard.holds(&table[pos]) {
                    return Err(guard_failed(entity, &id, &guard));
                }
            }
            merge(&mut table[pos], patch);
        }
        Mutation::Delete { entity, id, guard } => {
            if let Some(pos) = position(table, &id) {
                if let Some(guard) = guard {
                    if !guard.holds(&table[pos]) {
                        return Err(guard_failed(entity, &id, &guard));
                    }
                }
                table.remove(pos);
            }
        }
    }
    Ok(())
}

fn entity_of(mutation: &Mutation) -> Entity {
    match mutation {
        Mutation::Insert { entity, .. }
        | Mutation::Update { entity, .. }
        | Mutation::Delete { entity, .. } => *entity,
    }
}

#[async_trait]
impl Repository for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let _guard = self.inner.read().await;
        Ok(())
    }

    #[instrument(skip(self), fields(entity = %entity))]
    async fn get_all(&self, entity: Entity) -> Result<Vec<Record>, AppError> {
        let tables = self.inner.read().await;
        Ok(tables.records.get(&entity).cloned().unwrap_or_default())
    }

    #[instrument(skip(self), fields(entity = %entity))]
    async fn get(&self, entity: Entity, id: &str) -> Result<Option<Record>, AppError> {
        let tables = self.inner.read().await;
        Ok(tables
            .records
            .get(&entity)
            .and_then(|table| position(table, id).map(|pos| table[pos].clone())))
    }

    #[instrument(skip(self, record), fields(entity = %entity))]
    async fn add(&self, entity: Entity, record: Record) -> Result<Record, AppError> {
        self.apply(vec![Mutation::Insert {
            entity,
            record: record.clone(),
        }])
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, patch), fields(entity = %entity))]
    async fn update(&self, entity: Entity, id: &str, patch: Record) -> Result<Record, AppError> {
        let mut tables = self.inner.write().await;
        let table = tables.records.entry(entity).or_default();
        let pos = position(table, id).ok_or_else(|| not_found(entity, id))?;
        merge(&mut table[pos], patch);
        Ok(table[pos].clone())
    }

    #[instrument(skip(self, ids), fields(entity = %entity, count = ids.len()))]
    async fn bulk_delete(&self, entity: Entity, ids: &[String]) -> Result<u64, AppError> {
        let mut tables = self.inner.write().await;
        let table = tables.records.entry(entity).or_default();
        let before = table.len();
        table.retain(|r| {
            r.get("id")
                .and_then(|v| v.as_str())
                .map_or(true, |id| !ids.iter().any(|x| x == id))
        });
        Ok((before - table.len()) as u64)
    }

    #[instrument(skip(self, updates), fields(entity = %entity, count = updates.len()))]
    async fn bulk_update(&self, entity: Entity, updates: Vec<RecordUpdate>) -> Result<u64, AppError> {
        let mut tables = self.inner.write().await;
        let table = tables.records.entry(entity).or_default();
        let mut changed = 0;
        for update in updates {
            if let Some(pos) = position(table, &update.id) {
                merge(&mut table[pos], update.data);
                changed += 1;
            }
        }
        Ok(changed)
    }

    #[instrument(skip(self, batch), fields(mutations = batch.len()))]
    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), AppError> {
        let timer = STORE_OPERATION_DURATION
            .with_label_values(&["memory", "apply"])
            .start_timer();

        let mut tables = self.inner.write().await;
        let mut staged: HashMap<Entity, Vec<Record>> = HashMap::new();

        for mutation in batch {
            let entity = entity_of(&mutation);
            let table = staged
                .entry(entity)
                .or_insert_with(|| tables.records.get(&entity).cloned().unwrap_or_default());
            apply_one(table, mutation)?;
        }

        debug!(tables = staged.len(), "Batch committed");
        tables.records.extend(staged);
        timer.observe_duration();
        Ok(())
    }

    async fn next_invoice_sequence(&self, year: i32) -> Result<InvoiceSequence, AppError> {
        let mut tables = self.inner.write().await;
        let next = advance(tables.sequence, year);
        tables.sequence = Some(next);
        Ok(next)
    }

    async fn set_invoice_sequence(&self, sequence: InvoiceSequence) -> Result<(), AppError> {
        self.inner.write().await.sequence = Some(sequence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Precondition;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn update_merges_and_keeps_id() {
        let store = MemoryStore::new();
        store
            .add(Entity::Tasks, record(json!({ "id": "TASK-1", "title": "a" })))
            .await
            .unwrap();

        let updated = store
            .update(
                Entity::Tasks,
                "TASK-1",
                record(json!({ "id": "TASK-9", "title": "b", "status": "done" })),
            )
            .await
            .unwrap();

        assert_eq!(updated["id"], "TASK-1");
        assert_eq!(updated["title"], "b");
        assert_eq!(updated["status"], "done");
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update(Entity::Tasks, "TASK-404", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_batch_leaves_store_unchanged() {
        let store = MemoryStore::new();
        store
            .add(
                Entity::Dsrs,
                record(json!({ "id": "DSR-1", "status": "submitted" })),
            )
            .await
            .unwrap();

        let err = store
            .apply(vec![
                Mutation::Insert {
                    entity: Entity::AuditLog,
                    record: record(json!({ "id": "LOG-1" })),
                },
                Mutation::update(
                    Entity::Dsrs,
                    "DSR-1",
                    record(json!({ "status": "approved" })),
                    Some(Precondition::field_is("status", "draft")),
                ),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.get_all(Entity::AuditLog).await.unwrap().is_empty());
        let dsr = store.get(Entity::Dsrs, "DSR-1").await.unwrap().unwrap();
        assert_eq!(dsr["status"], "submitted");
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        let r = record(json!({ "id": "CUST-1", "name": "x" }));
        store.add(Entity::Customers, r.clone()).await.unwrap();
        let err = store.add(Entity::Customers, r).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn bulk_operations_report_counts() {
        let store = MemoryStore::new();
        for id in ["A", "B", "C"] {
            store
                .add(Entity::Suppliers, record(json!({ "id": id })))
                .await
                .unwrap();
        }

        let updates: Vec<RecordUpdate> = serde_json::from_value(json!([
            { "id": "A", "data": { "type": "gds" } },
            { "id": "C", "data": { "type": "airline", "id": "X" } },
            { "id": "Z", "data": { "type": "other" } }
        ]))
        .unwrap();
        let changed = store.bulk_update(Entity::Suppliers, updates).await.unwrap();
        assert_eq!(changed, 2);
        let c = store.get(Entity::Suppliers, "C").await.unwrap().unwrap();
        assert_eq!(c["type"], "airline");

        let ids = vec!["A".to_string(), "C".to_string(), "Z".to_string()];

        let removed = store.bulk_delete(Entity::Suppliers, &ids).await.unwrap();
        assert_eq!(removed, 2);
        let left = store.get_all(Entity::Suppliers).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["id"], "B");
    }

    #[tokio::test]
    async fn invoice_sequence_advances_per_year() {
        let store = MemoryStore::new();
        assert_eq!(store.next_invoice_sequence(2024).await.unwrap().counter, 1);
        assert_eq!(store.next_invoice_sequence(2024).await.unwrap().counter, 2);
        assert_eq!(store.next_invoice_sequence(2025).await.unwrap().counter, 1);
    }
}
