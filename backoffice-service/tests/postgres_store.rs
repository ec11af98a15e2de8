//! PostgreSQL adapter tests. They need a scratch database in
//! `TEST_DATABASE_URL` and return early without one.

use backoffice_service::models::{Entity, Record};
use backoffice_service::store::{InvoiceSequence, Mutation, PgStore, Precondition, RecordUpdate, Repository};
use serde_json::{json, Value};
use uuid::Uuid;

async fn store() -> Option<PgStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let store = PgStore::connect(&url, 2, 1)
        .await
        .expect("Failed to connect to TEST_DATABASE_URL");
    store.run_migrations().await.expect("Failed to run migrations");
    Some(store)
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

#[tokio::test]
async fn records_round_trip_in_camel_case() {
    let Some(store) = store().await else {
        return;
    };
    let id = unique("SUP");

    store
        .add(
            Entity::SupplierBills,
            record(json!({ "id": id, "billNo": "B-1", "supplierId": "SUP-1", "dsrId": "DSR-1", "total": 10.5, "status": "unpaid" })),
        )
        .await
        .unwrap();

    let stored = store.get(Entity::SupplierBills, &id).await.unwrap().unwrap();
    assert_eq!(stored["billNo"], "B-1");
    assert_eq!(stored["supplierId"], "SUP-1");

    let raw: Value = sqlx::query_scalar("SELECT data FROM records WHERE entity = $1 AND id = $2")
        .bind("supplier_bills")
        .bind(&id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(raw["bill_no"], "B-1");

    store.bulk_delete(Entity::SupplierBills, &[id]).await.unwrap();
}

#[tokio::test]
async fn update_merges_and_counts() {
    let Some(store) = store().await else {
        return;
    };
    let a = unique("TASK");
    let b = unique("TASK");
    for id in [&a, &b] {
        store
            .add(Entity::Tasks, record(json!({ "id": id, "title": "t", "status": "todo" })))
            .await
            .unwrap();
    }

    let updated = store
        .update(Entity::Tasks, &a, record(json!({ "status": "done", "id": "hijack" })))
        .await
        .unwrap();
    assert_eq!(updated["id"], a.as_str());
    assert_eq!(updated["title"], "t");
    assert_eq!(updated["status"], "done");

    let changed = store
        .bulk_update(
            Entity::Tasks,
            vec![
                RecordUpdate { id: a.clone(), data: record(json!({ "priority": "high" })) },
                RecordUpdate { id: unique("TASK"), data: record(json!({ "priority": "high" })) },
            ],
        )
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let deleted = store.bulk_delete(Entity::Tasks, &[a, b]).await.unwrap();
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn failed_precondition_rolls_back_the_batch() {
    let Some(store) = store().await else {
        return;
    };
    let dsr = unique("DSR");
    let log = unique("LOG");
    store
        .add(Entity::Dsrs, record(json!({ "id": dsr, "status": "submitted" })))
        .await
        .unwrap();

    let err = store
        .apply(vec![
            Mutation::Insert {
                entity: Entity::AuditLog,
                record: record(json!({ "id": log, "action": "UPDATE_DSR_STATUS" })),
            },
            Mutation::update(
                Entity::Dsrs,
                &dsr,
                record(json!({ "status": "approved" })),
                Some(Precondition::field_is("status", "draft")),
            ),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, service_core::error::AppError::Conflict(_)));

    assert!(store.get(Entity::AuditLog, &log).await.unwrap().is_none());
    let current = store.get(Entity::Dsrs, &dsr).await.unwrap().unwrap();
    assert_eq!(current["status"], "submitted");

    store
        .apply(vec![Mutation::update(
            Entity::Dsrs,
            &dsr,
            record(json!({ "status": "approved" })),
            Some(Precondition::field_is("status", "submitted")),
        )])
        .await
        .unwrap();
    let current = store.get(Entity::Dsrs, &dsr).await.unwrap().unwrap();
    assert_eq!(current["status"], "approved");

    store.bulk_delete(Entity::Dsrs, &[dsr]).await.unwrap();
}

#[tokio::test]
async fn invoice_counter_resets_on_a_new_year() {
    let Some(store) = store().await else {
        return;
    };

    store
        .set_invoice_sequence(InvoiceSequence { year: 2091, counter: 41 })
        .await
        .unwrap();
    let next = store.next_invoice_sequence(2091).await.unwrap();
    assert_eq!(next, InvoiceSequence { year: 2091, counter: 42 });
    let next = store.next_invoice_sequence(2092).await.unwrap();
    assert_eq!(next, InvoiceSequence { year: 2092, counter: 1 });
}
