//! PostgreSQL store.
//!
//! Records live in one `records` table as JSONB documents keyed by
//! `(entity, id)`, where `entity` is the snake_case table name. Keys are
//! translated to snake_case on the way in and back to camelCase on the way out.

use super::{
    camel_to_snake, convert_keys, guard_failed, not_found, record_id, snake_to_camel, without_id,
    InvoiceSequence, Mutation, Precondition, RecordUpdate, Repository,
};
use crate::models::{Entity, Record};
use crate::services::metrics::STORE_OPERATION_DURATION;
use async_trait::async_trait;
use serde_json::Value;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

fn db_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, err))
}

fn to_db(record: Record) -> Value {
    convert_keys(Value::Object(record), camel_to_snake)
}

fn from_db(value: Value) -> Result<Record, AppError> {
    match convert_keys(value, snake_to_camel) {
        Value::Object(map) => Ok(map),
        other => Err(AppError::DatabaseError(anyhow::anyhow!(
            "Stored record is not an object: {}",
            other
        ))),
    }
}

/// Guard column and allowed values in storage form.
fn guard_params(guard: &Option<Precondition>) -> (Option<String>, Value) {
    match guard {
        Some(g) => (
            Some(camel_to_snake(&g.field)),
            convert_keys(Value::Array(g.one_of.clone()), camel_to_snake),
        ),
        None => (None, Value::Array(Vec::new())),
    }
}

async fn exists(conn: &mut PgConnection, entity: Entity, id: &str) -> Result<bool, AppError> {
    let found: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM records WHERE entity = $1 AND id = $2")
            .bind(entity.table_name())
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to look up record", e))?;
    Ok(found.is_some())
}

async fn insert_in(conn: &mut PgConnection, entity: Entity, record: Record) -> Result<(), AppError> {
    let id = record_id(entity, &record)?;
    sqlx::query("INSERT INTO records (entity, id, data) VALUES ($1, $2, $3)")
        .bind(entity.table_name())
        .bind(&id)
        .bind(to_db(record))
        .execute(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("{} record '{}' already exists", entity, id))
            }
            _ => db_error("Failed to insert record", e),
        })?;
    Ok(())
}

async fn update_in(
    conn: &mut PgConnection,
    entity: Entity,
    id: &str,
    patch: Record,
    guard: Option<Precondition>,
) -> Result<Record, AppError> {
    let (guard_field, allowed) = guard_params(&guard);

    let updated: Option<Value> = sqlx::query_scalar(
        r#"
        UPDATE records
        SET data = data || $3, updated_utc = NOW()
        WHERE entity = $1 AND id = $2
          AND ($4::text IS NULL OR $5::jsonb @> jsonb_build_array(COALESCE(data -> $4, 'null'::jsonb)))
        RETURNING data
        "#,
    )
    .bind(entity.table_name())
    .bind(id)
    .bind(to_db(without_id(patch)))
    .bind(guard_field)
    .bind(allowed)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_error("Failed to update record", e))?;

    let Some(data) = updated else {
        if let Some(guard) = guard {
            if exists(conn, entity, id).await? {
                return Err(guard_failed(entity, id, &guard));
            }
        }
        return Err(not_found(entity, id));
    };
    from_db(data)
}

async fn delete_in(
    conn: &mut PgConnection,
    entity: Entity,
    id: &str,
    guard: Option<Precondition>,
) -> Result<(), AppError> {
    let (guard_field, allowed) = guard_params(&guard);

    let result = sqlx::query(
        r#"
        DELETE FROM records
        WHERE entity = $1 AND id = $2
          AND ($3::text IS NULL OR $4::jsonb @> jsonb_build_array(COALESCE(data -> $3, 'null'::jsonb)))
        "#,
    )
    .bind(entity.table_name())
    .bind(id)
    .bind(guard_field)
    .bind(allowed)
    .execute(&mut *conn)
    .await
    .map_err(|e| db_error("Failed to delete record", e))?;

    if result.rows_affected() == 0 {
        if let Some(guard) = guard {
            if exists(conn, entity, id).await? {
                return Err(guard_failed(entity, id, &guard));
            }
        }
    }
    Ok(())
}

impl PgStore {
    /// Create a new connection pool.
    #[instrument(skip(database_url))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn connection(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, AppError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire connection", e))
    }
}

#[async_trait]
impl Repository for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self), fields(entity = %entity))]
    async fn get_all(&self, entity: Entity) -> Result<Vec<Record>, AppError> {
        let timer = STORE_OPERATION_DURATION
            .with_label_values(&["postgres", "get_all"])
            .start_timer();

        let rows: Vec<Value> =
            sqlx::query_scalar("SELECT data FROM records WHERE entity = $1 ORDER BY seq")
                .bind(entity.table_name())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to list records", e))?;

        timer.observe_duration();
        rows.into_iter().map(from_db).collect()
    }

    #[instrument(skip(self), fields(entity = %entity))]
    async fn get(&self, entity: Entity, id: &str) -> Result<Option<Record>, AppError> {
        let row: Option<Value> =
            sqlx::query_scalar("SELECT data FROM records WHERE entity = $1 AND id = $2")
                .bind(entity.table_name())
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to get record", e))?;

        row.map(from_db).transpose()
    }

    #[instrument(skip(self, record), fields(entity = %entity))]
    async fn add(&self, entity: Entity, record: Record) -> Result<Record, AppError> {
        let mut conn = self.connection().await?;
        insert_in(&mut *conn, entity, record.clone()).await?;
        Ok(record)
    }

    #[instrument(skip(self, patch), fields(entity = %entity))]
    async fn update(&self, entity: Entity, id: &str, patch: Record) -> Result<Record, AppError> {
        let mut conn = self.connection().await?;
        update_in(&mut *conn, entity, id, patch, None).await
    }

    #[instrument(skip(self, ids), fields(entity = %entity, count = ids.len()))]
    async fn bulk_delete(&self, entity: Entity, ids: &[String]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM records WHERE entity = $1 AND id = ANY($2)")
            .bind(entity.table_name())
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete records", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, updates), fields(entity = %entity, count = updates.len()))]
    async fn bulk_update(&self, entity: Entity, updates: Vec<RecordUpdate>) -> Result<u64, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let mut changed = 0;
        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE records
                SET data = data || $3, updated_utc = NOW()
                WHERE entity = $1 AND id = $2
                "#,
            )
            .bind(entity.table_name())
            .bind(&update.id)
            .bind(to_db(without_id(update.data)))
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to update records", e))?;
            changed += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;
        Ok(changed)
    }

    #[instrument(skip(self, batch), fields(mutations = batch.len()))]
    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), AppError> {
        let timer = STORE_OPERATION_DURATION
            .with_label_values(&["postgres", "apply"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // An early return drops `tx`, which rolls the transaction back.
        for mutation in batch {
            match mutation {
                Mutation::Insert { entity, record } => insert_in(&mut *tx, entity, record).await?,
                Mutation::Update {
                    entity,
                    id,
                    patch,
                    guard,
                } => {
                    update_in(&mut *tx, entity, &id, patch, guard).await?;
                }
                Mutation::Delete { entity, id, guard } => {
                    delete_in(&mut *tx, entity, &id, guard).await?
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn next_invoice_sequence(&self, year: i32) -> Result<InvoiceSequence, AppError> {
        let (year, counter): (i32, i32) = sqlx::query_as(
            r#"
            INSERT INTO invoice_counter (id, year, counter)
            VALUES (1, $1, 1)
            ON CONFLICT (id) DO UPDATE SET
                counter = CASE WHEN invoice_counter.year = EXCLUDED.year
                               THEN invoice_counter.counter + 1
                               ELSE 1 END,
                year = EXCLUDED.year
            RETURNING year, counter
            "#,
        )
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to advance invoice counter", e))?;

        Ok(InvoiceSequence {
            year,
            counter: counter.max(0) as u32,
        })
    }

    async fn set_invoice_sequence(&self, sequence: InvoiceSequence) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO invoice_counter (id, year, counter)
            VALUES (1, $1, $2)
            ON CONFLICT (id) DO UPDATE SET year = EXCLUDED.year, counter = EXCLUDED.counter
            "#,
        )
        .bind(sequence.year)
        .bind(sequence.counter as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to set invoice counter", e))?;
        Ok(())
    }
}
