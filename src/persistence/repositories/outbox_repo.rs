use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::outbox::OutboxEntry;
use crate::error::{AppError, AppResult};
use crate::ports::repositories::OutboxRepository;

/// Appends outbox rows inside the caller's own transaction. This is a free
/// function (not a method on a pool-holding struct) because every aggregate
/// repository's `save()` needs to call it from within its own `&mut
/// Transaction`, never from a separately-acquired connection — that is what
/// makes the outbox append atomic with the aggregate write (§4.2).
pub async fn insert_entries(
    tx: &mut Transaction<'_, Postgres>,
    entries: &[OutboxEntry],
) -> AppResult<()> {
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO event_outbox (id, event_type, aggregate_id, payload, created_at, published_at, retry_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.event_type)
        .bind(entry.aggregate_id)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .bind(entry.published_at)
        .bind(entry.retry_count)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;
    }
    Ok(())
}

pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        PgOutboxRepository { pool }
    }
}

fn row_to_entry(row: &sqlx::postgres::PgRow) -> AppResult<OutboxEntry> {
    Ok(OutboxEntry {
        id: row.try_get("id").map_err(AppError::from)?,
        event_type: row.try_get("event_type").map_err(AppError::from)?,
        aggregate_id: row.try_get("aggregate_id").map_err(AppError::from)?,
        payload: row.try_get("payload").map_err(AppError::from)?,
        created_at: row.try_get("created_at").map_err(AppError::from)?,
        published_at: row.try_get("published_at").map_err(AppError::from)?,
        retry_count: row.try_get("retry_count").map_err(AppError::from)?,
    })
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn persist(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entries: &[OutboxEntry],
    ) -> AppResult<()> {
        insert_entries(tx, entries).await
    }

    async fn get_unpublished(&self, limit: i64, max_retries: i32) -> AppResult<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, payload, created_at, published_at, retry_count
            FROM event_outbox
            WHERE published_at IS NULL AND retry_count < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(max_retries)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn mark_as_published(&self, ids: &[Uuid]) -> AppResult<()> {
        sqlx::query("UPDATE event_outbox SET published_at = $1 WHERE id = ANY($2)")
            .bind(Utc::now())
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_as_failed(&self, ids: &[Uuid]) -> AppResult<()> {
        sqlx::query("UPDATE event_outbox SET retry_count = retry_count + 1 WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
