//! Postgres-backed relay queue

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{DeliveryHandle, MessageQueue, QueueError, RawMessage};

/// Durable queue over a Postgres relay table.
///
/// Claims take a lease (`locked_until`) via `FOR UPDATE SKIP LOCKED`, so
/// concurrent consumers never double-claim a row and messages claimed by a
/// crashed consumer become redeliverable once the lease expires.
#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    queue_name: String,
    lease_secs: u64,
}

impl PgQueue {
    pub fn new(pool: PgPool, queue_name: impl Into<String>, lease_secs: u64) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
            lease_secs,
        }
    }

    /// Create the relay table if it is missing. Called once at startup.
    pub async fn ensure_table(&self) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_queue (
                id UUID PRIMARY KEY,
                queue_name TEXT NOT NULL,
                payload BYTEA NOT NULL,
                attempts INT NOT NULL DEFAULT 0,
                enqueued_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                locked_until TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_relay_queue_claim
            ON relay_queue (queue_name, enqueued_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one message to this logical queue. Used by tests and the CLI
    /// seed command.
    pub async fn enqueue(&self, payload: &[u8]) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO relay_queue (id, queue_name, payload) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&self.queue_name)
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(id)
    }
}

#[async_trait]
impl MessageQueue for PgQueue {
    async fn dequeue(&self, max: usize) -> Result<Vec<RawMessage>, QueueError> {
        // Claim a window of rows and set their lease in one round trip.
        // SKIP LOCKED keeps concurrent claimants from blocking each other.
        let rows = sqlx::query(
            r#"
            UPDATE relay_queue
            SET locked_until = NOW() + make_interval(secs => $1)
            WHERE id IN (
                SELECT id FROM relay_queue
                WHERE queue_name = $2
                  AND (locked_until IS NULL OR locked_until <= NOW())
                ORDER BY enqueued_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload
            "#,
        )
        .bind(self.lease_secs as f64)
        .bind(&self.queue_name)
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id")?;
            let payload: Vec<u8> = row.try_get("payload")?;
            messages.push(RawMessage {
                payload,
                handle: DeliveryHandle::new(id),
            });
        }

        Ok(messages)
    }

    async fn ack(&self, handle: DeliveryHandle) -> Result<(), QueueError> {
        let result = sqlx::query("DELETE FROM relay_queue WHERE id = $1")
            .bind(handle.id())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Lease expired and another consumer resolved it first.
            tracing::warn!(message_id = %handle.id(), "Ack targeted a message that is no longer queued");
        }

        Ok(())
    }

    async fn requeue(&self, handle: DeliveryHandle) -> Result<(), QueueError> {
        // Re-arm the lease instead of clearing it: a requeued message waits
        // out its lease, so the run that claimed it never sees it again.
        sqlx::query(
            r#"
            UPDATE relay_queue
            SET locked_until = NOW() + make_interval(secs => $1),
                attempts = attempts + 1
            WHERE id = $2
            "#,
        )
        .bind(self.lease_secs as f64)
        .bind(handle.id())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn depth(&self) -> Result<i64, QueueError> {
        let depth: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM relay_queue
            WHERE queue_name = $1
              AND (locked_until IS NULL OR locked_until <= NOW())
            "#,
        )
        .bind(&self.queue_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(depth)
    }
}
