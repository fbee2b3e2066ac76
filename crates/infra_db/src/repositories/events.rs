//! Processed gateway event repository

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use app_services::ProcessedEvent;
use core_kernel::TenantId;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct ProcessedEventRepository {
    pool: PgPool,
}

impl ProcessedEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, tenant_id: TenantId, event_id: &str) -> Result<bool, DatabaseError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_gateway_events WHERE tenant_id = $1 AND event_id = $2)",
        )
        .bind(tenant_id.as_uuid())
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    pub async fn purge_older_than(&self, older_than: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM processed_gateway_events WHERE processed_at < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Records the event inside the caller's transaction. Returns `false` when it
/// was already recorded; a concurrent insert of the same id blocks until the
/// other transaction finishes.
pub async fn record_event(conn: &mut PgConnection, event: &ProcessedEvent) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        r#"
        INSERT INTO processed_gateway_events (tenant_id, event_id, event_type, outcome, processed_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (tenant_id, event_id) DO NOTHING
        "#,
    )
    .bind(event.tenant_id.as_uuid())
    .bind(&event.event_id)
    .bind(&event.event_type)
    .bind(&event.outcome)
    .bind(event.processed_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
