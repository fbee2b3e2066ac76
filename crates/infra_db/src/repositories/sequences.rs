//! Sequence counter and tenant repositories

use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{TenantId, Timezone};
use domain_sequence::{CounterKey, NumberingConfig, Tenant};

use crate::error::DatabaseError;

/// Monotonic counters keyed by `(tenant, kind, period)`
#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: PgPool,
}

impl CounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Advances the counter in a single upsert. The row lock taken by the
    /// upsert serializes concurrent callers on the same key.
    pub async fn next_value(&self, key: &CounterKey, start: u64) -> Result<u64, DatabaseError> {
        let start = i64::try_from(start)
            .map_err(|_| DatabaseError::ConstraintViolation(format!("start number {} out of range", start)))?;
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequence_counters (tenant_id, kind, period, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, kind, period)
            DO UPDATE SET value = sequence_counters.value + 1, updated_at = now()
            RETURNING value
            "#,
        )
        .bind(key.tenant_id.as_uuid())
        .bind(key.kind.as_str())
        .bind(&key.period)
        .bind(start)
        .fetch_one(&self.pool)
        .await?;
        Ok(value as u64)
    }

    pub async fn current(&self, key: &CounterKey) -> Result<Option<u64>, DatabaseError> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT value FROM sequence_counters WHERE tenant_id = $1 AND kind = $2 AND period = $3",
        )
        .bind(key.tenant_id.as_uuid())
        .bind(key.kind.as_str())
        .bind(&key.period)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.map(|v| v as u64))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    timezone: String,
    numbering: Option<serde_json::Value>,
}

impl TenantRow {
    fn into_tenant(self) -> Result<Tenant, DatabaseError> {
        let timezone: Timezone = serde_json::from_value(serde_json::Value::String(self.timezone))?;
        let numbering: NumberingConfig = match self.numbering {
            Some(value) => serde_json::from_value(value)?,
            None => NumberingConfig::default(),
        };
        Ok(Tenant {
            id: TenantId::from_uuid(self.id),
            name: self.name,
            timezone,
            numbering,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: TenantId) -> Result<Option<Tenant>, DatabaseError> {
        sqlx::query_as::<_, TenantRow>("SELECT id, name, timezone, numbering FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(TenantRow::into_tenant)
            .transpose()
    }

    /// Creates the tenant or replaces its name and numbering configuration
    pub async fn upsert(&self, tenant: &Tenant) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, timezone, numbering)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id)
            DO UPDATE SET name = EXCLUDED.name, timezone = EXCLUDED.timezone, numbering = EXCLUDED.numbering
            "#,
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.name)
        .bind(tenant.timezone.0.name())
        .bind(serde_json::to_value(&tenant.numbering)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
