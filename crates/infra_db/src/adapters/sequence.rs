//! PostgreSQL adapters for the sequence domain ports

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{DomainPort, PortError, TenantId};
use domain_sequence::{CounterKey, CounterStore, Tenant, TenantDirectory};

use crate::repositories::{CounterRepository, TenantRepository};

#[derive(Debug, Clone)]
pub struct PostgresCounterStore {
    repository: CounterRepository,
}

impl PostgresCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: CounterRepository::new(pool),
        }
    }
}

impl DomainPort for PostgresCounterStore {}

#[async_trait]
impl CounterStore for PostgresCounterStore {
    #[instrument(skip(self), fields(tenant_id = %key.tenant_id, kind = %key.kind, period = %key.period))]
    async fn next_value(&self, key: &CounterKey, start: u64) -> Result<u64, PortError> {
        Ok(self.repository.next_value(key, start).await?)
    }

    async fn peek(&self, key: &CounterKey) -> Result<Option<u64>, PortError> {
        Ok(self.repository.current(key).await?)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresTenantDirectory {
    repository: TenantRepository,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: TenantRepository::new(pool),
        }
    }

    /// Registers or updates a tenant
    pub async fn save(&self, tenant: &Tenant) -> Result<(), PortError> {
        Ok(self.repository.upsert(tenant).await?)
    }
}

impl DomainPort for PostgresTenantDirectory {}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>, PortError> {
        Ok(self.repository.find(id).await?)
    }
}
