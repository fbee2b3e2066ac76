//! Sequence Domain Ports
//!
//! - [`TenantDirectory`]: read-only access to tenant numbering configuration
//! - [`CounterStore`]: the arena of monotonic counters keyed by
//!   `(tenant, kind, period)`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, PortError, TenantId};

use crate::kind::DocumentKind;
use crate::tenant::Tenant;

/// Identity of one monotonic counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub tenant_id: TenantId,
    pub kind: DocumentKind,
    pub period: String,
}

impl CounterKey {
    pub fn new(tenant_id: TenantId, kind: DocumentKind, period: impl Into<String>) -> Self {
        Self {
            tenant_id,
            kind,
            period: period.into(),
        }
    }
}

#[async_trait]
pub trait TenantDirectory: DomainPort {
    /// Returns `None` when the tenant does not exist
    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>, PortError>;
}

#[async_trait]
pub trait CounterStore: DomainPort {
    /// Atomically advances the counter and returns the new value.
    ///
    /// The first call for a key returns `start`; every later call returns
    /// the previous value plus one. Implementations must perform the read and
    /// the increment as one indivisible step.
    async fn next_value(&self, key: &CounterKey, start: u64) -> Result<u64, PortError>;

    /// Current value without advancing, `None` if never allocated
    async fn peek(&self, key: &CounterKey) -> Result<Option<u64>, PortError>;
}

/// In-memory adapters for tests and local runs
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{Mutex, RwLock};

    #[derive(Debug, Default)]
    pub struct MockTenantDirectory {
        tenants: Arc<RwLock<HashMap<TenantId, Tenant>>>,
    }

    impl MockTenantDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_tenants(tenants: Vec<Tenant>) -> Self {
            let directory = Self::new();
            for tenant in tenants {
                directory.insert(tenant).await;
            }
            directory
        }

        pub async fn insert(&self, tenant: Tenant) {
            self.tenants.write().await.insert(tenant.id, tenant);
        }
    }

    impl DomainPort for MockTenantDirectory {}

    #[async_trait]
    impl TenantDirectory for MockTenantDirectory {
        async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>, PortError> {
            Ok(self.tenants.read().await.get(&id).cloned())
        }
    }

    /// Counter arena guarded by a single mutex
    #[derive(Debug, Default)]
    pub struct MockCounterStore {
        counters: Arc<Mutex<HashMap<CounterKey, u64>>>,
    }

    impl MockCounterStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DomainPort for MockCounterStore {}

    #[async_trait]
    impl CounterStore for MockCounterStore {
        async fn next_value(&self, key: &CounterKey, start: u64) -> Result<u64, PortError> {
            let mut counters = self.counters.lock().await;
            let value = match counters.get(key) {
                Some(current) => current + 1,
                None => start,
            };
            counters.insert(key.clone(), value);
            Ok(value)
        }

        async fn peek(&self, key: &CounterKey) -> Result<Option<u64>, PortError> {
            Ok(self.counters.lock().await.get(key).copied())
        }
    }
}
