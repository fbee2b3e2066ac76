//! Shared service plumbing

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use core_kernel::{Clock, TenantId, UserId};
use domain_sequence::{SequenceAllocator, SequenceError, TenantDirectory};

use crate::error::{ServiceError, ServiceResult};
use crate::ports::{ChangeSet, CommitOutcome, FinancialStore};

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Who is calling, as resolved at the request boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl Actor {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }
}

/// Dependencies every service shares
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn FinancialStore>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub allocator: SequenceAllocator,
    pub clock: Arc<dyn Clock>,
    pub max_conflict_retries: u32,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn FinancialStore>,
        tenants: Arc<dyn TenantDirectory>,
        allocator: SequenceAllocator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            tenants,
            allocator,
            clock,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries.max(1);
        self
    }

    /// Calendar date in the tenant's timezone; fails if the tenant is unknown
    pub async fn tenant_today(&self, tenant_id: TenantId) -> ServiceResult<NaiveDate> {
        let tenant = self
            .tenants
            .find_tenant(tenant_id)
            .await
            .map_err(SequenceError::from)?
            .ok_or(SequenceError::TenantNotFound(tenant_id))?;
        Ok(tenant.timezone.local_date(self.clock.now()))
    }

    /// Commits a change set that carries no processed event
    pub async fn commit(&self, changes: ChangeSet) -> ServiceResult<ChangeSet> {
        match self.store.commit(changes).await? {
            CommitOutcome::Applied(applied) => Ok(applied),
            CommitOutcome::DuplicateEvent => Err(ServiceError::validation("unexpected duplicate event on commit")),
        }
    }
}

/// Re-runs `operation` while it fails with an optimistic-concurrency conflict.
///
/// Each attempt must reload the documents it modifies.
pub(crate) async fn with_conflict_retry<T, F, Fut>(
    max_attempts: u32,
    operation: &'static str,
    mut attempt_fn: F,
) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_fn().await {
            Err(e) if e.is_conflict() => {
                if attempt >= max_attempts {
                    return Err(ServiceError::ConcurrencyExhausted {
                        operation,
                        attempts: attempt,
                    });
                }
                warn!(operation, attempt, error = %e, "Concurrent modification, retrying");
            }
            result => return result,
        }
    }
}

/// Unwraps a document the store handed back from a commit
pub(crate) fn committed<T>(document: Option<T>, entity: &'static str) -> ServiceResult<T> {
    document.ok_or_else(|| {
        ServiceError::Port(core_kernel::PortError::internal(format!(
            "store returned no {} from commit",
            entity
        )))
    })
}
