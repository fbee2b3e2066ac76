//! Document number allocation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use core_kernel::TenantId;

use crate::error::SequenceError;
use crate::kind::DocumentKind;
use crate::ports::{CounterKey, CounterStore, TenantDirectory};
use crate::tenant::Tenant;

/// Allocates `PREFIX-period-NNNN` numbers from atomic per-period counters
#[derive(Clone)]
pub struct SequenceAllocator {
    tenants: Arc<dyn TenantDirectory>,
    counters: Arc<dyn CounterStore>,
}

impl SequenceAllocator {
    pub fn new(tenants: Arc<dyn TenantDirectory>, counters: Arc<dyn CounterStore>) -> Self {
        Self { tenants, counters }
    }

    /// Allocates the next number, deriving the period from `now` in the
    /// tenant's timezone
    pub async fn allocate(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        now: DateTime<Utc>,
    ) -> Result<String, SequenceError> {
        let tenant = self.load_tenant(tenant_id).await?;
        let period = kind.period_for(tenant.timezone.local_date(now));
        self.allocate_for(&tenant, kind, &period).await
    }

    /// Allocates the next number for an explicit period bucket
    pub async fn allocate_in_period(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        period: &str,
    ) -> Result<String, SequenceError> {
        let tenant = self.load_tenant(tenant_id).await?;
        self.allocate_for(&tenant, kind, period).await
    }

    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Tenant, SequenceError> {
        self.tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or(SequenceError::TenantNotFound(tenant_id))
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id, kind = %kind))]
    async fn allocate_for(
        &self,
        tenant: &Tenant,
        kind: DocumentKind,
        period: &str,
    ) -> Result<String, SequenceError> {
        let scheme = tenant.numbering.scheme(kind);
        scheme.validate(kind)?;

        let key = CounterKey::new(tenant.id, kind, period);
        let value = self.counters.next_value(&key, scheme.start_number).await?;
        let number = format_number(&scheme.prefix, period, value, kind.width());

        debug!(number = %number, "Allocated document number");
        Ok(number)
    }
}

/// Formats `PREFIX-period-NNNN`, zero-padding the sequence to `width`
pub fn format_number(prefix: &str, period: &str, sequence: u64, width: usize) -> String {
    format!("{}-{}-{:0width$}", prefix, period, sequence, width = width)
}

/// Extracts the trailing numeric sequence of a formatted number
pub fn parse_suffix(number: &str) -> Option<u64> {
    number.rsplit_once('-').and_then(|(_, suffix)| suffix.parse().ok())
}
