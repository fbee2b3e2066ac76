//! Maintenance job DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::TenantId;

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub tenant_id: TenantId,
    /// Invoices moved to `overdue` by this run
    pub reclassified: usize,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PurgeRequest {
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub retention_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub retention_days: i64,
    pub purged: u64,
}
