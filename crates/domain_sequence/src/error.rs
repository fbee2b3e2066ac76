//! Sequence allocation errors

use core_kernel::{PortError, TenantId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SequenceError {
    /// The tenant record is missing; allocation never falls back to defaults
    #[error("Tenant not found: {0}")]
    TenantNotFound(TenantId),

    #[error("Invalid numbering scheme for {kind}: {message}")]
    InvalidScheme {
        kind: String,
        message: String,
    },

    #[error("Unknown document kind: {0}")]
    UnknownKind(String),

    #[error("Counter store error: {0}")]
    Store(#[from] PortError),
}
