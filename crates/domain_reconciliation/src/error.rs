//! Reconciliation errors

use core_kernel::PortError;
use domain_billing::BillingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// The signature header is missing, malformed, stale or does not match.
    /// The event is dropped without side effects.
    #[error("Gateway signature rejected: {0}")]
    InvalidSignature(String),

    #[error("Malformed gateway event: {0}")]
    MalformedEvent(String),

    /// The event lacks an identifier needed to locate its documents
    #[error("Gateway event {event_id} is missing {reference}")]
    MissingReference {
        event_id: String,
        reference: &'static str,
    },

    /// The referenced document is not known yet; the event stays
    /// unprocessed so a redelivery can apply it
    #[error("{entity} not found for gateway object {gateway_id}")]
    UnknownDocument {
        entity: &'static str,
        gateway_id: String,
    },

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] PortError),
}

impl ReconciliationError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ReconciliationError::MalformedEvent(message.into())
    }
}
