//! Application service errors
//!
//! Domain errors are wrapped unchanged; [`ServiceError::code`] classifies
//! them into the stable codes callers match on.

use thiserror::Error;

use core_kernel::{MoneyError, PortError, TemporalError};
use domain_billing::BillingError;
use domain_booking::BookingError;
use domain_quote::QuoteError;
use domain_reconciliation::ReconciliationError;
use domain_sequence::SequenceError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    /// Optimistic version checks kept failing
    #[error("{operation} still conflicted after {attempts} attempts")]
    ConcurrencyExhausted {
        operation: &'static str,
        attempts: u32,
    },
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Quote(e) => match e {
                QuoteError::InvalidStateTransition { .. }
                | QuoteError::NotEditable { .. }
                | QuoteError::AlreadyConverted(_)
                | QuoteError::NotLatestVersion { .. } => "invalid_state",
                QuoteError::Validation(_) | QuoteError::Money(_) | QuoteError::Temporal(_) => "validation_error",
            },
            ServiceError::Booking(e) => match e {
                BookingError::InvalidStatusTransition { .. } | BookingError::Closed { .. } => "invalid_state",
                BookingError::EntryNotFound(_) => "not_found",
                BookingError::Validation(_) | BookingError::Money(_) | BookingError::Temporal(_) => {
                    "validation_error"
                }
            },
            ServiceError::Billing(e) => billing_code(e),
            ServiceError::Sequence(e) => match e {
                SequenceError::TenantNotFound(_) => "tenant_not_found",
                SequenceError::InvalidScheme { .. } | SequenceError::UnknownKind(_) => "validation_error",
                SequenceError::Store(p) => port_code(p),
            },
            ServiceError::Reconciliation(e) => match e {
                ReconciliationError::InvalidSignature(_) => "gateway_signature_invalid",
                ReconciliationError::MalformedEvent(_) | ReconciliationError::MissingReference { .. } => {
                    "validation_error"
                }
                ReconciliationError::UnknownDocument { .. } => "not_found",
                ReconciliationError::Billing(b) => billing_code(b),
                ReconciliationError::Gateway(_) => "gateway_error",
            },
            ServiceError::Money(_) | ServiceError::Temporal(_) | ServiceError::Validation(_) => "validation_error",
            ServiceError::Port(p) => port_code(p),
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::ConcurrencyExhausted { .. } => "conflict",
        }
    }

    /// Document status at the time of an illegal transition
    pub fn current_state(&self) -> Option<&str> {
        match self {
            ServiceError::Quote(e) => e.current_state(),
            ServiceError::Booking(e) => e.current_state(),
            ServiceError::Billing(e) => e.current_state(),
            ServiceError::Reconciliation(ReconciliationError::Billing(e)) => e.current_state(),
            _ => None,
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Port(p) if p.is_conflict())
    }
}

fn billing_code(e: &BillingError) -> &'static str {
    match e {
        BillingError::InvalidStateTransition { .. } => "invalid_state",
        BillingError::RefundExceedsCollected { .. } | BillingError::Validation(_) | BillingError::Money(_) => {
            "validation_error"
        }
    }
}

fn port_code(e: &PortError) -> &'static str {
    match e {
        PortError::NotFound { .. } => "not_found",
        PortError::Conflict { .. } => "conflict",
        PortError::Validation { .. } => "validation_error",
        _ => "internal_error",
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{QuoteId, TenantId};

    #[test]
    fn test_invalid_state_carries_current_state() {
        let err: ServiceError = QuoteError::InvalidStateTransition {
            from: "draft".to_string(),
            to: "approved".to_string(),
        }
        .into();

        assert_eq!(err.code(), "invalid_state");
        assert_eq!(err.current_state(), Some("draft"));
    }

    #[test]
    fn test_codes_by_category() {
        let tenant: ServiceError = SequenceError::TenantNotFound(TenantId::new()).into();
        assert_eq!(tenant.code(), "tenant_not_found");

        let signature: ServiceError = ReconciliationError::InvalidSignature("mismatch".into()).into();
        assert_eq!(signature.code(), "gateway_signature_invalid");

        let conflict: ServiceError = PortError::conflict("stale version").into();
        assert_eq!(conflict.code(), "conflict");
        assert!(conflict.is_conflict());

        let converted: ServiceError = QuoteError::AlreadyConverted(QuoteId::new()).into();
        assert_eq!(converted.current_state(), Some("converted"));

        assert_eq!(ServiceError::not_found("Booking", "x").code(), "not_found");
    }
}
