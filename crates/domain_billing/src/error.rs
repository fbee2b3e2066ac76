//! Billing domain errors

use thiserror::Error;

use core_kernel::MoneyError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Operation not allowed in the document's current status
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: String,
        to: String,
    },

    /// Refund larger than what was collected
    #[error("Refund of {requested} exceeds collected amount {collected}")]
    RefundExceedsCollected {
        requested: String,
        collected: String,
    },

    /// Malformed or inconsistent input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        BillingError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Status the document was in when an illegal operation was attempted
    pub fn current_state(&self) -> Option<&str> {
        match self {
            BillingError::InvalidStateTransition { from, .. } => Some(from),
            _ => None,
        }
    }
}
