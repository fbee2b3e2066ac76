//! Booking domain errors

use thiserror::Error;

use core_kernel::{LedgerEntryId, MoneyError, TemporalError};

/// Errors that can occur in the booking domain
#[derive(Debug, Error)]
pub enum BookingError {
    /// Status change not present in the transition table
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: String,
        to: String,
    },

    /// Financial mutation on a booking that no longer accepts it
    #[error("Booking is {status} and cannot accept {operation}")]
    Closed {
        status: String,
        operation: String,
    },

    #[error("Ledger entry not found: {0}")]
    EntryNotFound(LedgerEntryId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),
}

impl BookingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }

    pub fn current_state(&self) -> Option<&str> {
        match self {
            BookingError::InvalidStatusTransition { from, .. } => Some(from),
            BookingError::Closed { status, .. } => Some(status),
            _ => None,
        }
    }
}
