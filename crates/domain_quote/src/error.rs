//! Quote domain errors

use thiserror::Error;

use core_kernel::{MoneyError, QuoteId, TemporalError};

/// Errors that can occur in the quote domain
#[derive(Debug, Error)]
pub enum QuoteError {
    /// Invalid state transition attempted
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: String,
        to: String,
    },

    /// Quote can only be edited or deleted while in draft
    #[error("Quote cannot be modified in status {status}")]
    NotEditable {
        status: String,
    },

    /// A quote converts into at most one booking
    #[error("Quote {0} has already been converted")]
    AlreadyConverted(QuoteId),

    /// Revisions branch from the newest version only
    #[error("Quote {quote_id} is version {version}, latest is {latest}")]
    NotLatestVersion {
        quote_id: QuoteId,
        version: u32,
        latest: u32,
    },

    /// Malformed or inconsistent input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),
}

impl QuoteError {
    pub fn validation(message: impl Into<String>) -> Self {
        QuoteError::Validation(message.into())
    }

    /// Status the quote was in when an illegal operation was attempted
    pub fn current_state(&self) -> Option<&str> {
        match self {
            QuoteError::InvalidStateTransition { from, .. } => Some(from),
            QuoteError::NotEditable { status } => Some(status),
            QuoteError::AlreadyConverted(_) => Some("converted"),
            _ => None,
        }
    }
}
