//! Application Services
//!
//! The operations exposed to controllers and the gateway webhook, composed
//! from the domain crates over ports:
//!
//! - [`QuoteService`]: quote creation, send/view/decision workflow, revision
//!   chains and conversion into a booking
//! - [`BookingService`]: bookings and the payment flows that keep Payment,
//!   Booking and Invoice consistent
//! - [`InvoiceService`]: invoices, overdue classification and payment intents
//! - [`ReconciliationService`]: exactly-once application of gateway events
//!
//! Every multi-document mutation is handed to [`FinancialStore::commit`] as
//! one [`ChangeSet`] and retried on optimistic-concurrency conflicts.

pub mod error;
pub mod ports;
pub mod context;
pub mod quote_service;
pub mod booking_service;
pub mod invoice_service;
pub mod reconciliation_service;
pub mod services;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{ServiceError, ServiceResult};
pub use ports::{
    ChangeSet, CommitOutcome, DocumentRenderer, FinancialStore, ItinerarySummary, ItineraryCatalog, Mailer,
    ProcessedEvent,
};
pub use context::{Actor, ServiceContext, DEFAULT_MAX_CONFLICT_RETRIES};
pub use quote_service::{CreateQuoteInput, QuoteService, DEFAULT_VALIDITY_DAYS};
pub use booking_service::{AddPaymentInput, BookingService, CreateBookingInput, RecordedPayment};
pub use invoice_service::{CreateInvoiceInput, InvoiceService, MarkPaidInput};
pub use reconciliation_service::{ReconciliationOutcome, ReconciliationService, DEFAULT_RETENTION_DAYS};
pub use services::{Collaborators, FinancialServices};
