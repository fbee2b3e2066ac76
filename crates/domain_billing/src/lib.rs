//! Billing Domain - Invoices and Payment Records
//!
//! Two documents live here:
//!
//! - **Invoice**: an invoice-centric view of what is owed, with its own
//!   status machine, overdue classification and gateway state
//! - **Payment**: the first-class record of money movement, with refund and
//!   dispute sub-records
//!
//! Booking balances are derived from completed payments by the application
//! layer; this crate has no dependency on the booking ledger.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{Invoice, InvoiceStatus};
//!
//! let mut invoice = Invoice::new(input, "INV-2025-00001".into(), now)?;
//! invoice.mark_as_sent("guest@example.com", now)?;
//! invoice.mark_as_paid(amount, PaymentMethod::BankTransfer, None, now)?;
//! assert_eq!(invoice.status(), InvoiceStatus::Paid);
//! ```

pub mod invoice;
pub mod payment;
pub mod error;

pub use invoice::{
    BillTo, GatewayState, GatewayStatus, InternalNote, Invoice, InvoiceEmail, InvoiceEntry,
    InvoiceEntryKind, InvoiceItem, InvoiceItemType, InvoiceStatus, NewInvoice,
};
pub use payment::{
    DisputeRecord, GatewayLink, NewPayment, Payment, PaymentStatus, RefundRecord,
};
pub use error::BillingError;
