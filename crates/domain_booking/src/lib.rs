//! Booking Ledger Domain
//!
//! A booking owns its status history, traveler roster and an embedded
//! payment sub-ledger. Totals are derived from the sub-ledger on every
//! mutation and never set by callers.

pub mod booking;
pub mod ledger;
pub mod error;

pub use booking::{
    Booking, BookingCustomer, BookingPricing, BookingStatus, Cancellation, Confirmation, NewBooking,
    StatusChange, Traveler, TravelerKind,
};
pub use ledger::{
    compute_totals, EntryKind, EntryStatus, LedgerEntry, LedgerTotals, NewLedgerEntry, PaymentStatus,
};
pub use error::BookingError;
