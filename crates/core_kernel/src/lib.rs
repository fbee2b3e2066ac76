//! Core Kernel - Foundational types shared by the travel back-office domains
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Clocks, tenant timezones and validated date ranges
//! - Strongly typed identifiers
//! - Port error and health-check types for adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;
pub mod payment_method;

pub use money::{Money, Currency, MoneyError, Rate};
pub use temporal::{Clock, SystemClock, FixedClock, Timezone, TemporalError, ValidityWindow, DateRange};
pub use identifiers::{
    TenantId, CustomerId, LeadId, ItineraryId, UserId, QuoteId, BookingId,
    InvoiceId, PaymentId, LineItemId, TravelerId, LedgerEntryId,
};
pub use payment_method::PaymentMethod;
pub use ports::{PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable};
