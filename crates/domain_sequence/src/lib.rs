//! Sequence Allocation Domain
//!
//! Stamps human-readable document numbers such as `BKG-2503-0001` or
//! `INV-2025-00042`. Numbers are scoped to a tenant, a document kind and a
//! period bucket derived from the tenant's local calendar.
//!
//! # Counters
//!
//! Every `(tenant, kind, period)` triple owns one monotonic counter held by a
//! [`CounterStore`](ports::CounterStore). The store advances the counter in a
//! single atomic step and the formatted number is derived afterwards, so two
//! concurrent allocations can never observe the same value. Counters are kept
//! apart from the documents they number.
//!
//! ```rust,ignore
//! let allocator = SequenceAllocator::new(tenants, counters);
//! let number = allocator.allocate(tenant_id, DocumentKind::Booking, Utc::now()).await?;
//! assert!(number.starts_with("BKG-"));
//! ```

pub mod kind;
pub mod tenant;
pub mod ports;
pub mod allocator;
pub mod error;

pub use kind::{DocumentKind, PeriodBucket};
pub use tenant::{NumberingConfig, NumberingScheme, Tenant};
pub use ports::{CounterKey, CounterStore, TenantDirectory};
pub use allocator::{format_number, parse_suffix, SequenceAllocator};
pub use error::SequenceError;
