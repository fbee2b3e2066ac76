//! Quote Lifecycle Domain
//!
//! Quotes price an itinerary for a customer, travel through the send /
//! view / decision workflow, branch into revision chains and finally
//! convert into exactly one booking.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_quote::{Quote, QuoteStatus};
//!
//! let mut quote = Quote::new(input, number, now)?;
//! quote.mark_as_sent("ana@example.com", now)?;
//! quote.approve("Ana Lima", None, now)?;
//! let snapshot = quote.conversion_snapshot()?;
//! ```

pub mod quote;
pub mod pricing;
pub mod schedule;
pub mod error;

pub use quote::{
    Approval, ConversionSnapshot, CustomerSnapshot, NewQuote, Quote, QuoteRevision, QuoteStatus,
    Rejection, SentEmail, TravelerCounts,
};
pub use pricing::{Adjustment, Discount, LineItem, LineItemType, Pricing, Tax};
pub use schedule::{Milestone, PaymentSchedule};
pub use error::QuoteError;
