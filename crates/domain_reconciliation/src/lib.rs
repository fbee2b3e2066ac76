//! Gateway Reconciliation Domain
//!
//! Applies asynchronous payment-gateway events to invoices, payments and
//! bookings exactly once.
//!
//! - [`signature`]: HMAC-SHA256 webhook verification, checked before anything
//!   is parsed
//! - [`event`]: the gateway event envelope and the event kinds acted upon
//! - [`planner`]: pure decisions over current document state, covering
//!   redelivery, out-of-order arrival and cumulative refunds
//! - [`gateway`]: the outbound `PaymentGateway` port, with an HTTP adapter
//!
//! Deduplication by event id and the atomic commit of a decision belong to
//! the application layer; the planner only guards against replays that slip
//! past the processed-event log.

pub mod error;
pub mod event;
pub mod signature;
pub mod planner;
pub mod gateway;
pub mod adapters;

pub use error::ReconciliationError;
pub use event::{EventMetadata, GatewayEvent, GatewayEventKind};
pub use signature::{WebhookVerifier, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};
pub use planner::{plan, Decision, PlanContext, SkipReason};
pub use gateway::{PaymentGateway, PaymentIntent, PaymentIntentRequest};
pub use adapters::{HttpGatewayConfig, HttpPaymentGateway};
