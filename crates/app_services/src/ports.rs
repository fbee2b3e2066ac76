//! Application Ports
//!
//! - [`FinancialStore`]: tenant-scoped persistence for quotes, bookings,
//!   invoices and payments, with an atomic multi-document commit
//! - [`ItineraryCatalog`], [`Mailer`], [`DocumentRenderer`]: collaborators
//!   consumed as plain calls

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BookingId, DomainPort, InvoiceId, ItineraryId, PaymentId, PortError, QuoteId, TenantId};
use domain_billing::{Invoice, Payment};
use domain_booking::Booking;
use domain_quote::Quote;

/// Gateway event id recorded in the same commit as its effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub tenant_id: TenantId,
    pub event_id: String,
    pub event_type: String,
    pub outcome: String,
    pub processed_at: DateTime<Utc>,
}

/// Documents written together or not at all.
///
/// A document whose `lock_version` is 0 is inserted; any other document
/// replaces the stored copy only if the stored `lock_version` still matches.
/// A mismatch, a natural-key clash or an already recorded event rejects the
/// whole set.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub quotes: Vec<Quote>,
    pub bookings: Vec<Booking>,
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
    pub processed_event: Option<ProcessedEvent>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quotes.push(quote);
        self
    }

    pub fn with_booking(mut self, booking: Booking) -> Self {
        self.bookings.push(booking);
        self
    }

    pub fn with_invoice(mut self, invoice: Invoice) -> Self {
        self.invoices.push(invoice);
        self
    }

    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn with_processed_event(mut self, event: ProcessedEvent) -> Self {
        self.processed_event = Some(event);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
            && self.bookings.is_empty()
            && self.invoices.is_empty()
            && self.payments.is_empty()
            && self.processed_event.is_none()
    }

    /// Takes the single quote out of a committed set
    pub fn take_quote(&mut self) -> Option<Quote> {
        self.quotes.pop()
    }

    pub fn take_booking(&mut self) -> Option<Booking> {
        self.bookings.pop()
    }

    pub fn take_invoice(&mut self) -> Option<Invoice> {
        self.invoices.pop()
    }

    pub fn take_payment(&mut self) -> Option<Payment> {
        self.payments.pop()
    }
}

#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// Everything was written; documents carry their new `lock_version`
    Applied(ChangeSet),
    /// The processed event was already recorded; nothing was written
    DuplicateEvent,
}

#[async_trait]
pub trait FinancialStore: DomainPort {
    async fn get_quote(&self, tenant_id: TenantId, id: QuoteId) -> Result<Option<Quote>, PortError>;

    /// All versions sharing `quote_number`, ascending by version
    async fn list_quote_versions(&self, tenant_id: TenantId, quote_number: &str) -> Result<Vec<Quote>, PortError>;

    /// Removes a quote if its stored `lock_version` still matches
    async fn delete_quote(&self, tenant_id: TenantId, id: QuoteId, lock_version: u64) -> Result<(), PortError>;

    async fn get_booking(&self, tenant_id: TenantId, id: BookingId) -> Result<Option<Booking>, PortError>;

    async fn get_invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    /// Sent and partially paid invoices due before `before`
    async fn list_invoices_due_before(&self, tenant_id: TenantId, before: NaiveDate) -> Result<Vec<Invoice>, PortError>;

    async fn get_payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, PortError>;

    async fn find_payment_by_gateway_id(
        &self,
        tenant_id: TenantId,
        gateway_transaction_id: &str,
    ) -> Result<Option<Payment>, PortError>;

    /// Payments of a booking, oldest first
    async fn list_payments_for_booking(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<Vec<Payment>, PortError>;

    /// Tenant owning a gateway charge; gateway ids are globally unique
    async fn locate_gateway_charge(&self, gateway_transaction_id: &str) -> Result<Option<TenantId>, PortError>;

    async fn is_event_processed(&self, tenant_id: TenantId, event_id: &str) -> Result<bool, PortError>;

    async fn commit(&self, changes: ChangeSet) -> Result<CommitOutcome, PortError>;

    /// Drops processed-event records older than `older_than`, returning the count
    async fn purge_processed_events(&self, older_than: DateTime<Utc>) -> Result<u64, PortError>;
}

/// Itinerary data a quote is priced from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItinerarySummary {
    pub id: ItineraryId,
    pub title: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[async_trait]
pub trait ItineraryCatalog: DomainPort {
    async fn get_itinerary(&self, tenant_id: TenantId, id: ItineraryId) -> Result<Option<ItinerarySummary>, PortError>;
}

#[async_trait]
pub trait Mailer: DomainPort {
    async fn send_email(
        &self,
        tenant_id: TenantId,
        to: &str,
        template: &str,
        data: serde_json::Value,
    ) -> Result<(), PortError>;
}

#[async_trait]
pub trait DocumentRenderer: DomainPort {
    /// Renders a document to PDF and returns where it can be fetched
    async fn render_pdf(
        &self,
        tenant_id: TenantId,
        document_number: &str,
        document: serde_json::Value,
    ) -> Result<String, PortError>;
}
