//! In-memory adapters for the application ports

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};

use core_kernel::{BookingId, DomainPort, InvoiceId, ItineraryId, PaymentId, PortError, QuoteId, TenantId};
use domain_billing::{Invoice, Payment};
use domain_booking::Booking;
use domain_quote::Quote;

use crate::invoice_service::is_sweep_candidate;
use crate::ports::{
    ChangeSet, CommitOutcome, DocumentRenderer, FinancialStore, ItinerarySummary, ItineraryCatalog, Mailer,
    ProcessedEvent,
};

#[derive(Debug, Default)]
struct Documents {
    quotes: HashMap<(TenantId, QuoteId), Quote>,
    bookings: HashMap<(TenantId, BookingId), Booking>,
    invoices: HashMap<(TenantId, InvoiceId), Invoice>,
    payments: HashMap<(TenantId, PaymentId), Payment>,
    processed: HashMap<(TenantId, String), ProcessedEvent>,
}

/// Financial store holding every document behind one mutex, so a commit
/// is checked and applied as a unit
#[derive(Debug, Default)]
pub struct InMemoryFinancialStore {
    documents: Arc<Mutex<Documents>>,
    injected_conflicts: AtomicU32,
}

impl InMemoryFinancialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with a version conflict
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    pub async fn payments(&self, tenant_id: TenantId) -> Vec<Payment> {
        let docs = self.documents.lock().await;
        let mut payments: Vec<_> = docs
            .payments
            .iter()
            .filter(|((tenant, _), _)| *tenant == tenant_id)
            .map(|(_, p)| p.clone())
            .collect();
        payments.sort_by_key(|p| p.created_at());
        payments
    }

    pub async fn processed_events(&self, tenant_id: TenantId) -> Vec<ProcessedEvent> {
        let docs = self.documents.lock().await;
        docs.processed
            .iter()
            .filter(|((tenant, _), _)| *tenant == tenant_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Inserts need an unused key; updates need the stored version
fn check_version<K: Eq + Hash, T>(
    stored: &HashMap<K, T>,
    key: &K,
    incoming: u64,
    version_of: impl Fn(&T) -> u64,
    entity: &str,
) -> Result<(), PortError> {
    match (stored.get(key), incoming) {
        (None, 0) => Ok(()),
        (Some(_), 0) => Err(PortError::conflict(format!("{} already exists", entity))),
        (None, _) => Err(PortError::conflict(format!("{} was deleted", entity))),
        (Some(current), expected) if version_of(current) == expected => Ok(()),
        (Some(current), expected) => Err(PortError::conflict(format!(
            "{} version {} does not match stored {}",
            entity,
            expected,
            version_of(current)
        ))),
    }
}

fn check_natural_key<'a, T: 'a>(
    mut existing: impl Iterator<Item = &'a T>,
    clashes: impl Fn(&T) -> bool,
    description: impl Fn() -> String,
) -> Result<(), PortError> {
    if existing.any(clashes) {
        return Err(PortError::conflict(format!("duplicate {}", description())));
    }
    Ok(())
}

impl Documents {
    fn validate(&self, changes: &ChangeSet) -> Result<(), PortError> {
        for quote in &changes.quotes {
            let key = (quote.tenant_id(), quote.id());
            check_version(&self.quotes, &key, quote.lock_version(), Quote::lock_version, "quote")?;
            check_natural_key(
                self.quotes.values(),
                |q| {
                    q.id() != quote.id()
                        && q.tenant_id() == quote.tenant_id()
                        && q.quote_number() == quote.quote_number()
                        && q.version() == quote.version()
                },
                || format!("quote number {} v{}", quote.quote_number(), quote.version()),
            )?;
        }
        for booking in &changes.bookings {
            let key = (booking.tenant_id(), booking.id());
            check_version(&self.bookings, &key, booking.lock_version(), Booking::lock_version, "booking")?;
            check_natural_key(
                self.bookings.values(),
                |b| {
                    b.id() != booking.id()
                        && b.tenant_id() == booking.tenant_id()
                        && b.booking_number() == booking.booking_number()
                },
                || format!("booking number {}", booking.booking_number()),
            )?;
        }
        for invoice in &changes.invoices {
            let key = (invoice.tenant_id(), invoice.id());
            check_version(&self.invoices, &key, invoice.lock_version(), Invoice::lock_version, "invoice")?;
            check_natural_key(
                self.invoices.values(),
                |i| {
                    i.id() != invoice.id()
                        && i.tenant_id() == invoice.tenant_id()
                        && i.invoice_number() == invoice.invoice_number()
                },
                || format!("invoice number {}", invoice.invoice_number()),
            )?;
        }
        for payment in &changes.payments {
            let key = (payment.tenant_id(), payment.id());
            check_version(&self.payments, &key, payment.lock_version(), Payment::lock_version, "payment")?;
            check_natural_key(
                self.payments.values(),
                |p| {
                    p.id() != payment.id()
                        && p.tenant_id() == payment.tenant_id()
                        && p.transaction_id() == payment.transaction_id()
                },
                || format!("transaction id {}", payment.transaction_id()),
            )?;
        }
        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) -> ChangeSet {
        let mut applied = ChangeSet::new();
        for mut quote in changes.quotes {
            quote.set_lock_version(quote.lock_version() + 1);
            self.quotes.insert((quote.tenant_id(), quote.id()), quote.clone());
            applied = applied.with_quote(quote);
        }
        for mut booking in changes.bookings {
            booking.set_lock_version(booking.lock_version() + 1);
            self.bookings.insert((booking.tenant_id(), booking.id()), booking.clone());
            applied = applied.with_booking(booking);
        }
        for mut invoice in changes.invoices {
            invoice.set_lock_version(invoice.lock_version() + 1);
            self.invoices.insert((invoice.tenant_id(), invoice.id()), invoice.clone());
            applied = applied.with_invoice(invoice);
        }
        for mut payment in changes.payments {
            payment.set_lock_version(payment.lock_version() + 1);
            self.payments.insert((payment.tenant_id(), payment.id()), payment.clone());
            applied = applied.with_payment(payment);
        }
        if let Some(event) = changes.processed_event {
            self.processed
                .insert((event.tenant_id, event.event_id.clone()), event.clone());
            applied = applied.with_processed_event(event);
        }
        applied
    }
}

impl DomainPort for InMemoryFinancialStore {}

#[async_trait]
impl FinancialStore for InMemoryFinancialStore {
    async fn get_quote(&self, tenant_id: TenantId, id: QuoteId) -> Result<Option<Quote>, PortError> {
        Ok(self.documents.lock().await.quotes.get(&(tenant_id, id)).cloned())
    }

    async fn list_quote_versions(&self, tenant_id: TenantId, quote_number: &str) -> Result<Vec<Quote>, PortError> {
        let docs = self.documents.lock().await;
        let mut versions: Vec<_> = docs
            .quotes
            .values()
            .filter(|q| q.tenant_id() == tenant_id && q.quote_number() == quote_number)
            .cloned()
            .collect();
        versions.sort_by_key(|q| q.version());
        Ok(versions)
    }

    async fn delete_quote(&self, tenant_id: TenantId, id: QuoteId, lock_version: u64) -> Result<(), PortError> {
        let mut docs = self.documents.lock().await;
        let key = (tenant_id, id);
        match docs.quotes.get(&key) {
            None => Err(PortError::not_found("Quote", id)),
            Some(stored) if stored.lock_version() != lock_version => {
                Err(PortError::conflict(format!("quote {} changed before delete", id)))
            }
            Some(_) => {
                docs.quotes.remove(&key);
                Ok(())
            }
        }
    }

    async fn get_booking(&self, tenant_id: TenantId, id: BookingId) -> Result<Option<Booking>, PortError> {
        Ok(self.documents.lock().await.bookings.get(&(tenant_id, id)).cloned())
    }

    async fn get_invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(self.documents.lock().await.invoices.get(&(tenant_id, id)).cloned())
    }

    async fn list_invoices_due_before(&self, tenant_id: TenantId, before: NaiveDate) -> Result<Vec<Invoice>, PortError> {
        let docs = self.documents.lock().await;
        Ok(docs
            .invoices
            .values()
            .filter(|i| i.tenant_id() == tenant_id && is_sweep_candidate(i, before))
            .cloned()
            .collect())
    }

    async fn get_payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(self.documents.lock().await.payments.get(&(tenant_id, id)).cloned())
    }

    async fn find_payment_by_gateway_id(
        &self,
        tenant_id: TenantId,
        gateway_transaction_id: &str,
    ) -> Result<Option<Payment>, PortError> {
        let docs = self.documents.lock().await;
        Ok(docs
            .payments
            .values()
            .find(|p| {
                p.tenant_id() == tenant_id
                    && p.gateway().is_some_and(|g| g.gateway_transaction_id == gateway_transaction_id)
            })
            .cloned())
    }

    async fn list_payments_for_booking(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<Vec<Payment>, PortError> {
        Ok(self
            .payments(tenant_id)
            .await
            .into_iter()
            .filter(|p| p.booking_id() == booking_id)
            .collect())
    }

    async fn locate_gateway_charge(&self, gateway_transaction_id: &str) -> Result<Option<TenantId>, PortError> {
        let docs = self.documents.lock().await;
        Ok(docs
            .payments
            .values()
            .find(|p| p.gateway().is_some_and(|g| g.gateway_transaction_id == gateway_transaction_id))
            .map(|p| p.tenant_id()))
    }

    async fn is_event_processed(&self, tenant_id: TenantId, event_id: &str) -> Result<bool, PortError> {
        let docs = self.documents.lock().await;
        Ok(docs.processed.contains_key(&(tenant_id, event_id.to_string())))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<CommitOutcome, PortError> {
        let mut docs = self.documents.lock().await;
        if self.take_injected_conflict() {
            return Err(PortError::conflict("injected conflict"));
        }
        if let Some(event) = &changes.processed_event {
            if docs.processed.contains_key(&(event.tenant_id, event.event_id.clone())) {
                return Ok(CommitOutcome::DuplicateEvent);
            }
        }
        docs.validate(&changes)?;
        Ok(CommitOutcome::Applied(docs.apply(changes)))
    }

    async fn purge_processed_events(&self, older_than: DateTime<Utc>) -> Result<u64, PortError> {
        let mut docs = self.documents.lock().await;
        let before = docs.processed.len();
        docs.processed.retain(|_, event| event.processed_at >= older_than);
        Ok((before - docs.processed.len()) as u64)
    }
}

#[derive(Debug, Default)]
pub struct MockItineraryCatalog {
    itineraries: Arc<RwLock<HashMap<(TenantId, ItineraryId), ItinerarySummary>>>,
}

impl MockItineraryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, tenant_id: TenantId, itinerary: ItinerarySummary) {
        self.itineraries
            .write()
            .await
            .insert((tenant_id, itinerary.id), itinerary);
    }
}

impl DomainPort for MockItineraryCatalog {}

#[async_trait]
impl ItineraryCatalog for MockItineraryCatalog {
    async fn get_itinerary(&self, tenant_id: TenantId, id: ItineraryId) -> Result<Option<ItinerarySummary>, PortError> {
        Ok(self.itineraries.read().await.get(&(tenant_id, id)).cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub tenant_id: TenantId,
    pub to: String,
    pub template: String,
    pub data: serde_json::Value,
}

/// Mailer that keeps every message instead of sending it
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

impl DomainPort for RecordingMailer {}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(
        &self,
        tenant_id: TenantId,
        to: &str,
        template: &str,
        data: serde_json::Value,
    ) -> Result<(), PortError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::connection("mail relay unavailable"));
        }
        self.sent.lock().await.push(SentEmail {
            tenant_id,
            to: to.to_string(),
            template: template.to_string(),
            data,
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockDocumentRenderer {
    rendered: Arc<Mutex<Vec<String>>>,
}

impl MockDocumentRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rendered(&self) -> Vec<String> {
        self.rendered.lock().await.clone()
    }
}

impl DomainPort for MockDocumentRenderer {}

#[async_trait]
impl DocumentRenderer for MockDocumentRenderer {
    async fn render_pdf(
        &self,
        tenant_id: TenantId,
        document_number: &str,
        _document: serde_json::Value,
    ) -> Result<String, PortError> {
        self.rendered.lock().await.push(document_number.to_string());
        Ok(format!("https://documents.test/{}/{}.pdf", tenant_id, document_number))
    }
}
