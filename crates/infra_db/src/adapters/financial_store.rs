//! PostgreSQL Financial Store
//!
//! Implements [`FinancialStore`] over the JSONB document tables. A commit runs
//! in one transaction: the processed-event row goes in first so a replayed
//! webhook stops before touching any document, then every document is
//! inserted or version-checked and replaced.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use app_services::{ChangeSet, CommitOutcome, FinancialStore};
use core_kernel::{
    AdapterHealth, BookingId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, PaymentId, PortError,
    QuoteId, TenantId,
};
use domain_billing::{Invoice, Payment};
use domain_booking::Booking;
use domain_quote::Quote;

use crate::error::DatabaseError;
use crate::repositories::documents::{save_booking, save_invoice, save_payment, save_quote};
use crate::repositories::events::record_event;
use crate::repositories::{DocumentRepository, ProcessedEventRepository};

const ADAPTER_ID: &str = "postgres-financial-store";

#[derive(Debug, Clone)]
pub struct PostgresFinancialStore {
    pool: PgPool,
    documents: DocumentRepository,
    events: ProcessedEventRepository,
}

impl PostgresFinancialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            documents: DocumentRepository::new(pool.clone()),
            events: ProcessedEventRepository::new(pool.clone()),
            pool,
        }
    }

    async fn write(&self, mut changes: ChangeSet) -> Result<CommitOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        if let Some(event) = &changes.processed_event {
            if !record_event(&mut *tx, event).await? {
                tx.rollback().await?;
                debug!(event_id = %event.event_id, "Gateway event already recorded");
                return Ok(CommitOutcome::DuplicateEvent);
            }
        }

        for quote in changes.quotes.iter_mut() {
            let version = save_quote(&mut *tx, quote).await?;
            quote.set_lock_version(version);
        }
        for booking in changes.bookings.iter_mut() {
            let version = save_booking(&mut *tx, booking).await?;
            booking.set_lock_version(version);
        }
        for invoice in changes.invoices.iter_mut() {
            let version = save_invoice(&mut *tx, invoice).await?;
            invoice.set_lock_version(version);
        }
        for payment in changes.payments.iter_mut() {
            let version = save_payment(&mut *tx, payment).await?;
            payment.set_lock_version(version);
        }

        tx.commit().await?;
        Ok(CommitOutcome::Applied(changes))
    }
}

impl DomainPort for PostgresFinancialStore {}

#[async_trait]
impl HealthCheckable for PostgresFinancialStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

impl PostgresFinancialStore {
    /// True when the pool answers a trivial query
    pub async fn is_ready(&self) -> bool {
        self.health_check().await.status == AdapterHealth::Healthy
    }
}

#[async_trait]
impl FinancialStore for PostgresFinancialStore {
    async fn get_quote(&self, tenant_id: TenantId, id: QuoteId) -> Result<Option<Quote>, PortError> {
        Ok(self.documents.find(tenant_id, *id.as_uuid()).await?)
    }

    async fn list_quote_versions(&self, tenant_id: TenantId, quote_number: &str) -> Result<Vec<Quote>, PortError> {
        Ok(self.documents.quote_versions(tenant_id, quote_number).await?)
    }

    async fn delete_quote(&self, tenant_id: TenantId, id: QuoteId, lock_version: u64) -> Result<(), PortError> {
        Ok(self.documents.delete_quote(tenant_id, *id.as_uuid(), lock_version).await?)
    }

    async fn get_booking(&self, tenant_id: TenantId, id: BookingId) -> Result<Option<Booking>, PortError> {
        Ok(self.documents.find(tenant_id, *id.as_uuid()).await?)
    }

    async fn get_invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(self.documents.find(tenant_id, *id.as_uuid()).await?)
    }

    async fn list_invoices_due_before(&self, tenant_id: TenantId, before: NaiveDate) -> Result<Vec<Invoice>, PortError> {
        Ok(self.documents.invoices_due_before(tenant_id, before).await?)
    }

    async fn get_payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(self.documents.find(tenant_id, *id.as_uuid()).await?)
    }

    async fn find_payment_by_gateway_id(
        &self,
        tenant_id: TenantId,
        gateway_transaction_id: &str,
    ) -> Result<Option<Payment>, PortError> {
        Ok(self.documents.payment_by_gateway_id(tenant_id, gateway_transaction_id).await?)
    }

    async fn list_payments_for_booking(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<Vec<Payment>, PortError> {
        Ok(self.documents.payments_for_booking(tenant_id, booking_id).await?)
    }

    async fn locate_gateway_charge(&self, gateway_transaction_id: &str) -> Result<Option<TenantId>, PortError> {
        Ok(self.documents.tenant_for_gateway_charge(gateway_transaction_id).await?)
    }

    async fn is_event_processed(&self, tenant_id: TenantId, event_id: &str) -> Result<bool, PortError> {
        Ok(self.events.exists(tenant_id, event_id).await?)
    }

    #[instrument(skip(self, changes), fields(
        quotes = changes.quotes.len(),
        bookings = changes.bookings.len(),
        invoices = changes.invoices.len(),
        payments = changes.payments.len(),
    ))]
    async fn commit(&self, changes: ChangeSet) -> Result<CommitOutcome, PortError> {
        Ok(self.write(changes).await?)
    }

    async fn purge_processed_events(&self, older_than: DateTime<Utc>) -> Result<u64, PortError> {
        Ok(self.events.purge_older_than(older_than).await?)
    }
}
