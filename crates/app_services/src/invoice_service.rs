//! Invoice operations
//!
//! Payments against an invoice that belongs to a booking go through
//! [`BookingService::add_payment`] so the Payment record, the booking
//! sub-ledger and the invoice move together.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, instrument, warn};

use core_kernel::{BookingId, Currency, InvoiceId, Money, PaymentMethod, QuoteId, TenantId};
use domain_billing::{BillTo, Invoice, InvoiceItem, InvoiceItemType, InvoiceStatus, NewInvoice};
use domain_booking::NewLedgerEntry;
use domain_reconciliation::{PaymentGateway, PaymentIntent, PaymentIntentRequest, ReconciliationError};
use domain_sequence::DocumentKind;

use crate::booking_service::{AddPaymentInput, BookingService};
use crate::context::{committed, with_conflict_retry, Actor, ServiceContext};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{ChangeSet, Mailer};

#[derive(Debug, Clone)]
pub struct CreateInvoiceInput {
    pub booking_id: Option<BookingId>,
    pub quote_id: Option<QuoteId>,
    pub bill_to: BillTo,
    /// Defaults to today in the tenant's timezone
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub currency: Currency,
    pub items: Vec<InvoiceItem>,
    pub tax: Option<Money>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MarkPaidInput {
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

#[derive(Clone)]
pub struct InvoiceService {
    ctx: ServiceContext,
    bookings: BookingService,
    mailer: Arc<dyn Mailer>,
    gateway: Arc<dyn PaymentGateway>,
}

impl InvoiceService {
    pub fn new(
        ctx: ServiceContext,
        bookings: BookingService,
        mailer: Arc<dyn Mailer>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ctx,
            bookings,
            mailer,
            gateway,
        }
    }

    #[instrument(skip(self, input), fields(tenant_id = %actor.tenant_id))]
    pub async fn create_invoice(&self, actor: &Actor, input: CreateInvoiceInput) -> ServiceResult<Invoice> {
        if let Some(booking_id) = input.booking_id {
            self.ctx
                .store
                .get_booking(actor.tenant_id, booking_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Booking", booking_id))?;
        }

        let now = self.ctx.clock.now();
        let issue_date = match input.issue_date {
            Some(date) => date,
            None => self.ctx.tenant_today(actor.tenant_id).await?,
        };
        let number = self
            .ctx
            .allocator
            .allocate(actor.tenant_id, DocumentKind::Invoice, now)
            .await?;
        let invoice = Invoice::new(
            NewInvoice {
                tenant_id: actor.tenant_id,
                booking_id: input.booking_id,
                quote_id: input.quote_id,
                bill_to: input.bill_to,
                issue_date,
                due_date: input.due_date,
                currency: input.currency,
                items: input.items,
                tax: input.tax,
                notes: input.notes,
            },
            number,
            now,
        )?;

        let invoice = self.save(invoice).await?;
        info!(
            invoice_number = %invoice.invoice_number(),
            total = %invoice.total(),
            due_date = %invoice.due_date(),
            "Invoice created"
        );
        Ok(invoice)
    }

    /// Bills a booking's outstanding balance, or `amount` of it
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn create_invoice_from_booking(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        due_date: NaiveDate,
        amount: Option<Money>,
    ) -> ServiceResult<Invoice> {
        let booking = self
            .ctx
            .store
            .get_booking(actor.tenant_id, booking_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Booking", booking_id))?;

        let amount = amount.unwrap_or_else(|| booking.balance_due());
        if !amount.is_positive() {
            return Err(ServiceError::validation(format!(
                "booking {} has no outstanding balance",
                booking.booking_number()
            )));
        }
        if amount > booking.balance_due() {
            return Err(ServiceError::validation(format!(
                "invoice amount {} exceeds balance due {}",
                amount,
                booking.balance_due()
            )));
        }

        let customer = booking.customer();
        let input = CreateInvoiceInput {
            booking_id: Some(booking_id),
            quote_id: booking.quote_id(),
            bill_to: BillTo {
                customer_id: customer.customer_id,
                name: customer.name.clone(),
                email: customer.email.clone(),
            },
            issue_date: None,
            due_date,
            currency: amount.currency(),
            items: vec![InvoiceItem::new(
                format!("Balance for booking {} ({})", booking.booking_number(), booking.destination()),
                InvoiceItemType::Balance,
                amount,
            )],
            tax: None,
            notes: None,
        };
        self.create_invoice(actor, input).await
    }

    /// Loads an invoice, reclassifying it as overdue when past due
    pub async fn get_invoice(&self, actor: &Actor, invoice_id: InvoiceId) -> ServiceResult<Invoice> {
        let today = self.ctx.tenant_today(actor.tenant_id).await?;
        let mut invoice = self.load(actor, invoice_id).await?;
        if invoice.classify_overdue(today, self.ctx.clock.now()) {
            invoice = self.save(invoice).await?;
            info!(invoice_number = %invoice.invoice_number(), "Invoice classified overdue");
        }
        Ok(invoice)
    }

    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn send_invoice(&self, actor: &Actor, invoice_id: InvoiceId, recipient: Option<&str>) -> ServiceResult<Invoice> {
        let mut invoice = self.load(actor, invoice_id).await?;
        let recipient = recipient.unwrap_or(&invoice.bill_to().email).to_string();
        invoice.mark_as_sent(&recipient, self.ctx.clock.now())?;

        self.mailer
            .send_email(
                actor.tenant_id,
                &recipient,
                "invoice_sent",
                json!({
                    "invoice_number": invoice.invoice_number(),
                    "customer_name": invoice.bill_to().name,
                    "total": invoice.total().to_string(),
                    "amount_due": invoice.amount_due().to_string(),
                    "due_date": invoice.due_date(),
                }),
            )
            .await?;

        let invoice = self.save(invoice).await?;
        info!(invoice_number = %invoice.invoice_number(), recipient = %recipient, "Invoice sent");
        Ok(invoice)
    }

    /// Records a manual payment. Booking-linked invoices also get a Payment
    /// record and a booking ledger entry.
    #[instrument(skip(self, input), fields(tenant_id = %actor.tenant_id, amount = %input.amount))]
    pub async fn mark_invoice_paid(&self, actor: &Actor, invoice_id: InvoiceId, input: MarkPaidInput) -> ServiceResult<Invoice> {
        let invoice = self.load(actor, invoice_id).await?;

        if let Some(booking_id) = invoice.booking_id() {
            let mut payment = AddPaymentInput::completed(input.amount, input.method).for_invoice(invoice_id);
            payment.reference = input.reference;
            let recorded = self.bookings.add_payment(actor, booking_id, payment).await?;
            return committed(recorded.invoice, "invoice");
        }

        let input = &input;
        let invoice = with_conflict_retry(self.ctx.max_conflict_retries, "mark_invoice_paid", move || async move {
            let mut invoice = self.load(actor, invoice_id).await?;
            invoice.mark_as_paid(input.amount, input.method, input.reference.clone(), self.ctx.clock.now())?;
            self.save(invoice).await
        })
        .await?;
        info!(
            invoice_number = %invoice.invoice_number(),
            amount_paid = %invoice.amount_paid(),
            amount_due = %invoice.amount_due(),
            status = %invoice.status(),
            "Invoice payment recorded"
        );
        Ok(invoice)
    }

    /// Refunds money collected on an invoice.
    ///
    /// For booking-linked invoices the refund is spread over the invoice's
    /// payments, newest first, and mirrored into the booking ledger.
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id, amount = %amount))]
    pub async fn refund_invoice(
        &self,
        actor: &Actor,
        invoice_id: InvoiceId,
        amount: Money,
        reason: &str,
    ) -> ServiceResult<Invoice> {
        let invoice = with_conflict_retry(self.ctx.max_conflict_retries, "refund_invoice", move || {
            self.try_refund(actor, invoice_id, amount, reason)
        })
        .await?;
        info!(
            invoice_number = %invoice.invoice_number(),
            amount_paid = %invoice.amount_paid(),
            status = %invoice.status(),
            "Invoice refunded"
        );
        Ok(invoice)
    }

    async fn try_refund(&self, actor: &Actor, invoice_id: InvoiceId, amount: Money, reason: &str) -> ServiceResult<Invoice> {
        let now = self.ctx.clock.now();
        let mut invoice = self.load(actor, invoice_id).await?;
        invoice.refund(amount, reason, now)?;

        let mut changes = ChangeSet::new();
        if let Some(booking_id) = invoice.booking_id() {
            let today = self.ctx.tenant_today(actor.tenant_id).await?;
            let mut booking = self
                .ctx
                .store
                .get_booking(actor.tenant_id, booking_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Booking", booking_id))?;

            let mut payments: Vec<_> = self
                .ctx
                .store
                .list_payments_for_booking(actor.tenant_id, booking_id)
                .await?
                .into_iter()
                .filter(|p| p.invoice_id() == Some(invoice_id) && p.status().has_settled())
                .collect();
            payments.sort_by_key(|p| std::cmp::Reverse(p.created_at()));

            let mut remaining = amount;
            for mut payment in payments {
                if !remaining.is_positive() {
                    break;
                }
                let refundable = payment.amount().checked_sub(&payment.amount_refunded())?;
                let portion = remaining.min(refundable)?;
                if !portion.is_positive() {
                    continue;
                }
                let delta = payment.refund_amount(portion, reason, now)?;
                remaining = remaining.checked_sub(&delta)?;
                booking.add_payment(
                    NewLedgerEntry::completed_refund(delta, payment.method())
                        .with_payment(payment.id(), payment.transaction_id()),
                    now,
                    today,
                )?;
                changes = changes.with_payment(payment);
            }
            if remaining.is_positive() {
                warn!(
                    invoice_number = %invoice.invoice_number(),
                    unallocated = %remaining,
                    "Refund exceeds refundable payments; booking ledger only reflects the allocated part"
                );
            }
            changes = changes.with_booking(booking);
        }

        committed(self.ctx.commit(changes.with_invoice(invoice)).await?.take_invoice(), "invoice")
    }

    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn mark_invoice_overdue(&self, actor: &Actor, invoice_id: InvoiceId) -> ServiceResult<Invoice> {
        with_conflict_retry(self.ctx.max_conflict_retries, "mark_invoice_overdue", move || async move {
            let mut invoice = self.load(actor, invoice_id).await?;
            invoice.mark_as_overdue(self.ctx.clock.now())?;
            self.save(invoice).await
        })
        .await
    }

    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn cancel_invoice(&self, actor: &Actor, invoice_id: InvoiceId, reason: &str) -> ServiceResult<Invoice> {
        let invoice = with_conflict_retry(self.ctx.max_conflict_retries, "cancel_invoice", move || async move {
            let mut invoice = self.load(actor, invoice_id).await?;
            invoice.cancel(reason, self.ctx.clock.now())?;
            self.save(invoice).await
        })
        .await?;
        info!(invoice_number = %invoice.invoice_number(), reason, "Invoice cancelled");
        Ok(invoice)
    }

    pub async fn add_internal_note(&self, actor: &Actor, invoice_id: InvoiceId, text: &str) -> ServiceResult<Invoice> {
        let author = actor.user_id.to_string();
        let author = author.as_str();
        with_conflict_retry(self.ctx.max_conflict_retries, "add_internal_note", move || async move {
            let mut invoice = self.load(actor, invoice_id).await?;
            invoice.add_internal_note(author, text, self.ctx.clock.now());
            self.save(invoice).await
        })
        .await
    }

    /// Reclassifies every sent or partially paid invoice past its due date.
    ///
    /// Invoices modified concurrently are left for the next sweep.
    #[instrument(skip(self))]
    pub async fn sweep_overdue_invoices(&self, tenant_id: TenantId) -> ServiceResult<usize> {
        let today = self.ctx.tenant_today(tenant_id).await?;
        let now = self.ctx.clock.now();
        let candidates = self.ctx.store.list_invoices_due_before(tenant_id, today).await?;

        let mut reclassified = 0;
        for mut invoice in candidates {
            if !invoice.classify_overdue(today, now) {
                continue;
            }
            let number = invoice.invoice_number().to_string();
            match self.save(invoice).await {
                Ok(_) => reclassified += 1,
                Err(e) if e.is_conflict() => {
                    warn!(invoice_number = %number, "Invoice changed during overdue sweep, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        info!(tenant_id = %tenant_id, reclassified, "Overdue sweep finished");
        Ok(reclassified)
    }

    /// Opens a gateway payment intent for the invoice's amount due (or
    /// `amount`) and records it on the invoice
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn create_payment_intent(
        &self,
        actor: &Actor,
        invoice_id: InvoiceId,
        amount: Option<Money>,
    ) -> ServiceResult<PaymentIntent> {
        let invoice = self.load(actor, invoice_id).await?;
        invoice.ensure_collectable()?;

        let amount = amount.unwrap_or_else(|| invoice.amount_due());
        if !amount.is_positive() {
            return Err(ServiceError::validation("payment intent amount must be positive"));
        }
        invoice.amount_due().ensure_same_currency(&amount)?;
        if amount > invoice.amount_due() {
            return Err(ServiceError::validation(format!(
                "payment intent amount {} exceeds amount due {}",
                amount,
                invoice.amount_due()
            )));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("tenant_id".to_string(), actor.tenant_id.to_string());
        metadata.insert("invoice_id".to_string(), invoice_id.to_string());
        if let Some(booking_id) = invoice.booking_id() {
            metadata.insert("booking_id".to_string(), booking_id.to_string());
        }
        let minor = amount.to_minor()?;
        let request = PaymentIntentRequest {
            amount,
            description: Some(format!("Invoice {}", invoice.invoice_number())),
            metadata,
            idempotency_key: format!("{}-{}-{}", invoice_id, minor, invoice.lock_version()),
        };
        let intent = self
            .gateway
            .create_payment_intent(&request)
            .await
            .map_err(ReconciliationError::Gateway)?;

        let provider = self.gateway.provider();
        let intent_id = intent.id.as_str();
        let invoice = with_conflict_retry(self.ctx.max_conflict_retries, "create_payment_intent", move || async move {
            let mut invoice = self.load(actor, invoice_id).await?;
            invoice.record_payment_intent(provider, intent_id, self.ctx.clock.now())?;
            self.save(invoice).await
        })
        .await?;

        info!(
            invoice_number = %invoice.invoice_number(),
            payment_intent_id = %intent.id,
            amount = %amount,
            "Payment intent created"
        );
        Ok(intent)
    }

    async fn load(&self, actor: &Actor, invoice_id: InvoiceId) -> ServiceResult<Invoice> {
        self.ctx
            .store
            .get_invoice(actor.tenant_id, invoice_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice", invoice_id))
    }

    async fn save(&self, invoice: Invoice) -> ServiceResult<Invoice> {
        committed(self.ctx.commit(ChangeSet::new().with_invoice(invoice)).await?.take_invoice(), "invoice")
    }
}

/// Invoices past due that the sweep would touch
pub fn is_sweep_candidate(invoice: &Invoice, today: NaiveDate) -> bool {
    matches!(invoice.status(), InvoiceStatus::Sent | InvoiceStatus::Partial) && invoice.due_date() < today
}
