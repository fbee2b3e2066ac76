//! Booking operations and the payment flows that keep Payment, Booking and
//! Invoice in step
//!
//! Every money movement is written as one change set: the payment record,
//! the booking's sub-ledger entry and, when linked, the invoice amounts.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, instrument};

use core_kernel::{BookingId, InvoiceId, ItineraryId, Money, PaymentId, PaymentMethod, QuoteId};
use domain_billing::{GatewayLink, Invoice, NewPayment, Payment};
use domain_booking::{
    Booking, BookingCustomer, BookingStatus, EntryStatus, NewBooking, NewLedgerEntry, Traveler,
};
use domain_sequence::DocumentKind;

use crate::context::{committed, with_conflict_retry, Actor, ServiceContext};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::ChangeSet;

#[derive(Debug, Clone)]
pub struct CreateBookingInput {
    pub quote_id: Option<QuoteId>,
    pub itinerary_id: Option<ItineraryId>,
    pub customer: BookingCustomer,
    pub travelers: Vec<Traveler>,
    pub travel_start: NaiveDate,
    pub travel_end: NaiveDate,
    pub destination: String,
    pub total_price: Money,
    pub deposit_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddPaymentInput {
    pub amount: Money,
    pub method: PaymentMethod,
    /// Completed unless stated otherwise
    pub status: EntryStatus,
    pub invoice_id: Option<InvoiceId>,
    pub gateway: Option<GatewayLink>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl AddPaymentInput {
    pub fn completed(amount: Money, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            status: EntryStatus::Completed,
            invoice_id: None,
            gateway: None,
            reference: None,
            notes: None,
        }
    }

    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }
}

/// Documents written by a payment operation
#[derive(Debug, Clone)]
pub struct RecordedPayment {
    pub booking: Booking,
    pub payment: Payment,
    pub invoice: Option<Invoice>,
}

#[derive(Clone)]
pub struct BookingService {
    ctx: ServiceContext,
}

impl BookingService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, input), fields(tenant_id = %actor.tenant_id))]
    pub async fn create_booking(&self, actor: &Actor, input: CreateBookingInput) -> ServiceResult<Booking> {
        let now = self.ctx.clock.now();
        let today = self.ctx.tenant_today(actor.tenant_id).await?;

        if let Some(quote_id) = input.quote_id {
            self.ctx
                .store
                .get_quote(actor.tenant_id, quote_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Quote", quote_id))?;
        }
        if input.travel_end < input.travel_start {
            return Err(ServiceError::validation("travel end date cannot precede start date"));
        }

        let number = self
            .ctx
            .allocator
            .allocate(actor.tenant_id, DocumentKind::Booking, now)
            .await?;
        let booking = Booking::new(
            NewBooking {
                tenant_id: actor.tenant_id,
                quote_id: input.quote_id,
                itinerary_id: input.itinerary_id,
                customer: input.customer,
                travelers: input.travelers,
                travel_start: input.travel_start,
                travel_end: input.travel_end,
                destination: input.destination,
                total_price: input.total_price,
                deposit_due_date: input.deposit_due_date,
                notes: input.notes,
                created_by: actor.user_id,
            },
            number,
            now,
            today,
        )?;

        let booking = self.save(booking).await?;
        info!(
            booking_number = %booking.booking_number(),
            total_price = %booking.pricing().total_price,
            "Booking created"
        );
        Ok(booking)
    }

    /// Loads a booking with its payment status classified for today
    pub async fn get_booking(&self, actor: &Actor, booking_id: BookingId) -> ServiceResult<Booking> {
        let mut booking = self.load(actor, booking_id).await?;
        let before = booking.payment_status();
        booking.recompute_payment_status(self.ctx.tenant_today(actor.tenant_id).await?)?;
        if booking.payment_status() != before {
            booking = self.save(booking).await?;
        }
        Ok(booking)
    }

    /// Payments recorded against a booking, oldest first
    pub async fn list_payments(&self, actor: &Actor, booking_id: BookingId) -> ServiceResult<Vec<Payment>> {
        self.load(actor, booking_id).await?;
        Ok(self
            .ctx
            .store
            .list_payments_for_booking(actor.tenant_id, booking_id)
            .await?)
    }

    pub async fn get_payment(&self, actor: &Actor, payment_id: PaymentId) -> ServiceResult<Payment> {
        self.load_payment(actor, payment_id).await
    }

    /// Records a payment against a booking and, when given, its invoice.
    ///
    /// Booking totals are recomputed under the booking's version check and
    /// retried on conflict, so concurrent payments never overwrite each other.
    #[instrument(skip(self, input), fields(tenant_id = %actor.tenant_id, amount = %input.amount))]
    pub async fn add_payment(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        input: AddPaymentInput,
    ) -> ServiceResult<RecordedPayment> {
        self.load(actor, booking_id).await?;
        let transaction_id = self
            .ctx
            .allocator
            .allocate(actor.tenant_id, DocumentKind::Transaction, self.ctx.clock.now())
            .await?;

        let (input, transaction_id) = (&input, &transaction_id);
        let recorded = with_conflict_retry(self.ctx.max_conflict_retries, "add_payment", move || {
            self.try_add_payment(actor, booking_id, input, transaction_id)
        })
        .await?;

        info!(
            booking_number = %recorded.booking.booking_number(),
            transaction_id = %recorded.payment.transaction_id(),
            amount = %recorded.payment.amount(),
            total_paid = %recorded.booking.total_paid(),
            balance_due = %recorded.booking.balance_due(),
            payment_status = %recorded.booking.payment_status(),
            "Payment recorded"
        );
        Ok(recorded)
    }

    async fn try_add_payment(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        input: &AddPaymentInput,
        transaction_id: &str,
    ) -> ServiceResult<RecordedPayment> {
        let now = self.ctx.clock.now();
        let today = self.ctx.tenant_today(actor.tenant_id).await?;
        let mut booking = self.load(actor, booking_id).await?;

        let new_payment = NewPayment {
            tenant_id: actor.tenant_id,
            transaction_id: transaction_id.to_string(),
            booking_id,
            invoice_id: input.invoice_id,
            amount: input.amount,
            method: input.method,
            gateway: input.gateway.clone(),
            reference: input.reference.clone(),
            notes: input.notes.clone(),
        };
        let payment = match input.status {
            EntryStatus::Completed => Payment::completed(new_payment, now)?,
            EntryStatus::Pending => Payment::pending(new_payment, now)?,
            EntryStatus::Failed => Payment::failed(new_payment, "recorded as failed", now)?,
        };

        let mut entry = NewLedgerEntry::completed_charge(input.amount, input.method)
            .with_payment(payment.id(), transaction_id)
            .with_status(input.status);
        entry.notes = input.notes.clone();
        if let Some(reference) = &input.reference {
            entry = entry.with_reference(reference.clone());
        }
        booking.add_payment(entry, now, today)?;

        let mut changes = ChangeSet::new();
        let linked_invoice = match input.invoice_id {
            Some(invoice_id) => {
                let mut invoice = self.load_invoice_for(actor, invoice_id, booking_id).await?;
                if input.status == EntryStatus::Completed {
                    invoice.mark_as_paid(input.amount, input.method, input.reference.clone(), now)?;
                }
                Some(invoice)
            }
            None => None,
        };
        if let Some(invoice) = linked_invoice {
            changes = changes.with_invoice(invoice);
        }

        let mut applied = self
            .ctx
            .commit(changes.with_booking(booking).with_payment(payment))
            .await?;
        Ok(RecordedPayment {
            booking: committed(applied.take_booking(), "booking")?,
            payment: committed(applied.take_payment(), "payment")?,
            invoice: applied.take_invoice(),
        })
    }

    /// Settles a pending payment as completed
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn complete_payment(&self, actor: &Actor, payment_id: PaymentId) -> ServiceResult<RecordedPayment> {
        with_conflict_retry(self.ctx.max_conflict_retries, "complete_payment", move || {
            self.try_settle(actor, payment_id, EntryStatus::Completed, None)
        })
        .await
    }

    /// Settles a pending payment as failed
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn fail_payment(&self, actor: &Actor, payment_id: PaymentId, reason: &str) -> ServiceResult<RecordedPayment> {
        with_conflict_retry(self.ctx.max_conflict_retries, "fail_payment", move || {
            self.try_settle(actor, payment_id, EntryStatus::Failed, Some(reason))
        })
        .await
    }

    async fn try_settle(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        outcome: EntryStatus,
        reason: Option<&str>,
    ) -> ServiceResult<RecordedPayment> {
        let now = self.ctx.clock.now();
        let today = self.ctx.tenant_today(actor.tenant_id).await?;
        let mut payment = self.load_payment(actor, payment_id).await?;
        let mut booking = self.load(actor, payment.booking_id()).await?;

        match outcome {
            EntryStatus::Failed => payment.fail(reason.unwrap_or("payment failed"), now)?,
            _ => payment.complete(now)?,
        }
        let entry_id = booking
            .entry_for_payment(payment_id)
            .map(|e| e.id)
            .ok_or_else(|| ServiceError::not_found("Ledger entry for payment", payment_id))?;
        booking.settle_payment(entry_id, outcome, now, today)?;

        let mut changes = ChangeSet::new();
        let mut invoice = None;
        if outcome == EntryStatus::Completed {
            if let Some(invoice_id) = payment.invoice_id() {
                let mut linked = self.load_invoice_for(actor, invoice_id, booking.id()).await?;
                linked.mark_as_paid(payment.amount(), payment.method(), payment.reference().map(str::to_string), now)?;
                invoice = Some(linked);
            }
        }
        if let Some(invoice) = invoice {
            changes = changes.with_invoice(invoice);
        }

        let mut applied = self
            .ctx
            .commit(changes.with_booking(booking).with_payment(payment))
            .await?;
        let recorded = RecordedPayment {
            booking: committed(applied.take_booking(), "booking")?,
            payment: committed(applied.take_payment(), "payment")?,
            invoice: applied.take_invoice(),
        };
        info!(
            transaction_id = %recorded.payment.transaction_id(),
            status = %recorded.payment.status(),
            payment_status = %recorded.booking.payment_status(),
            "Payment settled"
        );
        Ok(recorded)
    }

    /// Refunds part or all of a payment; the refund travels
    /// Payment, then Invoice, then Booking
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id, amount = %amount))]
    pub async fn refund_payment(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        amount: Money,
        reason: &str,
    ) -> ServiceResult<RecordedPayment> {
        let recorded = with_conflict_retry(self.ctx.max_conflict_retries, "refund_payment", move || {
            self.try_refund(actor, payment_id, amount, reason)
        })
        .await?;
        info!(
            transaction_id = %recorded.payment.transaction_id(),
            refunded = %recorded.payment.amount_refunded(),
            balance_due = %recorded.booking.balance_due(),
            "Payment refunded"
        );
        Ok(recorded)
    }

    async fn try_refund(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        amount: Money,
        reason: &str,
    ) -> ServiceResult<RecordedPayment> {
        let now = self.ctx.clock.now();
        let today = self.ctx.tenant_today(actor.tenant_id).await?;
        let mut payment = self.load_payment(actor, payment_id).await?;
        let mut booking = self.load(actor, payment.booking_id()).await?;

        let delta = payment.refund_amount(amount, reason, now)?;
        let mut invoice = match payment.invoice_id() {
            Some(invoice_id) => Some(self.load_invoice_for(actor, invoice_id, booking.id()).await?),
            None => None,
        };
        apply_refund(&mut booking, invoice.as_mut(), &payment, delta, reason, now, today)?;

        let mut changes = ChangeSet::new();
        if let Some(invoice) = invoice {
            changes = changes.with_invoice(invoice);
        }
        let mut applied = self
            .ctx
            .commit(changes.with_booking(booking).with_payment(payment))
            .await?;
        Ok(RecordedPayment {
            booking: committed(applied.take_booking(), "booking")?,
            payment: committed(applied.take_payment(), "payment")?,
            invoice: applied.take_invoice(),
        })
    }

    #[instrument(skip(self, reason, notes), fields(tenant_id = %actor.tenant_id, status = %status))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        status: BookingStatus,
        reason: Option<String>,
        notes: Option<String>,
    ) -> ServiceResult<Booking> {
        let (reason, notes) = (&reason, &notes);
        let booking = with_conflict_retry(self.ctx.max_conflict_retries, "update_booking_status", move || async move {
            let mut booking = self.load(actor, booking_id).await?;
            booking.update_status(status, actor.user_id, reason.clone(), notes.clone(), self.ctx.clock.now())?;
            self.save(booking).await
        })
        .await?;
        info!(booking_number = %booking.booking_number(), status = %booking.status(), "Booking status updated");
        Ok(booking)
    }

    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id, total_price = %total_price))]
    pub async fn update_total_price(
        &self,
        actor: &Actor,
        booking_id: BookingId,
        total_price: Money,
        deposit_due_date: Option<NaiveDate>,
    ) -> ServiceResult<Booking> {
        let booking = with_conflict_retry(self.ctx.max_conflict_retries, "update_total_price", move || async move {
            let today = self.ctx.tenant_today(actor.tenant_id).await?;
            let mut booking = self.load(actor, booking_id).await?;
            booking.update_total_price(total_price, deposit_due_date, self.ctx.clock.now(), today)?;
            self.save(booking).await
        })
        .await?;
        info!(
            booking_number = %booking.booking_number(),
            total_price = %booking.pricing().total_price,
            balance_due = %booking.balance_due(),
            "Booking price updated"
        );
        Ok(booking)
    }

    async fn load(&self, actor: &Actor, booking_id: BookingId) -> ServiceResult<Booking> {
        let booking = self
            .ctx
            .store
            .get_booking(actor.tenant_id, booking_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Booking", booking_id))?;
        booking.validate()?;
        Ok(booking)
    }

    async fn load_payment(&self, actor: &Actor, payment_id: PaymentId) -> ServiceResult<Payment> {
        self.ctx
            .store
            .get_payment(actor.tenant_id, payment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Payment", payment_id))
    }

    async fn load_invoice_for(&self, actor: &Actor, invoice_id: InvoiceId, booking_id: BookingId) -> ServiceResult<Invoice> {
        let invoice = self
            .ctx
            .store
            .get_invoice(actor.tenant_id, invoice_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice", invoice_id))?;
        if invoice.booking_id().is_some_and(|linked| linked != booking_id) {
            return Err(ServiceError::validation(format!(
                "invoice {} belongs to another booking",
                invoice.invoice_number()
            )));
        }
        Ok(invoice)
    }

    async fn save(&self, booking: Booking) -> ServiceResult<Booking> {
        committed(self.ctx.commit(ChangeSet::new().with_booking(booking)).await?.take_booking(), "booking")
    }
}

/// Mirrors a refund already applied to `payment` onto the invoice and the
/// booking sub-ledger.
///
/// Invoices outside paid/partial keep their amounts and get a note instead.
pub(crate) fn apply_refund(
    booking: &mut Booking,
    invoice: Option<&mut Invoice>,
    payment: &Payment,
    delta: Money,
    reason: &str,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> ServiceResult<()> {
    if !delta.is_positive() {
        return Ok(());
    }

    if let Some(invoice) = invoice {
        if invoice.is_refundable() {
            let refundable = delta.min(invoice.amount_paid())?;
            if refundable.is_positive() {
                invoice.refund(refundable, reason, now)?;
            }
        } else {
            invoice.add_internal_note(
                "system",
                format!(
                    "Refund of {} on {} recorded while invoice was {}",
                    delta,
                    payment.transaction_id(),
                    invoice.status()
                ),
                now,
            );
        }
    }

    let mut entry = NewLedgerEntry::completed_refund(delta, payment.method())
        .with_payment(payment.id(), payment.transaction_id());
    entry.notes = Some(reason.to_string());
    booking.add_payment(entry, now, today)?;
    Ok(())
}
