//! Gateway webhook intake
//!
//! An event is verified, parsed, attributed to a tenant, planned against the
//! current documents and applied in a single commit together with its
//! processed-event record. A redelivered event either hits the processed
//! check up front or loses the race at commit time; both end as
//! [`ReconciliationOutcome::Duplicate`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use core_kernel::{PaymentMethod, TenantId};
use domain_billing::{GatewayLink, GatewayStatus, Invoice, NewPayment, Payment};
use domain_booking::{Booking, NewLedgerEntry};
use domain_reconciliation::{
    plan, Decision, GatewayEvent, PlanContext, ReconciliationError, SkipReason, WebhookVerifier,
};
use domain_sequence::DocumentKind;

use crate::booking_service::apply_refund;
use crate::context::{with_conflict_retry, ServiceContext};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{ChangeSet, CommitOutcome, ProcessedEvent};

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

const NOTE_AUTHOR: &str = "gateway";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    Applied { event_id: String, action: &'static str },
    Skipped { event_id: String, reason: SkipReason },
    Duplicate { event_id: String },
}

impl ReconciliationOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            ReconciliationOutcome::Applied { event_id, .. }
            | ReconciliationOutcome::Skipped { event_id, .. }
            | ReconciliationOutcome::Duplicate { event_id } => event_id,
        }
    }
}

#[derive(Clone)]
pub struct ReconciliationService {
    ctx: ServiceContext,
    verifier: WebhookVerifier,
    provider: String,
}

impl ReconciliationService {
    pub fn new(ctx: ServiceContext, verifier: WebhookVerifier, provider: impl Into<String>) -> Self {
        Self {
            ctx,
            verifier,
            provider: provider.into(),
        }
    }

    /// Applies one webhook delivery at most once.
    ///
    /// Nothing is read or written before the signature checks out.
    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn receive_gateway_event(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> ServiceResult<ReconciliationOutcome> {
        let header = signature.ok_or_else(|| ReconciliationError::InvalidSignature("missing signature header".into()))?;
        if let Err(e) = self.verifier.verify(payload, header, self.ctx.clock.now()) {
            warn!(error = %e, "Rejected gateway event");
            return Err(e.into());
        }

        let event = GatewayEvent::parse(payload)?;
        let Some(tenant_id) = self.resolve_tenant(&event).await? else {
            info!(event_id = %event.id, event_type = %event.event_type, "Ignoring unattributable gateway event");
            return Ok(ReconciliationOutcome::Skipped {
                event_id: event.id,
                reason: SkipReason::Unsupported,
            });
        };

        if self.ctx.store.is_event_processed(tenant_id, &event.id).await? {
            info!(event_id = %event.id, %tenant_id, "Duplicate gateway event");
            return Ok(ReconciliationOutcome::Duplicate { event_id: event.id });
        }

        let transaction_id = OnceCell::new();
        let (event, transaction_id) = (&event, &transaction_id);
        let outcome = with_conflict_retry(self.ctx.max_conflict_retries, "receive_gateway_event", move || {
            self.try_apply(tenant_id, event, transaction_id)
        })
        .await?;

        match &outcome {
            ReconciliationOutcome::Applied { action, .. } => {
                info!(event_id = %event.id, event_type = %event.event_type, %tenant_id, action, "Gateway event applied")
            }
            ReconciliationOutcome::Skipped { reason, .. } => {
                warn!(event_id = %event.id, event_type = %event.event_type, %tenant_id, %reason, "Gateway event skipped")
            }
            ReconciliationOutcome::Duplicate { .. } => {
                info!(event_id = %event.id, %tenant_id, "Gateway event already applied concurrently")
            }
        }
        Ok(outcome)
    }

    /// Drops processed-event records older than `retention_days`
    #[instrument(skip(self))]
    pub async fn purge_processed_events(&self, retention_days: i64) -> ServiceResult<u64> {
        if retention_days < 1 {
            return Err(ServiceError::validation("retention must be at least one day"));
        }
        let older_than = self.ctx.clock.now() - Duration::days(retention_days);
        let purged = self.ctx.store.purge_processed_events(older_than).await?;
        info!(purged, %older_than, "Purged processed gateway events");
        Ok(purged)
    }

    async fn resolve_tenant(&self, event: &GatewayEvent) -> ServiceResult<Option<TenantId>> {
        if let Some(tenant_id) = event.metadata.tenant_id {
            return Ok(Some(tenant_id));
        }
        if let Some(charge_id) = event.charge_id() {
            if let Some(tenant_id) = self.ctx.store.locate_gateway_charge(charge_id).await? {
                return Ok(Some(tenant_id));
            }
        }
        if event.is_supported() {
            return Err(ReconciliationError::MissingReference {
                event_id: event.id.clone(),
                reference: "tenant_id",
            }
            .into());
        }
        Ok(None)
    }

    async fn try_apply(
        &self,
        tenant_id: TenantId,
        event: &GatewayEvent,
        transaction_id: &OnceCell<String>,
    ) -> ServiceResult<ReconciliationOutcome> {
        let now = self.ctx.clock.now();
        let invoice = match event.metadata.invoice_id {
            Some(invoice_id) => Some(
                self.ctx
                    .store
                    .get_invoice(tenant_id, invoice_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Invoice", invoice_id))?,
            ),
            None => None,
        };
        let payment = match event.charge_id() {
            Some(charge_id) => self.ctx.store.find_payment_by_gateway_id(tenant_id, charge_id).await?,
            None => None,
        };

        let decision = plan(
            event,
            &PlanContext {
                invoice: invoice.as_ref(),
                payment: payment.as_ref(),
            },
        )?;
        debug!(event_id = %event.id, ?decision, "Planned gateway event");

        let mut apply = Application {
            service: self,
            tenant_id,
            event,
            invoice,
            payment,
            changes: ChangeSet::new(),
        };
        let action = match decision {
            Decision::Skip(reason) => {
                return self
                    .record(tenant_id, event, ChangeSet::new(), format!("skipped:{}", reason), now)
                    .await
                    .map(|recorded| {
                        if recorded {
                            ReconciliationOutcome::Skipped {
                                event_id: event.id.clone(),
                                reason,
                            }
                        } else {
                            ReconciliationOutcome::Duplicate {
                                event_id: event.id.clone(),
                            }
                        }
                    });
            }
            Decision::RecordSuccess {
                booking_id,
                payment_intent_id,
                charge_id,
                amount,
            } => {
                let mut booking = apply.booking(booking_id).await?;
                let transaction_id = self.transaction_id(tenant_id, transaction_id).await?;
                let payment = Payment::completed(
                    apply.new_payment(booking.id(), transaction_id, amount, &charge_id, &payment_intent_id),
                    now,
                )?;
                booking.add_payment(
                    NewLedgerEntry::completed_charge(amount, PaymentMethod::Gateway)
                        .with_payment(payment.id(), transaction_id)
                        .with_reference(charge_id.clone()),
                    now,
                    apply.today().await?,
                )?;
                if let Some(invoice) = apply.invoice.as_mut() {
                    if invoice.accepts_payments() {
                        invoice.mark_as_paid(amount, PaymentMethod::Gateway, Some(charge_id), now)?;
                    } else {
                        // money arrived after the invoice was closed; keep it on the booking
                        warn!(
                            event_id = %event.id,
                            invoice_number = %invoice.invoice_number(),
                            status = %invoice.status(),
                            "Gateway payment settled against a closed invoice"
                        );
                        invoice.add_internal_note(
                            NOTE_AUTHOR,
                            format!(
                                "Gateway payment {} of {} ({}) settled while invoice was {}",
                                transaction_id,
                                amount,
                                charge_id,
                                invoice.status()
                            ),
                            now,
                        );
                    }
                    invoice.set_gateway_status(&self.provider, GatewayStatus::Succeeded, &event.id, event.created_at, None, now);
                }
                apply.changes = apply.changes.with_booking(booking).with_payment(payment);
                "payment_recorded"
            }
            Decision::RecordFailure {
                booking_id,
                payment_intent_id,
                amount,
                reason,
            } => {
                if let Some(invoice) = apply.invoice.as_mut() {
                    invoice.set_gateway_status(
                        &self.provider,
                        GatewayStatus::Failed,
                        &event.id,
                        event.created_at,
                        Some(reason.clone()),
                        now,
                    );
                }
                if let (Some(booking_id), Some(amount)) = (booking_id, amount) {
                    let booking = apply.booking(booking_id).await?;
                    let transaction_id = self.transaction_id(tenant_id, transaction_id).await?;
                    // no charge settled, so the attempt is keyed by the failure event
                    let failed = Payment::failed(
                        apply.new_payment(booking.id(), transaction_id, amount, &event.id, &payment_intent_id),
                        &reason,
                        now,
                    )?;
                    apply.changes = apply.changes.with_payment(failed);
                }
                "failure_recorded"
            }
            Decision::RecordCancellation { .. } => {
                if let Some(invoice) = apply.invoice.as_mut() {
                    invoice.set_gateway_status(&self.provider, GatewayStatus::Canceled, &event.id, event.created_at, None, now);
                }
                "cancellation_recorded"
            }
            Decision::ApplyRefund {
                amount_refunded,
                reason,
                ..
            } => {
                let mut payment = apply.take_payment()?;
                let delta = payment.apply_refund_total(amount_refunded, reason.clone(), now)?;
                let mut booking = apply.booking(payment.booking_id()).await?;
                let mut invoice = apply.payment_invoice(&payment).await?;
                let today = apply.today().await?;
                apply_refund(
                    &mut booking,
                    invoice.as_mut(),
                    &payment,
                    delta,
                    reason.as_deref().unwrap_or("gateway refund"),
                    now,
                    today,
                )?;
                if let Some(invoice) = invoice {
                    apply.changes = apply.changes.with_invoice(invoice);
                }
                apply.changes = apply.changes.with_booking(booking).with_payment(payment);
                "refund_applied"
            }
            Decision::ApplyDispute {
                dispute_id,
                amount,
                reason,
                ..
            } => {
                let mut payment = apply.take_payment()?;
                payment.mark_disputed(&dispute_id, &reason, amount, now)?;
                if let Some(mut invoice) = apply.payment_invoice(&payment).await? {
                    invoice.add_internal_note(
                        NOTE_AUTHOR,
                        format!(
                            "Dispute {} opened on {} for {}: {}",
                            dispute_id,
                            payment.transaction_id(),
                            amount,
                            reason
                        ),
                        now,
                    );
                    apply.changes = apply.changes.with_invoice(invoice);
                }
                apply.changes = apply.changes.with_payment(payment);
                "dispute_recorded"
            }
        };

        let mut changes = apply.changes;
        if let Some(invoice) = apply.invoice {
            changes = changes.with_invoice(invoice);
        }
        let recorded = self.record(tenant_id, event, changes, action.to_string(), now).await?;
        Ok(if recorded {
            ReconciliationOutcome::Applied {
                event_id: event.id.clone(),
                action,
            }
        } else {
            ReconciliationOutcome::Duplicate {
                event_id: event.id.clone(),
            }
        })
    }

    /// Commits `changes` with the processed-event record; false when the
    /// event was recorded by someone else first
    async fn record(
        &self,
        tenant_id: TenantId,
        event: &GatewayEvent,
        changes: ChangeSet,
        outcome: String,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let changes = changes.with_processed_event(ProcessedEvent {
            tenant_id,
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            outcome,
            processed_at: now,
        });
        match self.ctx.store.commit(changes).await? {
            CommitOutcome::Applied(_) => Ok(true),
            CommitOutcome::DuplicateEvent => Ok(false),
        }
    }

    /// Allocates the event's transaction number once across retries
    async fn transaction_id<'c>(&self, tenant_id: TenantId, cell: &'c OnceCell<String>) -> ServiceResult<&'c str> {
        let number = cell
            .get_or_try_init(|| self.ctx.allocator.allocate(tenant_id, DocumentKind::Transaction, self.ctx.clock.now()))
            .await?;
        Ok(number.as_str())
    }
}

/// Documents loaded for one attempt at applying an event
struct Application<'a> {
    service: &'a ReconciliationService,
    tenant_id: TenantId,
    event: &'a GatewayEvent,
    invoice: Option<Invoice>,
    payment: Option<Payment>,
    changes: ChangeSet,
}

impl Application<'_> {
    async fn today(&self) -> ServiceResult<NaiveDate> {
        self.service.ctx.tenant_today(self.tenant_id).await
    }

    async fn booking(&self, booking_id: core_kernel::BookingId) -> ServiceResult<Booking> {
        self.service
            .ctx
            .store
            .get_booking(self.tenant_id, booking_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Booking", booking_id))
    }

    fn take_payment(&mut self) -> ServiceResult<Payment> {
        self.payment.take().ok_or_else(|| {
            ReconciliationError::UnknownDocument {
                entity: "payment",
                gateway_id: self.event.charge_id().unwrap_or_default().to_string(),
            }
            .into()
        })
    }

    /// Invoice linked to `payment`. The metadata invoice is released either
    /// way so an unrelated document is never rewritten.
    async fn payment_invoice(&mut self, payment: &Payment) -> ServiceResult<Option<Invoice>> {
        let metadata_invoice = self.invoice.take();
        let Some(invoice_id) = payment.invoice_id() else {
            return Ok(None);
        };
        match metadata_invoice {
            Some(invoice) if invoice.id() == invoice_id => Ok(Some(invoice)),
            _ => Ok(self.service.ctx.store.get_invoice(self.tenant_id, invoice_id).await?),
        }
    }

    fn new_payment(
        &self,
        booking_id: core_kernel::BookingId,
        transaction_id: &str,
        amount: core_kernel::Money,
        gateway_transaction_id: &str,
        payment_intent_id: &str,
    ) -> NewPayment {
        NewPayment {
            tenant_id: self.tenant_id,
            transaction_id: transaction_id.to_string(),
            booking_id,
            invoice_id: self.invoice.as_ref().map(Invoice::id),
            amount,
            method: PaymentMethod::Gateway,
            gateway: Some(GatewayLink {
                provider: self.service.provider.clone(),
                gateway_transaction_id: gateway_transaction_id.to_string(),
                payment_intent_id: Some(payment_intent_id.to_string()),
            }),
            reference: Some(gateway_transaction_id.to_string()),
            notes: None,
        }
    }
}
