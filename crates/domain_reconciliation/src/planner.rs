//! Reconciliation planning
//!
//! Decides what a gateway event means for the documents it touches, given
//! their current state. Planning is pure: the caller loads the invoice and
//! any payment already linked to the event's charge, asks for a
//! [`Decision`], then applies it and records the event id in one commit.
//!
//! Ordering rules:
//! - a success whose charge already has a payment, or whose invoice already
//!   shows a succeeded gateway status, is a replay
//! - failures and cancellations never regress a succeeded invoice and are
//!   ignored when older than the last event applied to the invoice
//! - refunds carry the cumulative refunded amount; only an increase applies
//! - refunds and disputes for an unknown charge fail so the gateway retries

use serde::Serialize;
use std::fmt;
use tracing::debug;

use core_kernel::{BookingId, Money, PaymentId};
use domain_billing::{GatewayStatus, Invoice, Payment};

use crate::error::ReconciliationError;
use crate::event::{GatewayEvent, GatewayEventKind};

/// Why an event was acknowledged without changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unsupported,
    AlreadyApplied,
    /// A failure or cancellation arrived after the payment succeeded
    SupersededBySuccess,
    /// Older than the last event applied to the invoice
    Stale,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Unsupported => "unsupported",
            SkipReason::AlreadyApplied => "already_applied",
            SkipReason::SupersededBySuccess => "superseded_by_success",
            SkipReason::Stale => "stale",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Create a completed payment, mark the invoice paid, post the charge
    /// to the booking ledger
    RecordSuccess {
        booking_id: BookingId,
        payment_intent_id: String,
        charge_id: String,
        amount: Money,
    },
    /// Flag the invoice's gateway status; create a failed payment when a
    /// booking is known
    RecordFailure {
        booking_id: Option<BookingId>,
        payment_intent_id: String,
        amount: Option<Money>,
        reason: String,
    },
    RecordCancellation {
        payment_intent_id: String,
    },
    /// Raise the payment's cumulative refund and propagate the delta
    ApplyRefund {
        payment_id: PaymentId,
        amount_refunded: Money,
        reason: Option<String>,
    },
    ApplyDispute {
        payment_id: PaymentId,
        dispute_id: String,
        amount: Money,
        reason: String,
    },
    Skip(SkipReason),
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip(_))
    }
}

/// Current state of the documents an event refers to
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanContext<'a> {
    /// Invoice named in the event metadata
    pub invoice: Option<&'a Invoice>,
    /// Payment already carrying the event's charge id
    pub payment: Option<&'a Payment>,
}

/// Plans the application of `event` against `ctx`
pub fn plan(event: &GatewayEvent, ctx: &PlanContext<'_>) -> Result<Decision, ReconciliationError> {
    let decision = match &event.kind {
        GatewayEventKind::Unsupported => Decision::Skip(SkipReason::Unsupported),

        GatewayEventKind::PaymentSucceeded {
            payment_intent_id,
            charge_id,
            amount,
        } => {
            let already_succeeded = ctx
                .invoice
                .and_then(|invoice| invoice.gateway())
                .is_some_and(|gateway| {
                    gateway.status == GatewayStatus::Succeeded
                        && gateway.payment_intent_id.as_deref() == Some(payment_intent_id.as_str())
                });
            if ctx.payment.is_some() || already_succeeded {
                Decision::Skip(SkipReason::AlreadyApplied)
            } else {
                let booking_id = resolve_booking(event, ctx).ok_or_else(|| ReconciliationError::MissingReference {
                    event_id: event.id.clone(),
                    reference: "booking_id",
                })?;
                Decision::RecordSuccess {
                    booking_id,
                    payment_intent_id: payment_intent_id.clone(),
                    charge_id: charge_id.clone(),
                    amount: *amount,
                }
            }
        }

        GatewayEventKind::PaymentFailed {
            payment_intent_id,
            amount,
            reason,
        } => {
            let booking_id = resolve_booking(event, ctx);
            if ctx.invoice.is_none() && booking_id.is_none() {
                return Err(ReconciliationError::MissingReference {
                    event_id: event.id.clone(),
                    reference: "invoice_id",
                });
            }
            match ordering_guard(event, ctx) {
                Some(reason) => Decision::Skip(reason),
                None => Decision::RecordFailure {
                    booking_id,
                    payment_intent_id: payment_intent_id.clone(),
                    amount: *amount,
                    reason: reason.clone(),
                },
            }
        }

        GatewayEventKind::PaymentCanceled { payment_intent_id } => {
            if ctx.invoice.is_none() {
                return Err(ReconciliationError::MissingReference {
                    event_id: event.id.clone(),
                    reference: "invoice_id",
                });
            }
            match ordering_guard(event, ctx) {
                Some(reason) => Decision::Skip(reason),
                None => Decision::RecordCancellation {
                    payment_intent_id: payment_intent_id.clone(),
                },
            }
        }

        GatewayEventKind::ChargeRefunded {
            charge_id,
            amount_refunded,
            reason,
        } => {
            let payment = known_payment(ctx, charge_id)?;
            if *amount_refunded <= payment.amount_refunded() {
                Decision::Skip(SkipReason::AlreadyApplied)
            } else {
                Decision::ApplyRefund {
                    payment_id: payment.id(),
                    amount_refunded: *amount_refunded,
                    reason: reason.clone(),
                }
            }
        }

        GatewayEventKind::DisputeCreated {
            dispute_id,
            charge_id,
            amount,
            reason,
        } => {
            let payment = known_payment(ctx, charge_id)?;
            if payment.dispute().is_some_and(|d| &d.dispute_id == dispute_id) {
                Decision::Skip(SkipReason::AlreadyApplied)
            } else {
                Decision::ApplyDispute {
                    payment_id: payment.id(),
                    dispute_id: dispute_id.clone(),
                    amount: *amount,
                    reason: reason.clone(),
                }
            }
        }
    };

    debug!(event_id = %event.id, event_type = %event.event_type, ?decision, "Planned gateway event");
    Ok(decision)
}

fn resolve_booking(event: &GatewayEvent, ctx: &PlanContext<'_>) -> Option<BookingId> {
    ctx.invoice
        .and_then(|invoice| invoice.booking_id())
        .or(event.metadata.booking_id)
}

fn known_payment<'a>(ctx: &PlanContext<'a>, charge_id: &str) -> Result<&'a Payment, ReconciliationError> {
    ctx.payment.ok_or_else(|| ReconciliationError::UnknownDocument {
        entity: "payment",
        gateway_id: charge_id.to_string(),
    })
}

/// Failure and cancellation may not regress a success or overtake a newer event
fn ordering_guard(event: &GatewayEvent, ctx: &PlanContext<'_>) -> Option<SkipReason> {
    let gateway = ctx.invoice.and_then(|invoice| invoice.gateway())?;
    if gateway.status == GatewayStatus::Succeeded {
        return Some(SkipReason::SupersededBySuccess);
    }
    match gateway.last_event_at {
        Some(last) if last > event.created_at => Some(SkipReason::Stale),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use core_kernel::{Currency, PaymentMethod, TenantId};
    use domain_billing::{BillTo, GatewayLink, InvoiceItem, InvoiceItemType, NewInvoice, NewPayment};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn usd(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn sent_invoice() -> Invoice {
        let input = NewInvoice {
            tenant_id: TenantId::new(),
            booking_id: Some(BookingId::new()),
            quote_id: None,
            bill_to: BillTo {
                customer_id: None,
                name: "Asha Rao".to_string(),
                email: "asha@example.com".to_string(),
            },
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            currency: Currency::USD,
            items: vec![InvoiceItem::new("Kerala package", InvoiceItemType::TravelService, usd(dec!(972)))],
            tax: None,
            notes: None,
        };
        let mut invoice = Invoice::new(input, "INV-2025-00001".to_string(), now()).unwrap();
        invoice.mark_as_sent("asha@example.com", now()).unwrap();
        invoice.record_payment_intent("stripe", "pi_1", now()).unwrap();
        invoice
    }

    fn completed_payment(invoice: &Invoice) -> Payment {
        Payment::completed(
            NewPayment {
                tenant_id: invoice.tenant_id(),
                transaction_id: "TXN-2503-000001".to_string(),
                booking_id: invoice.booking_id().unwrap(),
                invoice_id: Some(invoice.id()),
                amount: usd(dec!(972)),
                method: PaymentMethod::Gateway,
                gateway: Some(GatewayLink {
                    provider: "stripe".to_string(),
                    gateway_transaction_id: "ch_1".to_string(),
                    payment_intent_id: Some("pi_1".to_string()),
                }),
                reference: None,
                notes: None,
            },
            now(),
        )
        .unwrap()
    }

    fn event(kind: GatewayEventKind, created_at: DateTime<Utc>) -> GatewayEvent {
        GatewayEvent {
            id: "evt_1".to_string(),
            event_type: "test".to_string(),
            created_at,
            kind,
            metadata: EventMetadata::default(),
        }
    }

    fn success() -> GatewayEventKind {
        GatewayEventKind::PaymentSucceeded {
            payment_intent_id: "pi_1".to_string(),
            charge_id: "ch_1".to_string(),
            amount: usd(dec!(972)),
        }
    }

    fn failure() -> GatewayEventKind {
        GatewayEventKind::PaymentFailed {
            payment_intent_id: "pi_1".to_string(),
            amount: None,
            reason: "card declined".to_string(),
        }
    }

    #[test]
    fn test_first_success_is_recorded() {
        let invoice = sent_invoice();
        let ctx = PlanContext {
            invoice: Some(&invoice),
            payment: None,
        };

        let decision = plan(&event(success(), now()), &ctx).unwrap();
        assert!(matches!(
            decision,
            Decision::RecordSuccess { booking_id, .. } if Some(booking_id) == invoice.booking_id()
        ));
    }

    #[test]
    fn test_success_replay_is_skipped() {
        let invoice = sent_invoice();
        let payment = completed_payment(&invoice);
        let ctx = PlanContext {
            invoice: Some(&invoice),
            payment: Some(&payment),
        };

        assert_eq!(
            plan(&event(success(), now()), &ctx).unwrap(),
            Decision::Skip(SkipReason::AlreadyApplied)
        );
    }

    #[test]
    fn test_success_without_booking_reference_fails() {
        let result = plan(&event(success(), now()), &PlanContext::default());
        assert!(matches!(
            result,
            Err(ReconciliationError::MissingReference { reference: "booking_id", .. })
        ));
    }

    #[test]
    fn test_stale_failure_after_success_does_not_regress() {
        let mut invoice = sent_invoice();
        invoice.set_gateway_status("stripe", GatewayStatus::Succeeded, "evt_ok", now(), None, now());
        let ctx = PlanContext {
            invoice: Some(&invoice),
            payment: None,
        };

        let decision = plan(&event(failure(), now() - Duration::minutes(5)), &ctx).unwrap();
        assert_eq!(decision, Decision::Skip(SkipReason::SupersededBySuccess));
    }

    #[test]
    fn test_failure_older_than_last_event_is_stale() {
        let mut invoice = sent_invoice();
        invoice.set_gateway_status("stripe", GatewayStatus::Processing, "evt_new", now(), None, now());
        let ctx = PlanContext {
            invoice: Some(&invoice),
            payment: None,
        };

        let stale = plan(&event(failure(), now() - Duration::seconds(1)), &ctx).unwrap();
        assert_eq!(stale, Decision::Skip(SkipReason::Stale));

        let fresh = plan(&event(failure(), now() + Duration::seconds(1)), &ctx).unwrap();
        assert!(matches!(fresh, Decision::RecordFailure { .. }));
    }

    #[test]
    fn test_cancellation_requires_invoice() {
        let kind = GatewayEventKind::PaymentCanceled {
            payment_intent_id: "pi_1".to_string(),
        };
        assert!(plan(&event(kind, now()), &PlanContext::default()).is_err());
    }

    #[test]
    fn test_refund_applies_only_increases() {
        let invoice = sent_invoice();
        let mut payment = completed_payment(&invoice);
        payment.refund_amount(usd(dec!(200)), "change of plans", now()).unwrap();
        let ctx = PlanContext {
            invoice: Some(&invoice),
            payment: Some(&payment),
        };
        let refund = |total| GatewayEventKind::ChargeRefunded {
            charge_id: "ch_1".to_string(),
            amount_refunded: usd(total),
            reason: None,
        };

        assert_eq!(
            plan(&event(refund(dec!(200)), now()), &ctx).unwrap(),
            Decision::Skip(SkipReason::AlreadyApplied)
        );
        assert!(matches!(
            plan(&event(refund(dec!(500)), now()), &ctx).unwrap(),
            Decision::ApplyRefund { amount_refunded, .. } if amount_refunded == usd(dec!(500))
        ));
    }

    #[test]
    fn test_refund_for_unknown_charge_is_retried_later() {
        let kind = GatewayEventKind::ChargeRefunded {
            charge_id: "ch_missing".to_string(),
            amount_refunded: usd(dec!(10)),
            reason: None,
        };

        assert!(matches!(
            plan(&event(kind, now()), &PlanContext::default()),
            Err(ReconciliationError::UnknownDocument { entity: "payment", .. })
        ));
    }

    #[test]
    fn test_dispute_is_recorded_once() {
        let invoice = sent_invoice();
        let mut payment = completed_payment(&invoice);
        let kind = GatewayEventKind::DisputeCreated {
            dispute_id: "dp_1".to_string(),
            charge_id: "ch_1".to_string(),
            amount: usd(dec!(972)),
            reason: "fraudulent".to_string(),
        };

        let ctx = PlanContext {
            invoice: None,
            payment: Some(&payment),
        };
        assert!(matches!(plan(&event(kind.clone(), now()), &ctx).unwrap(), Decision::ApplyDispute { .. }));

        payment.mark_disputed("dp_1", "fraudulent", usd(dec!(972)), now()).unwrap();
        let ctx = PlanContext {
            invoice: None,
            payment: Some(&payment),
        };
        assert!(plan(&event(kind, now()), &ctx).unwrap().is_skip());
    }
}
