//! Payment records
//!
//! A payment is the source of truth for money movement. Booking totals and
//! invoice amounts mirror completed payments, never the other way round.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BookingId, InvoiceId, Money, PaymentId, PaymentMethod, TenantId};

use crate::error::BillingError;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Payment is being processed
    Pending,
    /// Payment completed successfully
    Completed,
    /// Payment failed
    Failed,
    /// Entire amount returned
    Refunded,
    /// Part of the amount returned
    PartiallyRefunded,
    /// Customer disputed the charge with their bank
    Disputed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Disputed => "disputed",
        }
    }

    /// Money actually moved at some point
    pub fn has_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed
                | PaymentStatus::Refunded
                | PaymentStatus::PartiallyRefunded
                | PaymentStatus::Disputed
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link to the gateway's view of the payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLink {
    pub provider: String,
    /// Charge id; refunds and disputes reference this
    pub gateway_transaction_id: String,
    pub payment_intent_id: Option<String>,
}

/// Refund sub-record, present only after a refund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    /// Cumulative amount returned so far
    pub amount_refunded: Money,
    pub reason: Option<String>,
    pub refunded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeRecord {
    pub dispute_id: String,
    pub reason: String,
    pub amount: Money,
    pub opened_at: DateTime<Utc>,
}

/// Input for a new payment record
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub tenant_id: TenantId,
    pub transaction_id: String,
    pub booking_id: BookingId,
    pub invoice_id: Option<InvoiceId>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub gateway: Option<GatewayLink>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// A payment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    tenant_id: TenantId,
    /// Human-readable `TXN-YYMM-NNNNNN`
    transaction_id: String,
    booking_id: BookingId,
    invoice_id: Option<InvoiceId>,
    amount: Money,
    method: PaymentMethod,
    status: PaymentStatus,
    gateway: Option<GatewayLink>,
    reference: Option<String>,
    failure_reason: Option<String>,
    refund: Option<RefundRecord>,
    dispute: Option<DisputeRecord>,
    paid_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    /// Optimistic concurrency token, bumped by the store on every write
    lock_version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    fn with_status(input: NewPayment, status: PaymentStatus, now: DateTime<Utc>) -> Result<Self, BillingError> {
        if !input.amount.is_positive() {
            return Err(BillingError::validation("payment amount must be positive"));
        }
        if input.transaction_id.trim().is_empty() {
            return Err(BillingError::validation("transaction id is required"));
        }
        Ok(Self {
            id: PaymentId::new(),
            tenant_id: input.tenant_id,
            transaction_id: input.transaction_id,
            booking_id: input.booking_id,
            invoice_id: input.invoice_id,
            amount: input.amount,
            method: input.method,
            status,
            gateway: input.gateway,
            reference: input.reference,
            failure_reason: None,
            refund: None,
            dispute: None,
            paid_at: (status == PaymentStatus::Completed).then_some(now),
            notes: input.notes,
            lock_version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Creates a payment awaiting settlement
    pub fn pending(input: NewPayment, now: DateTime<Utc>) -> Result<Self, BillingError> {
        Self::with_status(input, PaymentStatus::Pending, now)
    }

    /// Creates a settled payment
    pub fn completed(input: NewPayment, now: DateTime<Utc>) -> Result<Self, BillingError> {
        Self::with_status(input, PaymentStatus::Completed, now)
    }

    /// Creates a failed attempt; no money moved
    pub fn failed(input: NewPayment, reason: &str, now: DateTime<Utc>) -> Result<Self, BillingError> {
        let mut payment = Self::with_status(input, PaymentStatus::Failed, now)?;
        payment.failure_reason = Some(reason.to_string());
        Ok(payment)
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    pub fn invoice_id(&self) -> Option<InvoiceId> {
        self.invoice_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn gateway(&self) -> Option<&GatewayLink> {
        self.gateway.as_ref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn refund(&self) -> Option<&RefundRecord> {
        self.refund.as_ref()
    }

    pub fn dispute(&self) -> Option<&DisputeRecord> {
        self.dispute.as_ref()
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn lock_version(&self) -> u64 {
        self.lock_version
    }

    /// Set by the store after a successful write
    pub fn set_lock_version(&mut self, lock_version: u64) {
        self.lock_version = lock_version;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Cumulative refunded amount, zero before any refund
    pub fn amount_refunded(&self) -> Money {
        self.refund
            .as_ref()
            .map(|r| r.amount_refunded)
            .unwrap_or_else(|| Money::zero(self.amount.currency()))
    }

    /// Settles a pending payment
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), BillingError> {
        if self.status != PaymentStatus::Pending {
            return Err(BillingError::transition(self.status, PaymentStatus::Completed));
        }
        self.status = PaymentStatus::Completed;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks a pending payment as failed
    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), BillingError> {
        if self.status != PaymentStatus::Pending {
            return Err(BillingError::transition(self.status, PaymentStatus::Failed));
        }
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Raises the cumulative refunded amount to `cumulative`.
    ///
    /// Returns the newly refunded delta. A cumulative amount at or below
    /// what is already recorded is a replay and yields zero.
    pub fn apply_refund_total(
        &mut self,
        cumulative: Money,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Money, BillingError> {
        if !self.status.has_settled() {
            return Err(BillingError::transition(self.status, PaymentStatus::Refunded));
        }
        self.amount.ensure_same_currency(&cumulative)?;
        if cumulative > self.amount {
            return Err(BillingError::RefundExceedsCollected {
                requested: cumulative.to_string(),
                collected: self.amount.to_string(),
            });
        }

        let already = self.amount_refunded();
        let delta = cumulative.checked_sub(&already)?;
        if !delta.is_positive() {
            return Ok(Money::zero(self.amount.currency()));
        }

        self.refund = Some(RefundRecord {
            amount_refunded: cumulative,
            reason,
            refunded_at: now,
        });
        if self.status != PaymentStatus::Disputed {
            self.status = if cumulative >= self.amount {
                PaymentStatus::Refunded
            } else {
                PaymentStatus::PartiallyRefunded
            };
        }
        self.updated_at = now;
        Ok(delta)
    }

    /// Refunds `amount` on top of anything already refunded
    pub fn refund_amount(&mut self, amount: Money, reason: &str, now: DateTime<Utc>) -> Result<Money, BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::validation("refund amount must be positive"));
        }
        let cumulative = self.amount_refunded().checked_add(&amount)?;
        self.apply_refund_total(cumulative, Some(reason.to_string()), now)
    }

    /// Flags the payment as disputed; returns false if this dispute was
    /// already recorded
    pub fn mark_disputed(
        &mut self,
        dispute_id: &str,
        reason: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError> {
        if self.dispute.as_ref().is_some_and(|d| d.dispute_id == dispute_id) {
            return Ok(false);
        }
        if !self.status.has_settled() {
            return Err(BillingError::transition(self.status, PaymentStatus::Disputed));
        }
        self.status = PaymentStatus::Disputed;
        self.dispute = Some(DisputeRecord {
            dispute_id: dispute_id.to_string(),
            reason: reason.to_string(),
            amount,
            opened_at: now,
        });
        self.updated_at = now;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn usd(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn input() -> NewPayment {
        NewPayment {
            tenant_id: TenantId::new(),
            transaction_id: "TXN-2503-000001".to_string(),
            booking_id: BookingId::new(),
            invoice_id: None,
            amount: usd(dec!(500)),
            method: PaymentMethod::Gateway,
            gateway: Some(GatewayLink {
                provider: "stripe".to_string(),
                gateway_transaction_id: "ch_123".to_string(),
                payment_intent_id: Some("pi_123".to_string()),
            }),
            reference: None,
            notes: None,
        }
    }

    #[test]
    fn test_cumulative_refunds_are_replay_safe() {
        let now = Utc::now();
        let mut payment = Payment::completed(input(), now).unwrap();

        let delta = payment.apply_refund_total(usd(dec!(200)), None, now).unwrap();
        assert_eq!(delta.amount(), dec!(200));
        assert_eq!(payment.status(), PaymentStatus::PartiallyRefunded);

        let replay = payment.apply_refund_total(usd(dec!(200)), None, now).unwrap();
        assert!(replay.is_zero());

        let rest = payment.apply_refund_total(usd(dec!(500)), None, now).unwrap();
        assert_eq!(rest.amount(), dec!(300));
        assert_eq!(payment.status(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_refund_requires_settlement() {
        let now = Utc::now();
        let mut failed = Payment::failed(input(), "card_declined", now).unwrap();
        assert_eq!(failed.failure_reason(), Some("card_declined"));
        assert!(failed.refund_amount(usd(dec!(10)), "x", now).is_err());

        let mut completed = Payment::completed(input(), now).unwrap();
        assert!(matches!(
            completed.refund_amount(usd(dec!(600)), "x", now),
            Err(BillingError::RefundExceedsCollected { .. })
        ));
    }

    #[test]
    fn test_dispute_is_idempotent() {
        let now = Utc::now();
        let mut payment = Payment::completed(input(), now).unwrap();

        assert!(payment.mark_disputed("dp_1", "fraudulent", usd(dec!(500)), now).unwrap());
        assert!(!payment.mark_disputed("dp_1", "fraudulent", usd(dec!(500)), now).unwrap());
        assert_eq!(payment.status(), PaymentStatus::Disputed);
    }

    #[test]
    fn test_pending_settles_once() {
        let now = Utc::now();
        let mut payment = Payment::pending(input(), now).unwrap();
        payment.complete(now).unwrap();
        assert!(payment.paid_at().is_some());
        assert!(payment.fail("late decline", now).is_err());
    }
}
