//! Embedded payment sub-ledger
//!
//! Entries are only ever appended. A pending entry may later settle to
//! completed or failed, but nothing is removed or re-priced. Refunds are
//! recorded as their own entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{Currency, LedgerEntryId, Money, MoneyError, PaymentId, PaymentMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Money received from the customer
    Charge,
    /// Money returned to the customer
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

/// Booking-level payment classification, always derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    NotPaid,
    PartiallyPaid,
    FullyPaid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NotPaid => "not-paid",
            PaymentStatus::PartiallyPaid => "partially-paid",
            PaymentStatus::FullyPaid => "fully-paid",
            PaymentStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payment sub-record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub kind: EntryKind,
    /// Always positive; `kind` carries the direction
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: EntryStatus,
    /// First-class payment record this entry mirrors
    pub payment_id: Option<PaymentId>,
    pub transaction_id: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Input for appending an entry
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub kind: EntryKind,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: EntryStatus,
    pub payment_id: Option<PaymentId>,
    pub transaction_id: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl NewLedgerEntry {
    /// A completed charge, the common case for manual payments
    pub fn completed_charge(amount: Money, method: PaymentMethod) -> Self {
        Self {
            kind: EntryKind::Charge,
            amount,
            method,
            status: EntryStatus::Completed,
            payment_id: None,
            transaction_id: None,
            reference: None,
            notes: None,
            paid_at: None,
        }
    }

    pub fn completed_refund(amount: Money, method: PaymentMethod) -> Self {
        Self {
            kind: EntryKind::Refund,
            ..Self::completed_charge(amount, method)
        }
    }

    pub fn with_payment(mut self, payment_id: PaymentId, transaction_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id);
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Derived totals of a sub-ledger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total_paid: Money,
    pub balance_due: Money,
    pub payment_status: PaymentStatus,
}

/// Computes totals from entries.
///
/// `total_paid` is completed charges minus completed refunds. The status is
/// overdue when not fully paid and `today` is past the deposit due date.
pub fn compute_totals(
    entries: &[LedgerEntry],
    total_price: &Money,
    deposit_due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<LedgerTotals, MoneyError> {
    let currency: Currency = total_price.currency();
    let mut total_paid = Money::zero(currency);
    for entry in entries.iter().filter(|e| e.status == EntryStatus::Completed) {
        total_paid = match entry.kind {
            EntryKind::Charge => total_paid.checked_add(&entry.amount)?,
            EntryKind::Refund => total_paid.checked_sub(&entry.amount)?,
        };
    }

    let balance_due = total_price.checked_sub(&total_paid)?;
    let mut payment_status = if !total_paid.is_positive() {
        PaymentStatus::NotPaid
    } else if total_paid.amount() >= total_price.amount() {
        PaymentStatus::FullyPaid
    } else {
        PaymentStatus::PartiallyPaid
    };

    if payment_status != PaymentStatus::FullyPaid
        && deposit_due_date.is_some_and(|due| today > due)
    {
        payment_status = PaymentStatus::Overdue;
    }

    Ok(LedgerTotals {
        total_paid,
        balance_due,
        payment_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(kind: EntryKind, amount: rust_decimal::Decimal, status: EntryStatus) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            kind,
            amount: Money::new(amount, Currency::USD),
            method: PaymentMethod::Cash,
            status,
            payment_id: None,
            transaction_id: None,
            reference: None,
            notes: None,
            recorded_at: Utc::now(),
            paid_at: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    #[test]
    fn test_only_completed_entries_count() {
        let entries = vec![
            entry(EntryKind::Charge, dec!(300), EntryStatus::Completed),
            entry(EntryKind::Charge, dec!(200), EntryStatus::Pending),
            entry(EntryKind::Charge, dec!(100), EntryStatus::Failed),
            entry(EntryKind::Refund, dec!(50), EntryStatus::Completed),
        ];
        let totals = compute_totals(&entries, &Money::new(dec!(1000), Currency::USD), None, day(1)).unwrap();

        assert_eq!(totals.total_paid.amount(), dec!(250));
        assert_eq!(totals.balance_due.amount(), dec!(750));
        assert_eq!(totals.payment_status, PaymentStatus::PartiallyPaid);
    }

    #[test]
    fn test_overdue_overrides_unless_fully_paid() {
        let price = Money::new(dec!(500), Currency::USD);
        let unpaid = compute_totals(&[], &price, Some(day(10)), day(11)).unwrap();
        assert_eq!(unpaid.payment_status, PaymentStatus::Overdue);

        let on_due_date = compute_totals(&[], &price, Some(day(10)), day(10)).unwrap();
        assert_eq!(on_due_date.payment_status, PaymentStatus::NotPaid);

        let paid = vec![entry(EntryKind::Charge, dec!(500), EntryStatus::Completed)];
        let totals = compute_totals(&paid, &price, Some(day(10)), day(20)).unwrap();
        assert_eq!(totals.payment_status, PaymentStatus::FullyPaid);
        assert!(totals.balance_due.is_zero());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentStatus::FullyPaid).unwrap(), "\"fully-paid\"");
    }
}
