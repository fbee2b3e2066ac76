//! Booking Aggregate Root
//!
//! # Invariants
//!
//! - `balance_due = total_price - total_paid` after every mutation of the
//!   sub-ledger or the total price
//! - `total_paid`, `balance_due` and `payment_status` are never set directly
//! - `travel_dates.end >= travel_dates.start`
//! - Status history and payment entries are append-only
//!
//! # State Machine
//!
//! - Pending -> Confirmed | Cancelled
//! - Confirmed -> InProgress | Completed | Cancelled
//! - InProgress -> Completed | Cancelled
//! - Completed and Cancelled are terminal

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use core_kernel::{
    BookingId, CustomerId, DateRange, ItineraryId, LedgerEntryId, Money, QuoteId, TemporalError,
    TenantId, TravelerId, UserId,
};

use crate::error::BookingError;
use crate::ledger::{
    compute_totals, EntryKind, EntryStatus, LedgerEntry, NewLedgerEntry, PaymentStatus,
};

/// Booking lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Checks the transition table
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (*self, target),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the status history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<BookingStatus>,
    pub to: BookingStatus,
    pub at: DateTime<Utc>,
    pub actor: UserId,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub confirmed_at: DateTime<Utc>,
    pub confirmed_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: UserId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelerKind {
    Adult,
    Child,
    Infant,
}

impl fmt::Display for TravelerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TravelerKind::Adult => "Adult",
            TravelerKind::Child => "Child",
            TravelerKind::Infant => "Infant",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traveler {
    pub id: TravelerId,
    pub kind: TravelerKind,
    /// `None` for anonymous slots created from head counts
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub passport_number: Option<String>,
    pub is_lead: bool,
}

impl Traveler {
    pub fn named(kind: TravelerKind, name: impl Into<String>) -> Self {
        Self {
            id: TravelerId::new(),
            kind,
            name: Some(name.into()),
            date_of_birth: None,
            passport_number: None,
            is_lead: false,
        }
    }

    pub fn anonymous(kind: TravelerKind) -> Self {
        Self {
            id: TravelerId::new(),
            kind,
            name: None,
            date_of_birth: None,
            passport_number: None,
            is_lead: false,
        }
    }

    /// Expands head counts into anonymous slots; the first adult leads
    pub fn slots(adults: u32, children: u32, infants: u32) -> Vec<Traveler> {
        let mut roster: Vec<Traveler> = std::iter::repeat(TravelerKind::Adult)
            .take(adults as usize)
            .chain(std::iter::repeat(TravelerKind::Child).take(children as usize))
            .chain(std::iter::repeat(TravelerKind::Infant).take(infants as usize))
            .map(Traveler::anonymous)
            .collect();
        if let Some(lead) = roster.first_mut() {
            lead.is_lead = true;
        }
        roster
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCustomer {
    pub customer_id: Option<CustomerId>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingPricing {
    pub total_price: Money,
    pub deposit_due_date: Option<NaiveDate>,
}

/// Input for a new booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub tenant_id: TenantId,
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
    pub created_by: UserId,
}

/// The Booking aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    tenant_id: TenantId,
    booking_number: String,
    quote_id: Option<QuoteId>,
    itinerary_id: Option<ItineraryId>,
    customer: BookingCustomer,
    travelers: Vec<Traveler>,
    travel_dates: DateRange,
    destination: String,
    pricing: BookingPricing,
    status: BookingStatus,
    status_history: Vec<StatusChange>,
    confirmation: Option<Confirmation>,
    cancellation: Option<Cancellation>,
    payments: Vec<LedgerEntry>,
    total_paid: Money,
    balance_due: Money,
    payment_status: PaymentStatus,
    notes: Option<String>,
    created_by: UserId,
    /// Optimistic concurrency token, bumped by the store on every write
    lock_version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a pending booking and records the initial history entry
    pub fn new(
        input: NewBooking,
        booking_number: String,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Self, BookingError> {
        let travel_dates = DateRange::new(input.travel_start, input.travel_end)?;
        if input.travelers.is_empty() {
            return Err(BookingError::validation("booking requires at least one traveler"));
        }
        if !input.total_price.is_positive() {
            return Err(BookingError::validation("booking total price must be positive"));
        }
        if input.customer.name.trim().is_empty() {
            return Err(BookingError::validation("customer name is required"));
        }

        let currency = input.total_price.currency();
        let mut booking = Self {
            id: BookingId::new(),
            tenant_id: input.tenant_id,
            booking_number,
            quote_id: input.quote_id,
            itinerary_id: input.itinerary_id,
            customer: input.customer,
            travelers: input.travelers,
            travel_dates,
            destination: input.destination,
            pricing: BookingPricing {
                total_price: input.total_price,
                deposit_due_date: input.deposit_due_date,
            },
            status: BookingStatus::Pending,
            status_history: vec![StatusChange {
                from: None,
                to: BookingStatus::Pending,
                at: now,
                actor: input.created_by,
                reason: Some("created".to_string()),
                notes: None,
            }],
            confirmation: None,
            cancellation: None,
            payments: Vec::new(),
            total_paid: Money::zero(currency),
            balance_due: input.total_price,
            payment_status: PaymentStatus::NotPaid,
            notes: input.notes,
            created_by: input.created_by,
            lock_version: 0,
            created_at: now,
            updated_at: now,
        };
        booking.recompute_payment_status(today)?;
        Ok(booking)
    }

    pub fn id(&self) -> BookingId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn booking_number(&self) -> &str {
        &self.booking_number
    }

    pub fn quote_id(&self) -> Option<QuoteId> {
        self.quote_id
    }

    pub fn itinerary_id(&self) -> Option<ItineraryId> {
        self.itinerary_id
    }

    pub fn customer(&self) -> &BookingCustomer {
        &self.customer
    }

    pub fn travelers(&self) -> &[Traveler] {
        &self.travelers
    }

    pub fn travel_dates(&self) -> DateRange {
        self.travel_dates
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn pricing(&self) -> &BookingPricing {
        &self.pricing
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn payments(&self) -> &[LedgerEntry] {
        &self.payments
    }

    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    pub fn balance_due(&self) -> Money {
        self.balance_due
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
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

    /// Re-checks invariants that deserialized data could violate
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.travel_dates.end < self.travel_dates.start {
            return Err(BookingError::Temporal(TemporalError::InvalidPeriod {
                start: self.travel_dates.start.to_string(),
                end: self.travel_dates.end.to_string(),
            }));
        }
        Ok(())
    }

    /// Appends a payment sub-record and recomputes the derived totals
    pub fn add_payment(
        &mut self,
        input: NewLedgerEntry,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<LedgerEntryId, BookingError> {
        if !input.amount.is_positive() {
            return Err(BookingError::validation("payment amount must be positive"));
        }
        self.pricing.total_price.ensure_same_currency(&input.amount)?;

        match input.kind {
            EntryKind::Charge if self.status == BookingStatus::Cancelled => {
                return Err(BookingError::Closed {
                    status: self.status.to_string(),
                    operation: "payments".to_string(),
                });
            }
            EntryKind::Refund if input.status == EntryStatus::Completed => {
                if input.amount > self.total_paid {
                    return Err(BookingError::validation(format!(
                        "refund {} exceeds amount paid {}",
                        input.amount, self.total_paid
                    )));
                }
            }
            _ => {}
        }

        let paid_at = match input.status {
            EntryStatus::Completed => Some(input.paid_at.unwrap_or(now)),
            _ => input.paid_at,
        };
        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            kind: input.kind,
            amount: input.amount,
            method: input.method,
            status: input.status,
            payment_id: input.payment_id,
            transaction_id: input.transaction_id,
            reference: input.reference,
            notes: input.notes,
            recorded_at: now,
            paid_at,
        };
        let id = entry.id;
        self.payments.push(entry);
        self.updated_at = now;
        self.recompute_payment_status(today)?;
        Ok(id)
    }

    /// Settles a pending entry as completed or failed
    pub fn settle_payment(
        &mut self,
        entry_id: LedgerEntryId,
        status: EntryStatus,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        let entry = self
            .payments
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or(BookingError::EntryNotFound(entry_id))?;
        if entry.status != EntryStatus::Pending || status == EntryStatus::Pending {
            return Err(BookingError::validation(format!(
                "entry {} is {:?} and cannot settle to {:?}",
                entry_id, entry.status, status
            )));
        }
        entry.status = status;
        if status == EntryStatus::Completed {
            entry.paid_at = Some(now);
        }
        self.updated_at = now;
        self.recompute_payment_status(today)
    }

    /// Finds the entry mirroring a payment record
    pub fn entry_for_payment(&self, payment_id: core_kernel::PaymentId) -> Option<&LedgerEntry> {
        self.payments
            .iter()
            .find(|e| e.payment_id == Some(payment_id) && e.kind == EntryKind::Charge)
    }

    /// Refreshes `total_paid`, `balance_due` and `payment_status` from the
    /// sub-ledger and the current price
    pub fn recompute_payment_status(&mut self, today: NaiveDate) -> Result<(), BookingError> {
        let totals = compute_totals(
            &self.payments,
            &self.pricing.total_price,
            self.pricing.deposit_due_date,
            today,
        )?;
        self.total_paid = totals.total_paid;
        self.balance_due = totals.balance_due;
        self.payment_status = totals.payment_status;
        debug!(
            booking = %self.booking_number,
            total_paid = %self.total_paid,
            balance_due = %self.balance_due,
            payment_status = %self.payment_status,
            "Recomputed booking payment status"
        );
        Ok(())
    }

    /// Changes the total price and recomputes the derived totals
    pub fn update_total_price(
        &mut self,
        total_price: Money,
        deposit_due_date: Option<NaiveDate>,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        if self.status.is_terminal() {
            return Err(BookingError::Closed {
                status: self.status.to_string(),
                operation: "price changes".to_string(),
            });
        }
        if !total_price.is_positive() {
            return Err(BookingError::validation("booking total price must be positive"));
        }
        self.pricing.total_price.ensure_same_currency(&total_price)?;

        self.pricing.total_price = total_price;
        self.pricing.deposit_due_date = deposit_due_date;
        self.updated_at = now;
        self.recompute_payment_status(today)
    }

    /// Moves the booking along the transition table and records history
    pub fn update_status(
        &mut self,
        new_status: BookingStatus,
        actor: UserId,
        reason: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if !self.status.can_transition_to(new_status) {
            return Err(BookingError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: new_status.to_string(),
            });
        }

        match new_status {
            BookingStatus::Confirmed => {
                self.confirmation = Some(Confirmation {
                    confirmed_at: now,
                    confirmed_by: actor,
                });
            }
            BookingStatus::Cancelled => {
                let reason = reason
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| BookingError::validation("cancellation requires a reason"))?;
                self.cancellation = Some(Cancellation {
                    cancelled_at: now,
                    cancelled_by: actor,
                    reason,
                });
            }
            _ => {}
        }

        self.status_history.push(StatusChange {
            from: Some(self.status),
            to: new_status,
            at: now,
            actor,
            reason,
            notes,
        });
        self.status = new_status;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{Currency, PaymentMethod};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        now().date_naive()
    }

    fn usd(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn booking() -> Booking {
        let input = NewBooking {
            tenant_id: TenantId::new(),
            quote_id: None,
            itinerary_id: None,
            customer: BookingCustomer {
                customer_id: None,
                name: "Priya Nair".to_string(),
                email: "priya@example.com".to_string(),
                phone: None,
            },
            travelers: Traveler::slots(2, 1, 0),
            travel_start: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            travel_end: NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(),
            destination: "Goa".to_string(),
            total_price: usd(dec!(972)),
            deposit_due_date: Some(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()),
            notes: None,
            created_by: UserId::new(),
        };
        Booking::new(input, "BKG-2503-0001".to_string(), now(), today()).unwrap()
    }

    #[test]
    fn test_new_booking_owes_full_price() {
        let booking = booking();
        assert_eq!(booking.status(), BookingStatus::Pending);
        assert_eq!(booking.balance_due().amount(), dec!(972));
        assert_eq!(booking.payment_status(), PaymentStatus::NotPaid);
        assert_eq!(booking.status_history().len(), 1);
        assert_eq!(booking.travelers().iter().filter(|t| t.is_lead).count(), 1);
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut input_booking = booking();
        let result = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        );
        assert!(result.is_err());
        assert!(input_booking.validate().is_ok());
        input_booking.travel_dates = DateRange {
            start: NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        };
        assert!(matches!(input_booking.validate(), Err(BookingError::Temporal(_))));
    }

    #[test]
    fn test_payments_drive_status() {
        let mut booking = booking();
        booking
            .add_payment(NewLedgerEntry::completed_charge(usd(dec!(300)), PaymentMethod::Cash), now(), today())
            .unwrap();
        assert_eq!(booking.payment_status(), PaymentStatus::PartiallyPaid);
        assert_eq!(booking.payments()[0].paid_at, Some(now()));

        booking
            .add_payment(NewLedgerEntry::completed_charge(usd(dec!(672)), PaymentMethod::BankTransfer), now(), today())
            .unwrap();
        assert_eq!(booking.payment_status(), PaymentStatus::FullyPaid);
        assert!(booking.balance_due().is_zero());
    }

    #[test]
    fn test_refund_appends_entry() {
        let mut booking = booking();
        booking
            .add_payment(NewLedgerEntry::completed_charge(usd(dec!(972)), PaymentMethod::CreditCard), now(), today())
            .unwrap();
        booking
            .add_payment(NewLedgerEntry::completed_refund(usd(dec!(200)), PaymentMethod::CreditCard), now(), today())
            .unwrap();

        assert_eq!(booking.payments().len(), 2);
        assert_eq!(booking.total_paid().amount(), dec!(772));
        assert_eq!(booking.balance_due().amount(), dec!(200));

        let too_much = booking.add_payment(
            NewLedgerEntry::completed_refund(usd(dec!(1000)), PaymentMethod::CreditCard),
            now(),
            today(),
        );
        assert!(too_much.is_err());
    }

    #[test]
    fn test_pending_entry_settles_once() {
        let mut booking = booking();
        let id = booking
            .add_payment(
                NewLedgerEntry::completed_charge(usd(dec!(100)), PaymentMethod::Check).with_status(EntryStatus::Pending),
                now(),
                today(),
            )
            .unwrap();
        assert!(booking.total_paid().is_zero());

        booking.settle_payment(id, EntryStatus::Completed, now(), today()).unwrap();
        assert_eq!(booking.total_paid().amount(), dec!(100));
        assert!(booking.settle_payment(id, EntryStatus::Failed, now(), today()).is_err());
    }

    #[test]
    fn test_transition_table() {
        let mut booking = booking();
        let actor = UserId::new();

        booking.update_status(BookingStatus::Confirmed, actor, None, None, now()).unwrap();
        assert!(booking.confirmation().is_some());
        booking.update_status(BookingStatus::Completed, actor, None, None, now()).unwrap();

        let err = booking
            .update_status(BookingStatus::Cancelled, actor, Some("changed mind".into()), None, now())
            .unwrap_err();
        assert_eq!(err.current_state(), Some("completed"));
        assert_eq!(booking.status_history().len(), 3);
    }

    #[test]
    fn test_cancellation_requires_reason_and_blocks_payments() {
        let mut booking = booking();
        let actor = UserId::new();

        assert!(booking.update_status(BookingStatus::Cancelled, actor, None, None, now()).is_err());
        booking
            .update_status(BookingStatus::Cancelled, actor, Some("Visa denied".into()), None, now())
            .unwrap();
        assert_eq!(booking.cancellation().unwrap().reason, "Visa denied");

        assert!(booking
            .update_status(BookingStatus::Confirmed, actor, None, None, now())
            .is_err());
        assert!(matches!(
            booking.add_payment(NewLedgerEntry::completed_charge(usd(dec!(10)), PaymentMethod::Cash), now(), today()),
            Err(BookingError::Closed { .. })
        ));
    }

    #[test]
    fn test_price_update_recomputes_balance() {
        let mut booking = booking();
        booking
            .add_payment(NewLedgerEntry::completed_charge(usd(dec!(972)), PaymentMethod::Cash), now(), today())
            .unwrap();
        booking.update_total_price(usd(dec!(1200)), None, now(), today()).unwrap();

        assert_eq!(booking.balance_due().amount(), dec!(228));
        assert_eq!(booking.payment_status(), PaymentStatus::PartiallyPaid);
    }
}
