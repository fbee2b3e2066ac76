//! Quote Aggregate Root
//!
//! A quote prices an itinerary for a customer and walks through
//! `draft → sent → viewed → {approved | rejected | expired} → converted`.
//!
//! # Invariants
//!
//! - Pricing is recomputed from line items, discounts and taxes on every edit
//! - Only drafts are editable or deletable
//! - Sent or viewed quotes lapse to expired once `now > valid_until`
//! - A quote converts into at most one booking
//! - Revisions share the quote number; `parent_quote` names version 1

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{
    BookingId, Currency, CustomerId, DateRange, ItineraryId, LeadId, Money, QuoteId, TenantId,
    UserId, ValidityWindow,
};

use crate::error::QuoteError;
use crate::pricing::{Discount, LineItem, Pricing, Tax};
use crate::schedule::PaymentSchedule;

/// Quote lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Approved,
    Rejected,
    Expired,
    Converted,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Viewed => "viewed",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
            QuoteStatus::Converted => "converted",
        }
    }

    /// States in which the customer can still act on the offer
    pub fn is_awaiting_customer(&self) -> bool {
        matches!(self, QuoteStatus::Sent | QuoteStatus::Viewed)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer details frozen onto the quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub customer_id: Option<CustomerId>,
    pub lead_id: Option<LeadId>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl CustomerSnapshot {
    fn validate(&self) -> Result<(), QuoteError> {
        if self.customer_id.is_none() && self.lead_id.is_none() {
            return Err(QuoteError::validation("quote requires a customer or a lead"));
        }
        if self.name.trim().is_empty() {
            return Err(QuoteError::validation("customer name is required"));
        }
        if !self.email.contains('@') {
            return Err(QuoteError::validation(format!("invalid customer email '{}'", self.email)));
        }
        Ok(())
    }
}

/// Head counts; quotes carry no per-traveler identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelerCounts {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl TravelerCounts {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

/// Outbound email recorded against the quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentEmail {
    pub to: String,
    pub sent_at: DateTime<Utc>,
}

/// Customer decision on the offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approved_by: String,
    pub notes: Option<String>,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// Input for a new version-1 quote
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub tenant_id: TenantId,
    pub itinerary_id: ItineraryId,
    pub customer: CustomerSnapshot,
    pub travelers: TravelerCounts,
    pub travel_dates: DateRange,
    pub destination: String,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub discounts: Vec<Discount>,
    pub taxes: Vec<Tax>,
    pub validity: ValidityWindow,
    pub payment_schedule: PaymentSchedule,
    pub notes: Option<String>,
    pub created_by: UserId,
}

/// Fields a revision may replace; `None` keeps the parent's value
#[derive(Debug, Clone, Default)]
pub struct QuoteRevision {
    pub travelers: Option<TravelerCounts>,
    pub travel_dates: Option<DateRange>,
    pub line_items: Option<Vec<LineItem>>,
    pub discounts: Option<Vec<Discount>>,
    pub taxes: Option<Vec<Tax>>,
    pub validity: Option<ValidityWindow>,
    pub payment_schedule: Option<PaymentSchedule>,
    pub notes: Option<String>,
}

/// Everything a booking needs from an approved quote
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSnapshot {
    pub tenant_id: TenantId,
    pub quote_id: QuoteId,
    pub quote_number: String,
    pub itinerary_id: ItineraryId,
    pub customer: CustomerSnapshot,
    pub travelers: TravelerCounts,
    pub travel_dates: DateRange,
    pub destination: String,
    pub total_price: Money,
    pub deposit_due_date: Option<NaiveDate>,
}

/// The Quote aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    id: QuoteId,
    tenant_id: TenantId,
    /// Stable across the revision chain
    quote_number: String,
    /// Position in the revision chain, starting at 1
    version: u32,
    /// Version 1's id for every later version
    parent_quote: Option<QuoteId>,
    itinerary_id: ItineraryId,
    customer: CustomerSnapshot,
    travelers: TravelerCounts,
    travel_dates: DateRange,
    destination: String,
    currency: Currency,
    line_items: Vec<LineItem>,
    discounts: Vec<Discount>,
    taxes: Vec<Tax>,
    pricing: Pricing,
    validity: ValidityWindow,
    payment_schedule: PaymentSchedule,
    status: QuoteStatus,
    sent_at: Option<DateTime<Utc>>,
    viewed_at: Option<DateTime<Utc>>,
    approval: Option<Approval>,
    rejection: Option<Rejection>,
    expired_at: Option<DateTime<Utc>>,
    pdf_url: Option<String>,
    email_log: Vec<SentEmail>,
    booking_id: Option<BookingId>,
    converted_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_by: UserId,
    /// Optimistic concurrency token, bumped by the store on every write
    lock_version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Quote {
    /// Creates version 1 of a new quote chain
    pub fn new(input: NewQuote, quote_number: String, now: DateTime<Utc>) -> Result<Self, QuoteError> {
        input.customer.validate()?;
        if input.travelers.adults == 0 {
            return Err(QuoteError::validation("quote requires at least one adult traveler"));
        }

        let pricing = Pricing::compute(input.currency, &input.line_items, &input.discounts, &input.taxes)?;
        input.payment_schedule.validate_against(&pricing.grand_total)?;

        Ok(Self {
            id: QuoteId::new(),
            tenant_id: input.tenant_id,
            quote_number,
            version: 1,
            parent_quote: None,
            itinerary_id: input.itinerary_id,
            customer: input.customer,
            travelers: input.travelers,
            travel_dates: input.travel_dates,
            destination: input.destination,
            currency: input.currency,
            line_items: input.line_items,
            discounts: input.discounts,
            taxes: input.taxes,
            pricing,
            validity: input.validity,
            payment_schedule: input.payment_schedule,
            status: QuoteStatus::Draft,
            sent_at: None,
            viewed_at: None,
            approval: None,
            rejection: None,
            expired_at: None,
            pdf_url: None,
            email_log: Vec::new(),
            booking_id: None,
            converted_at: None,
            notes: input.notes,
            created_by: input.created_by,
            lock_version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> QuoteId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn quote_number(&self) -> &str {
        &self.quote_number
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn parent_quote(&self) -> Option<QuoteId> {
        self.parent_quote
    }

    /// Id of version 1 of this chain
    pub fn root_id(&self) -> QuoteId {
        self.parent_quote.unwrap_or(self.id)
    }

    pub fn itinerary_id(&self) -> ItineraryId {
        self.itinerary_id
    }

    pub fn customer(&self) -> &CustomerSnapshot {
        &self.customer
    }

    pub fn travelers(&self) -> TravelerCounts {
        self.travelers
    }

    pub fn travel_dates(&self) -> DateRange {
        self.travel_dates
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn discounts(&self) -> &[Discount] {
        &self.discounts
    }

    pub fn taxes(&self) -> &[Tax] {
        &self.taxes
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn validity(&self) -> ValidityWindow {
        self.validity
    }

    pub fn payment_schedule(&self) -> &PaymentSchedule {
        &self.payment_schedule
    }

    pub fn status(&self) -> QuoteStatus {
        self.status
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    pub fn viewed_at(&self) -> Option<DateTime<Utc>> {
        self.viewed_at
    }

    pub fn approval(&self) -> Option<&Approval> {
        self.approval.as_ref()
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_ref()
    }

    pub fn expired_at(&self) -> Option<DateTime<Utc>> {
        self.expired_at
    }

    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    pub fn email_log(&self) -> &[SentEmail] {
        &self.email_log
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    pub fn converted_at(&self) -> Option<DateTime<Utc>> {
        self.converted_at
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

    pub fn is_editable(&self) -> bool {
        self.status == QuoteStatus::Draft
    }

    fn ensure_editable(&self) -> Result<(), QuoteError> {
        if !self.is_editable() {
            return Err(QuoteError::NotEditable {
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    fn transition_error(&self, to: QuoteStatus) -> QuoteError {
        QuoteError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Deletion is only allowed for drafts
    pub fn ensure_deletable(&self) -> Result<(), QuoteError> {
        self.ensure_editable()
    }

    /// Expires a sent or viewed quote whose validity window has lapsed.
    ///
    /// Must run before persisting any quote; returns true if the status changed.
    pub fn apply_lazy_expiry(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_awaiting_customer() && self.validity.has_lapsed(now) {
            self.status = QuoteStatus::Expired;
            self.expired_at = Some(now);
            self.updated_at = now;
            return true;
        }
        false
    }

    /// Replaces the priced content of a draft and recomputes totals
    pub fn update_pricing(
        &mut self,
        line_items: Vec<LineItem>,
        discounts: Vec<Discount>,
        taxes: Vec<Tax>,
        now: DateTime<Utc>,
    ) -> Result<(), QuoteError> {
        self.ensure_editable()?;
        let pricing = Pricing::compute(self.currency, &line_items, &discounts, &taxes)?;
        self.payment_schedule.validate_against(&pricing.grand_total)?;

        self.line_items = line_items;
        self.discounts = discounts;
        self.taxes = taxes;
        self.pricing = pricing;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_payment_schedule(
        &mut self,
        schedule: PaymentSchedule,
        now: DateTime<Utc>,
    ) -> Result<(), QuoteError> {
        self.ensure_editable()?;
        schedule.validate_against(&self.pricing.grand_total)?;
        self.payment_schedule = schedule;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_validity(&mut self, validity: ValidityWindow, now: DateTime<Utc>) -> Result<(), QuoteError> {
        self.ensure_editable()?;
        self.validity = validity;
        self.updated_at = now;
        Ok(())
    }

    /// Records the rendered PDF location
    pub fn attach_pdf(&mut self, url: impl Into<String>, now: DateTime<Utc>) {
        self.pdf_url = Some(url.into());
        self.updated_at = now;
    }

    /// Sends a draft, or resends an already sent quote
    pub fn mark_as_sent(&mut self, recipient: &str, now: DateTime<Utc>) -> Result<(), QuoteError> {
        if !matches!(self.status, QuoteStatus::Draft | QuoteStatus::Sent) {
            return Err(self.transition_error(QuoteStatus::Sent));
        }
        if self.line_items.is_empty() {
            return Err(QuoteError::validation("cannot send a quote without line items"));
        }
        if self.validity.has_lapsed(now) {
            return Err(QuoteError::validation("validity window has already lapsed"));
        }

        self.status = QuoteStatus::Sent;
        self.sent_at = Some(now);
        self.email_log.push(SentEmail {
            to: recipient.to_string(),
            sent_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Records the first customer view; a no-op unless the quote is sent
    pub fn mark_as_viewed(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != QuoteStatus::Sent {
            return false;
        }
        self.status = QuoteStatus::Viewed;
        self.viewed_at.get_or_insert(now);
        self.updated_at = now;
        true
    }

    pub fn approve(
        &mut self,
        customer_name: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), QuoteError> {
        if !self.status.is_awaiting_customer() {
            return Err(self.transition_error(QuoteStatus::Approved));
        }
        self.status = QuoteStatus::Approved;
        self.approval = Some(Approval {
            approved_by: customer_name.to_string(),
            notes,
            approved_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), QuoteError> {
        if !self.status.is_awaiting_customer() {
            return Err(self.transition_error(QuoteStatus::Rejected));
        }
        self.status = QuoteStatus::Rejected;
        self.rejection = Some(Rejection {
            reason: reason.to_string(),
            rejected_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Builds the next version of this quote as a fresh draft.
    ///
    /// Workflow fields (send, view, decision, PDF, email log, booking link)
    /// are not carried over.
    pub fn create_revision(
        &self,
        updates: QuoteRevision,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Quote, QuoteError> {
        if self.status == QuoteStatus::Converted {
            return Err(QuoteError::AlreadyConverted(self.id));
        }

        let mut revision = Quote {
            id: QuoteId::new(),
            version: self.version + 1,
            parent_quote: Some(self.root_id()),
            status: QuoteStatus::Draft,
            sent_at: None,
            viewed_at: None,
            approval: None,
            rejection: None,
            expired_at: None,
            pdf_url: None,
            email_log: Vec::new(),
            booking_id: None,
            converted_at: None,
            created_by: actor,
            lock_version: 0,
            created_at: now,
            updated_at: now,
            ..self.clone()
        };

        if let Some(travelers) = updates.travelers {
            if travelers.adults == 0 {
                return Err(QuoteError::validation("quote requires at least one adult traveler"));
            }
            revision.travelers = travelers;
        }
        if let Some(dates) = updates.travel_dates {
            revision.travel_dates = dates;
        }
        if let Some(validity) = updates.validity {
            revision.validity = validity;
        }
        if updates.notes.is_some() {
            revision.notes = updates.notes;
        }
        if let Some(schedule) = updates.payment_schedule {
            revision.payment_schedule = schedule;
        }

        let line_items = updates.line_items.unwrap_or_else(|| revision.line_items.clone());
        let discounts = updates.discounts.unwrap_or_else(|| revision.discounts.clone());
        let taxes = updates.taxes.unwrap_or_else(|| revision.taxes.clone());
        revision.update_pricing(line_items, discounts, taxes, now)?;

        Ok(revision)
    }

    /// Snapshot for booking creation; only approved, unconverted quotes qualify
    pub fn conversion_snapshot(&self) -> Result<ConversionSnapshot, QuoteError> {
        self.ensure_convertible()?;
        Ok(ConversionSnapshot {
            tenant_id: self.tenant_id,
            quote_id: self.id,
            quote_number: self.quote_number.clone(),
            itinerary_id: self.itinerary_id,
            customer: self.customer.clone(),
            travelers: self.travelers,
            travel_dates: self.travel_dates,
            destination: self.destination.clone(),
            total_price: self.pricing.grand_total,
            deposit_due_date: self.payment_schedule.deposit_due_date(),
        })
    }

    pub fn mark_converted(&mut self, booking_id: BookingId, now: DateTime<Utc>) -> Result<(), QuoteError> {
        self.ensure_convertible()?;
        self.status = QuoteStatus::Converted;
        self.booking_id = Some(booking_id);
        self.converted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_convertible(&self) -> Result<(), QuoteError> {
        if self.booking_id.is_some() || self.status == QuoteStatus::Converted {
            return Err(QuoteError::AlreadyConverted(self.id));
        }
        if self.status != QuoteStatus::Approved {
            return Err(self.transition_error(QuoteStatus::Converted));
        }
        Ok(())
    }
}
