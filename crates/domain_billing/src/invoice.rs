//! Invoice management
//!
//! Invoices track what a customer owes independently of the booking ledger.
//! `amount_due = total - amount_paid` holds after every mutation and the
//! status follows from `amount_paid` against `total` and the due date.
//!
//! ```text
//! draft → sent → { partial | paid | overdue | cancelled | refunded }
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{
    BookingId, Currency, CustomerId, InvoiceId, LineItemId, Money, PaymentMethod, QuoteId, TenantId,
};

use crate::error::BillingError;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Invoice is being drafted
    Draft,
    /// Invoice has been sent to customer
    Sent,
    /// Partial payment received
    Partial,
    /// Fully paid
    Paid,
    /// Past due date without full payment
    Overdue,
    /// Cancelled/voided
    Cancelled,
    /// All collected money was returned
    Refunded,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Refunded => "refunded",
        }
    }

    /// States the overdue classification never touches
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Paid | InvoiceStatus::Cancelled | InvoiceStatus::Refunded
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of invoice items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceItemType {
    /// Travel component (flight, hotel, package, ...)
    TravelService,
    /// Agency service fee
    ServiceFee,
    /// Deposit instalment
    Deposit,
    /// Remaining balance of a booking
    Balance,
    /// Manual adjustment
    Adjustment,
    /// Other charge
    Other,
}

/// A line item on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Item ID
    pub id: LineItemId,
    /// Description
    pub description: String,
    /// Item type
    pub item_type: InvoiceItemType,
    /// Quantity
    pub quantity: Decimal,
    /// Unit price
    pub unit_price: Money,
    /// Discount (if any)
    pub discount: Option<Money>,
}

impl InvoiceItem {
    /// Creates a new invoice item
    pub fn new(description: impl Into<String>, item_type: InvoiceItemType, unit_price: Money) -> Self {
        Self {
            id: LineItemId::new(),
            description: description.into(),
            item_type,
            quantity: Decimal::ONE,
            unit_price,
            discount: None,
        }
    }

    /// Sets the quantity
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    /// Applies a discount
    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Calculates the total for this item
    pub fn total(&self) -> Result<Money, BillingError> {
        let gross = self.unit_price.multiply(self.quantity).round_to_currency();
        match &self.discount {
            Some(d) => Ok(gross.checked_sub(d)?),
            None => Ok(gross),
        }
    }
}

/// Where the invoice is addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillTo {
    pub customer_id: Option<CustomerId>,
    pub name: String,
    pub email: String,
}

/// Payment-gateway view of the invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    RequiresPayment,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl GatewayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayStatus::RequiresPayment => "requires_payment",
            GatewayStatus::Processing => "processing",
            GatewayStatus::Succeeded => "succeeded",
            GatewayStatus::Failed => "failed",
            GatewayStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayState {
    pub provider: String,
    pub payment_intent_id: Option<String>,
    pub status: GatewayStatus,
    /// Creation time of the newest event applied to this invoice
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_event_id: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceEmail {
    pub to: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalNote {
    pub author: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceEntryKind {
    Payment,
    Refund,
}

/// Audit trail of money recorded against the invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceEntry {
    pub kind: InvoiceEntryKind,
    pub amount: Money,
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Input for a new invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub tenant_id: TenantId,
    pub booking_id: Option<BookingId>,
    pub quote_id: Option<QuoteId>,
    pub bill_to: BillTo,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: Currency,
    pub items: Vec<InvoiceItem>,
    pub tax: Option<Money>,
    pub notes: Option<String>,
}

/// An invoice for travel services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: TenantId,
    invoice_number: String,
    booking_id: Option<BookingId>,
    quote_id: Option<QuoteId>,
    bill_to: BillTo,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    currency: Currency,
    items: Vec<InvoiceItem>,
    subtotal: Money,
    tax: Option<Money>,
    total: Money,
    amount_paid: Money,
    amount_due: Money,
    status: InvoiceStatus,
    entries: Vec<InvoiceEntry>,
    gateway: Option<GatewayState>,
    email_log: Vec<InvoiceEmail>,
    internal_notes: Vec<InternalNote>,
    sent_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    notes: Option<String>,
    /// Optimistic concurrency token, bumped by the store on every write
    lock_version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a draft invoice
    pub fn new(input: NewInvoice, invoice_number: String, now: DateTime<Utc>) -> Result<Self, BillingError> {
        if input.items.is_empty() {
            return Err(BillingError::validation("invoice requires at least one item"));
        }
        if input.due_date < input.issue_date {
            return Err(BillingError::validation("due date cannot precede issue date"));
        }

        let currency = input.currency;
        let mut subtotal = Money::zero(currency);
        for item in &input.items {
            subtotal = subtotal.checked_add(&item.total()?)?;
        }
        let total = match &input.tax {
            Some(tax) => subtotal.checked_add(tax)?,
            None => subtotal,
        };
        if !total.is_positive() {
            return Err(BillingError::validation("invoice total must be positive"));
        }

        Ok(Self {
            id: InvoiceId::new(),
            tenant_id: input.tenant_id,
            invoice_number,
            booking_id: input.booking_id,
            quote_id: input.quote_id,
            bill_to: input.bill_to,
            issue_date: input.issue_date,
            due_date: input.due_date,
            currency,
            items: input.items,
            subtotal,
            tax: input.tax,
            total,
            amount_paid: Money::zero(currency),
            amount_due: total,
            status: InvoiceStatus::Draft,
            entries: Vec::new(),
            gateway: None,
            email_log: Vec::new(),
            internal_notes: Vec::new(),
            sent_at: None,
            paid_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            notes: input.notes,
            lock_version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    pub fn quote_id(&self) -> Option<QuoteId> {
        self.quote_id
    }

    pub fn bill_to(&self) -> &BillTo {
        &self.bill_to
    }

    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax(&self) -> Option<Money> {
        self.tax
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    pub fn amount_due(&self) -> Money {
        self.amount_due
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn entries(&self) -> &[InvoiceEntry] {
        &self.entries
    }

    pub fn gateway(&self) -> Option<&GatewayState> {
        self.gateway.as_ref()
    }

    pub fn email_log(&self) -> &[InvoiceEmail] {
        &self.email_log
    }

    pub fn internal_notes(&self) -> &[InternalNote] {
        &self.internal_notes
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
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

    /// Sends a draft, or logs a resend of an open invoice
    pub fn mark_as_sent(&mut self, email: &str, now: DateTime<Utc>) -> Result<(), BillingError> {
        match self.status {
            InvoiceStatus::Draft => {
                self.status = InvoiceStatus::Sent;
                self.sent_at = Some(now);
            }
            InvoiceStatus::Sent | InvoiceStatus::Partial | InvoiceStatus::Overdue | InvoiceStatus::Paid => {}
            InvoiceStatus::Cancelled | InvoiceStatus::Refunded => {
                return Err(BillingError::transition(self.status, InvoiceStatus::Sent));
            }
        }
        self.email_log.push(InvoiceEmail {
            to: email.to_string(),
            sent_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Cancelled and refunded invoices take no further money
    pub fn accepts_payments(&self) -> bool {
        !matches!(self.status, InvoiceStatus::Cancelled | InvoiceStatus::Refunded)
    }

    /// Records money received against the invoice
    pub fn mark_as_paid(
        &mut self,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        if !self.accepts_payments() {
            return Err(BillingError::transition(self.status, InvoiceStatus::Paid));
        }
        if !amount.is_positive() {
            return Err(BillingError::validation("payment amount must be positive"));
        }

        self.amount_paid = self.amount_paid.checked_add(&amount)?;
        self.amount_due = self.total.checked_sub(&self.amount_paid)?;
        self.entries.push(InvoiceEntry {
            kind: InvoiceEntryKind::Payment,
            amount,
            method: Some(method),
            reference,
            reason: None,
            at: now,
        });

        if self.amount_paid >= self.total {
            self.status = InvoiceStatus::Paid;
            self.paid_at = Some(now);
        } else if self.amount_paid.is_positive() {
            self.status = InvoiceStatus::Partial;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Explicitly flags a sent or partially paid invoice as overdue
    pub fn mark_as_overdue(&mut self, now: DateTime<Utc>) -> Result<(), BillingError> {
        if !matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Partial) {
            return Err(BillingError::transition(self.status, InvoiceStatus::Overdue));
        }
        self.status = InvoiceStatus::Overdue;
        self.updated_at = now;
        Ok(())
    }

    /// Passive classification used by reads and the periodic sweep.
    ///
    /// Returns true when a sent or partial invoice past its due date was
    /// reclassified. Amounts are untouched.
    pub fn classify_overdue(&mut self, today: NaiveDate, now: DateTime<Utc>) -> bool {
        if matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Partial) && today > self.due_date {
            self.status = InvoiceStatus::Overdue;
            self.updated_at = now;
            return true;
        }
        false
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Overdue
            || (matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Partial) && today > self.due_date)
    }

    /// Returns collected money; only legal once something was paid.
    ///
    /// A past-due invoice that collected part of its total stays overdue
    /// until every payment is returned.
    pub fn refund(&mut self, amount: Money, reason: &str, now: DateTime<Utc>) -> Result<(), BillingError> {
        if !self.is_refundable() {
            return Err(BillingError::transition(self.status, InvoiceStatus::Refunded));
        }
        if !amount.is_positive() {
            return Err(BillingError::validation("refund amount must be positive"));
        }
        if amount > self.amount_paid {
            return Err(BillingError::RefundExceedsCollected {
                requested: amount.to_string(),
                collected: self.amount_paid.to_string(),
            });
        }

        self.amount_paid = self.amount_paid.checked_sub(&amount)?;
        self.amount_due = self.total.checked_sub(&self.amount_paid)?;
        self.entries.push(InvoiceEntry {
            kind: InvoiceEntryKind::Refund,
            amount,
            method: None,
            reference: None,
            reason: Some(reason.to_string()),
            at: now,
        });

        self.status = if !self.amount_paid.is_positive() {
            InvoiceStatus::Refunded
        } else if self.amount_paid >= self.total {
            InvoiceStatus::Paid
        } else if self.status == InvoiceStatus::Overdue {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Partial
        };
        self.updated_at = now;
        Ok(())
    }

    pub fn is_refundable(&self) -> bool {
        match self.status {
            InvoiceStatus::Paid | InvoiceStatus::Partial => true,
            InvoiceStatus::Overdue => self.amount_paid.is_positive(),
            _ => false,
        }
    }

    /// Voids an invoice on which nothing was collected
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), BillingError> {
        let cancellable = matches!(
            self.status,
            InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Overdue
        );
        if !cancellable || self.amount_paid.is_positive() {
            return Err(BillingError::transition(self.status, InvoiceStatus::Cancelled));
        }
        self.status = InvoiceStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Online collection needs a sent, unsettled invoice
    pub fn ensure_collectable(&self) -> Result<(), BillingError> {
        if self.status.is_terminal() || self.status == InvoiceStatus::Draft {
            return Err(BillingError::transition(self.status, "payment_intent"));
        }
        Ok(())
    }

    /// Records a freshly created gateway payment intent
    pub fn record_payment_intent(&mut self, provider: &str, intent_id: &str, now: DateTime<Utc>) -> Result<(), BillingError> {
        self.ensure_collectable()?;
        self.gateway = Some(GatewayState {
            provider: provider.to_string(),
            payment_intent_id: Some(intent_id.to_string()),
            status: GatewayStatus::RequiresPayment,
            last_event_at: None,
            last_event_id: None,
            last_error: None,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Stores the gateway status reported by an event
    pub fn set_gateway_status(
        &mut self,
        provider: &str,
        status: GatewayStatus,
        event_id: &str,
        event_at: DateTime<Utc>,
        error: Option<String>,
        now: DateTime<Utc>,
    ) {
        let state = self.gateway.get_or_insert_with(|| GatewayState {
            provider: provider.to_string(),
            payment_intent_id: None,
            status,
            last_event_at: None,
            last_event_id: None,
            last_error: None,
        });
        state.status = status;
        state.last_event_at = Some(event_at);
        state.last_event_id = Some(event_id.to_string());
        state.last_error = error;
        self.updated_at = now;
    }

    pub fn add_internal_note(&mut self, author: &str, text: impl Into<String>, now: DateTime<Utc>) {
        self.internal_notes.push(InternalNote {
            author: author.to_string(),
            text: text.into(),
            at: now,
        });
        self.updated_at = now;
    }
}
