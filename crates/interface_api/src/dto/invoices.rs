//! Invoice DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use app_services::{CreateInvoiceInput, MarkPaidInput, ServiceResult};
use core_kernel::{BookingId, Currency, CustomerId, PaymentMethod, QuoteId};
use domain_billing::{BillTo, InvoiceItem, InvoiceItemType};
use domain_reconciliation::PaymentIntent;

use super::{money, parse_currency};

#[derive(Debug, Deserialize, Validate)]
pub struct BillToRequest {
    pub customer_id: Option<CustomerId>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct InvoiceItemRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: String,
    pub item_type: InvoiceItemType,
    /// One when omitted
    pub quantity: Option<Decimal>,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub booking_id: Option<BookingId>,
    pub quote_id: Option<QuoteId>,
    #[validate(nested)]
    pub bill_to: BillToRequest,
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: String,
    #[validate(length(min = 1, message = "at least one item is required"))]
    #[validate(nested)]
    pub items: Vec<InvoiceItemRequest>,
    pub tax: Option<Decimal>,
    pub notes: Option<String>,
}

impl CreateInvoiceRequest {
    pub fn into_input(self) -> ServiceResult<CreateInvoiceInput> {
        let currency = parse_currency(&self.currency)?;
        Ok(CreateInvoiceInput {
            booking_id: self.booking_id,
            quote_id: self.quote_id,
            bill_to: BillTo {
                customer_id: self.bill_to.customer_id,
                name: self.bill_to.name,
                email: self.bill_to.email,
            },
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency,
            items: self
                .items
                .into_iter()
                .map(|item| {
                    let line = InvoiceItem::new(item.description, item.item_type, money(item.unit_price, currency));
                    match item.quantity {
                        Some(quantity) => line.with_quantity(quantity),
                        None => line,
                    }
                })
                .collect(),
            tax: self.tax.map(|t| money(t, currency)),
            notes: self.notes,
        })
    }
}

/// Bills a booking's balance, or `amount` of it
#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceFromBookingRequest {
    pub due_date: NaiveDate,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SendInvoiceRequest {
    /// Defaults to the bill-to email
    #[validate(email(message = "must be a valid email address"))]
    pub recipient: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MarkPaidRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

impl MarkPaidRequest {
    pub fn into_input(self, currency: Currency) -> MarkPaidInput {
        MarkPaidInput {
            amount: money(self.amount, currency),
            method: self.method,
            reference: self.reference,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundInvoiceRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelInvoiceRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InternalNoteRequest {
    #[validate(length(min = 1, max = 2000, message = "must be between 1 and 2000 characters"))]
    pub text: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PaymentIntentRequest {
    /// Outstanding balance when omitted
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

impl From<PaymentIntent> for PaymentIntentResponse {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
        }
    }
}
