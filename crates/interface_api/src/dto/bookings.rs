//! Booking and payment DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use app_services::{AddPaymentInput, CreateBookingInput, RecordedPayment, ServiceResult};
use core_kernel::{CustomerId, InvoiceId, ItineraryId, PaymentMethod, QuoteId};
use domain_billing::{Invoice, Payment};
use domain_booking::{Booking, BookingCustomer, BookingStatus, EntryStatus, Traveler, TravelerKind};

use super::{money, parse_currency};

#[derive(Debug, Deserialize, Validate)]
pub struct BookingCustomerRequest {
    pub customer_id: Option<CustomerId>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct TravelerRequest {
    pub kind: TravelerKind,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub passport_number: Option<String>,
}

impl From<TravelerRequest> for Traveler {
    fn from(t: TravelerRequest) -> Self {
        let mut traveler = Traveler::named(t.kind, t.name);
        traveler.date_of_birth = t.date_of_birth;
        traveler.passport_number = t.passport_number;
        traveler
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub quote_id: Option<QuoteId>,
    pub itinerary_id: Option<ItineraryId>,
    #[validate(nested)]
    pub customer: BookingCustomerRequest,
    #[validate(length(min = 1, message = "at least one traveler is required"))]
    #[validate(nested)]
    pub travelers: Vec<TravelerRequest>,
    pub travel_start: NaiveDate,
    pub travel_end: NaiveDate,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub destination: String,
    pub total_price: Decimal,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: String,
    pub deposit_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl CreateBookingRequest {
    pub fn into_input(self) -> ServiceResult<CreateBookingInput> {
        let currency = parse_currency(&self.currency)?;
        Ok(CreateBookingInput {
            quote_id: self.quote_id,
            itinerary_id: self.itinerary_id,
            customer: BookingCustomer {
                customer_id: self.customer.customer_id,
                name: self.customer.name,
                email: self.customer.email,
                phone: self.customer.phone,
            },
            travelers: self.travelers.into_iter().map(Into::into).collect(),
            travel_start: self.travel_start,
            travel_end: self.travel_end,
            destination: self.destination,
            total_price: money(self.total_price, currency),
            deposit_due_date: self.deposit_due_date,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTotalPriceRequest {
    pub total_price: Decimal,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: String,
    pub deposit_due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddPaymentRequest {
    pub amount: Decimal,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: String,
    pub method: PaymentMethod,
    /// `completed` when omitted
    pub status: Option<EntryStatus>,
    pub invoice_id: Option<InvoiceId>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl AddPaymentRequest {
    pub fn into_input(self) -> ServiceResult<AddPaymentInput> {
        let currency = parse_currency(&self.currency)?;
        let mut input = AddPaymentInput::completed(money(self.amount, currency), self.method);
        if let Some(status) = self.status {
            input.status = status;
        }
        input.invoice_id = self.invoice_id;
        input.reference = self.reference;
        input.notes = self.notes;
        Ok(input)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct FailPaymentRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub reason: String,
}

/// Every document a payment operation wrote
#[derive(Debug, Serialize)]
pub struct RecordedPaymentResponse {
    pub booking: Booking,
    pub payment: Payment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
}

impl From<RecordedPayment> for RecordedPaymentResponse {
    fn from(recorded: RecordedPayment) -> Self {
        Self {
            booking: recorded.booking,
            payment: recorded.payment,
            invoice: recorded.invoice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_payment_defaults_to_completed() {
        let request: AddPaymentRequest = serde_json::from_value(json!({
            "amount": "250.00",
            "currency": "USD",
            "method": "bank_transfer"
        }))
        .unwrap();

        let input = request.into_input().unwrap();
        assert_eq!(input.status, EntryStatus::Completed);
        assert_eq!(input.amount.amount(), dec!(250.00));
        assert_eq!(input.amount.currency(), Currency::USD);
        assert_eq!(input.method, PaymentMethod::BankTransfer);
    }

    #[test]
    fn test_pending_payment_status_kept() {
        let request: AddPaymentRequest = serde_json::from_value(json!({
            "amount": 100,
            "currency": "USD",
            "method": "credit_card",
            "status": "pending"
        }))
        .unwrap();

        assert_eq!(request.into_input().unwrap().status, EntryStatus::Pending);
    }

    #[test]
    fn test_booking_requires_travelers() {
        let request: CreateBookingRequest = serde_json::from_value(json!({
            "customer": { "name": "Li Wei", "email": "li@example.com" },
            "travelers": [],
            "travel_start": "2025-06-01",
            "travel_end": "2025-06-08",
            "destination": "Kyoto",
            "total_price": "3200.00",
            "currency": "USD"
        }))
        .unwrap();

        assert!(request.validate().is_err());
    }

    #[test]
    fn test_unknown_currency_rejected() {
        let request: UpdateTotalPriceRequest = serde_json::from_value(json!({
            "total_price": "10",
            "currency": "XXX"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(
            super::super::parse_currency(&request.currency).unwrap_err().code(),
            "validation_error"
        );
    }
}
