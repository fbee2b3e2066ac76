//! Quote DTOs

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use app_services::{CreateQuoteInput, ServiceResult};
use core_kernel::{Currency, CustomerId, DateRange, ItineraryId, LeadId, ValidityWindow};
use domain_booking::Booking;
use domain_quote::{
    CustomerSnapshot, Discount, LineItem, LineItemType, Milestone, PaymentSchedule, Quote, QuoteRevision, Tax,
    TravelerCounts,
};

use super::{money, parse_currency};

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerRequest {
    pub customer_id: Option<CustomerId>,
    pub lead_id: Option<LeadId>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub phone: Option<String>,
}

impl From<CustomerRequest> for CustomerSnapshot {
    fn from(c: CustomerRequest) -> Self {
        CustomerSnapshot {
            customer_id: c.customer_id,
            lead_id: c.lead_id,
            name: c.name,
            email: c.email,
            phone: c.phone,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct TravelerCountsRequest {
    #[validate(range(min = 1, message = "at least one adult is required"))]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

impl From<TravelerCountsRequest> for TravelerCounts {
    fn from(t: TravelerCountsRequest) -> Self {
        TravelerCounts {
            adults: t.adults,
            children: t.children,
            infants: t.infants,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TravelDatesRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LineItemRequest {
    pub item_type: LineItemType,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: String,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Percentage,
    Fixed,
}

/// A discount or a tax, depending on the list it appears in
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: String,
    pub kind: AdjustmentKind,
    pub value: Decimal,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct MilestoneRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub label: String,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    pub itinerary_id: ItineraryId,
    #[validate(nested)]
    pub customer: CustomerRequest,
    #[validate(nested)]
    pub travelers: TravelerCountsRequest,
    pub travel_dates: Option<TravelDatesRequest>,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: String,
    #[serde(default)]
    #[validate(nested)]
    pub line_items: Vec<LineItemRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub discounts: Vec<AdjustmentRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub taxes: Vec<AdjustmentRequest>,
    #[validate(range(min = 1, max = 365, message = "must be between 1 and 365"))]
    pub valid_for_days: Option<i64>,
    pub payment_schedule: Option<Vec<MilestoneRequest>>,
    pub notes: Option<String>,
}

impl CreateQuoteRequest {
    pub fn into_input(self) -> ServiceResult<CreateQuoteInput> {
        let currency = parse_currency(&self.currency)?;
        Ok(CreateQuoteInput {
            itinerary_id: self.itinerary_id,
            customer: self.customer.into(),
            travelers: self.travelers.into(),
            travel_dates: self.travel_dates.map(date_range).transpose()?,
            currency,
            line_items: line_items(self.line_items, currency)?,
            discounts: discounts(self.discounts, currency),
            taxes: taxes(self.taxes, currency),
            valid_for_days: self.valid_for_days,
            payment_schedule: self.payment_schedule.map(|m| schedule(m, currency)),
            notes: self.notes,
        })
    }
}

/// Replaces the whole pricing block of a draft quote
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePricingRequest {
    #[validate(nested)]
    pub line_items: Vec<LineItemRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub discounts: Vec<AdjustmentRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub taxes: Vec<AdjustmentRequest>,
}

impl UpdatePricingRequest {
    pub fn into_parts(self, currency: Currency) -> ServiceResult<(Vec<LineItem>, Vec<Discount>, Vec<Tax>)> {
        Ok((
            line_items(self.line_items, currency)?,
            discounts(self.discounts, currency),
            taxes(self.taxes, currency),
        ))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentScheduleRequest {
    #[validate(length(min = 1, message = "at least one milestone is required"))]
    #[validate(nested)]
    pub milestones: Vec<MilestoneRequest>,
}

impl PaymentScheduleRequest {
    pub fn into_schedule(self, currency: Currency) -> PaymentSchedule {
        schedule(self.milestones, currency)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendQuoteRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub recipient: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveQuoteRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub approver_name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectQuoteRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub reason: String,
}

/// Fields to change in the new version; omitted fields carry over
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviseQuoteRequest {
    #[validate(nested)]
    pub travelers: Option<TravelerCountsRequest>,
    pub travel_dates: Option<TravelDatesRequest>,
    pub line_items: Option<Vec<LineItemRequest>>,
    pub discounts: Option<Vec<AdjustmentRequest>>,
    pub taxes: Option<Vec<AdjustmentRequest>>,
    #[validate(range(min = 1, max = 365, message = "must be between 1 and 365"))]
    pub valid_for_days: Option<i64>,
    pub payment_schedule: Option<Vec<MilestoneRequest>>,
    pub notes: Option<String>,
}

impl ReviseQuoteRequest {
    /// `now` anchors a renewed validity window
    pub fn into_revision(self, currency: Currency, now: DateTime<Utc>) -> ServiceResult<QuoteRevision> {
        let validity = self
            .valid_for_days
            .map(|days| ValidityWindow::new(now, now + Duration::days(days)))
            .transpose()?;
        Ok(QuoteRevision {
            travelers: self.travelers.map(Into::into),
            travel_dates: self.travel_dates.map(date_range).transpose()?,
            line_items: self.line_items.map(|items| line_items(items, currency)).transpose()?,
            discounts: self.discounts.map(|d| discounts(d, currency)),
            taxes: self.taxes.map(|t| taxes(t, currency)),
            validity,
            payment_schedule: self.payment_schedule.map(|m| schedule(m, currency)),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub booking: Booking,
    pub quote: Quote,
}

fn date_range(dates: TravelDatesRequest) -> ServiceResult<DateRange> {
    Ok(DateRange::new(dates.start, dates.end)?)
}

fn line_items(items: Vec<LineItemRequest>, currency: Currency) -> ServiceResult<Vec<LineItem>> {
    items
        .into_iter()
        .map(|item| {
            Ok(LineItem::new(
                item.item_type,
                item.description,
                item.quantity,
                money(item.unit_price, currency),
            )?)
        })
        .collect()
}

fn discounts(requests: Vec<AdjustmentRequest>, currency: Currency) -> Vec<Discount> {
    requests
        .into_iter()
        .map(|d| match d.kind {
            AdjustmentKind::Percentage => Discount::percentage(d.description, d.value),
            AdjustmentKind::Fixed => Discount::fixed(d.description, money(d.value, currency)),
        })
        .collect()
}

fn taxes(requests: Vec<AdjustmentRequest>, currency: Currency) -> Vec<Tax> {
    requests
        .into_iter()
        .map(|t| match t.kind {
            AdjustmentKind::Percentage => Tax::percentage(t.description, t.value),
            AdjustmentKind::Fixed => Tax::fixed(t.description, money(t.value, currency)),
        })
        .collect()
}

fn schedule(milestones: Vec<MilestoneRequest>, currency: Currency) -> PaymentSchedule {
    PaymentSchedule::new(
        milestones
            .into_iter()
            .map(|m| Milestone {
                label: m.label,
                due_date: m.due_date,
                amount: money(m.amount, currency),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn create_body() -> serde_json::Value {
        json!({
            "itinerary_id": ItineraryId::new(),
            "customer": { "name": "Ana Ruiz", "email": "ana@example.com" },
            "travelers": { "adults": 2 },
            "currency": "eur",
            "line_items": [
                { "item_type": "hotel", "description": "Riad, 4 nights", "quantity": 2, "unit_price": "400.00" }
            ],
            "discounts": [ { "description": "Loyalty", "kind": "percentage", "value": "10" } ],
            "taxes": [ { "description": "VAT", "kind": "percentage", "value": "12.5" } ]
        })
    }

    #[test]
    fn test_create_request_converts() {
        let request: CreateQuoteRequest = serde_json::from_value(create_body()).unwrap();
        assert!(request.validate().is_ok());

        let input = request.into_input().unwrap();
        assert_eq!(input.currency, Currency::EUR);
        assert_eq!(input.travelers.adults, 2);
        assert_eq!(input.travelers.children, 0);
        assert_eq!(input.line_items.len(), 1);
        assert_eq!(input.line_items[0].unit_price.amount(), dec!(400.00));
        assert_eq!(input.discounts.len(), 1);
        assert!(input.payment_schedule.is_none());
    }

    #[test]
    fn test_nested_validation_reports_path() {
        let mut body = create_body();
        body["customer"]["email"] = json!("not-an-email");
        body["line_items"][0]["quantity"] = json!(0);
        let request: CreateQuoteRequest = serde_json::from_value(body).unwrap();

        let errors = request.validate().unwrap_err();
        let crate::error::ApiError::Validation(details) = crate::error::ApiError::from(errors) else {
            panic!("expected validation details");
        };
        assert!(details.iter().any(|d| d.starts_with("customer.email")));
        assert!(details.iter().any(|d| d.starts_with("line_items[0].quantity")));
    }

    #[test]
    fn test_inverted_travel_dates_rejected() {
        let mut body = create_body();
        body["travel_dates"] = json!({ "start": "2025-06-10", "end": "2025-06-01" });
        let request: CreateQuoteRequest = serde_json::from_value(body).unwrap();

        let err = request.into_input().unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_revision_keeps_omitted_fields_unset() {
        let now = Utc::now();
        let revision = ReviseQuoteRequest {
            valid_for_days: Some(14),
            ..Default::default()
        }
        .into_revision(Currency::EUR, now)
        .unwrap();

        assert!(revision.line_items.is_none());
        assert!(revision.travelers.is_none());
        let validity = revision.validity.unwrap();
        assert_eq!(validity.valid_until - validity.valid_from, Duration::days(14));
    }
}
