//! Test Data Builders
//!
//! Builders for service inputs and gateway webhook bodies. Tests set only
//! the fields they care about.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Map, Value};

use app_services::{CreateBookingInput, CreateInvoiceInput, CreateQuoteInput};
use core_kernel::{BookingId, Currency, InvoiceId, ItineraryId, Money, TenantId};
use domain_billing::{InvoiceItem, InvoiceItemType};
use domain_booking::{Traveler, TravelerKind};
use domain_quote::{Discount, LineItem, LineItemType, Tax};

use crate::fixtures::{CustomerFixtures, IdFixtures, MoneyFixtures, TemporalFixtures};

/// Builds a quote request; defaults to a single 1000 USD package
pub struct QuoteInputBuilder {
    itinerary_id: ItineraryId,
    currency: Currency,
    line_items: Vec<LineItem>,
    discounts: Vec<Discount>,
    taxes: Vec<Tax>,
    valid_for_days: Option<i64>,
}

impl Default for QuoteInputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteInputBuilder {
    pub fn new() -> Self {
        Self {
            itinerary_id: IdFixtures::itinerary_id(),
            currency: Currency::USD,
            line_items: vec![LineItem::new(LineItemType::Package, "Backwaters package", 1, MoneyFixtures::usd_1000())
                .expect("valid line item")],
            discounts: Vec::new(),
            taxes: Vec::new(),
            valid_for_days: None,
        }
    }

    pub fn with_itinerary(mut self, itinerary_id: ItineraryId) -> Self {
        self.itinerary_id = itinerary_id;
        self
    }

    pub fn with_line_item(mut self, item_type: LineItemType, quantity: u32, unit_price: Money) -> Self {
        self.line_items
            .push(LineItem::new(item_type, format!("{:?}", item_type), quantity, unit_price).expect("valid line item"));
        self
    }

    pub fn with_only_line_item(mut self, item_type: LineItemType, quantity: u32, unit_price: Money) -> Self {
        self.line_items.clear();
        self.with_line_item(item_type, quantity, unit_price)
    }

    pub fn with_percentage_discount(mut self, percent: Decimal) -> Self {
        self.discounts.push(Discount::percentage("Early bird", percent));
        self
    }

    pub fn with_percentage_tax(mut self, percent: Decimal) -> Self {
        self.taxes.push(Tax::percentage("GST", percent));
        self
    }

    pub fn valid_for_days(mut self, days: i64) -> Self {
        self.valid_for_days = Some(days);
        self
    }

    /// 1000 subtotal, 10% discount, 8% tax
    pub fn standard_scenario() -> Self {
        Self::new().with_percentage_discount(dec!(10)).with_percentage_tax(dec!(8))
    }

    pub fn build(self) -> CreateQuoteInput {
        CreateQuoteInput {
            itinerary_id: self.itinerary_id,
            customer: CustomerFixtures::snapshot(),
            travelers: CustomerFixtures::family(),
            travel_dates: None,
            currency: self.currency,
            line_items: self.line_items,
            discounts: self.discounts,
            taxes: self.taxes,
            valid_for_days: self.valid_for_days,
            payment_schedule: None,
            notes: None,
        }
    }
}

/// Builds a direct booking request
pub struct BookingInputBuilder {
    total_price: Money,
    travel_start: NaiveDate,
    travel_end: NaiveDate,
    travelers: Vec<Traveler>,
    deposit_due_date: Option<NaiveDate>,
}

impl Default for BookingInputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingInputBuilder {
    pub fn new() -> Self {
        Self {
            total_price: MoneyFixtures::usd_1000(),
            travel_start: TemporalFixtures::travel_start(),
            travel_end: TemporalFixtures::travel_end(),
            travelers: vec![Traveler::named(TravelerKind::Adult, "Asha Menon")],
            deposit_due_date: None,
        }
    }

    pub fn with_total_price(mut self, total_price: Money) -> Self {
        self.total_price = total_price;
        self
    }

    pub fn with_travel_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.travel_start = start;
        self.travel_end = end;
        self
    }

    pub fn with_deposit_due(mut self, date: NaiveDate) -> Self {
        self.deposit_due_date = Some(date);
        self
    }

    pub fn build(self) -> CreateBookingInput {
        CreateBookingInput {
            quote_id: None,
            itinerary_id: Some(IdFixtures::itinerary_id()),
            customer: CustomerFixtures::booking_customer(),
            travelers: self.travelers,
            travel_start: self.travel_start,
            travel_end: self.travel_end,
            destination: "Kerala, India".to_string(),
            total_price: self.total_price,
            deposit_due_date: self.deposit_due_date,
            notes: None,
        }
    }
}

/// Builds an invoice request with one travel-service item
pub struct InvoiceInputBuilder {
    booking_id: Option<BookingId>,
    amount: Money,
    issue_date: Option<NaiveDate>,
    due_date: NaiveDate,
}

impl Default for InvoiceInputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceInputBuilder {
    pub fn new() -> Self {
        Self {
            booking_id: None,
            amount: MoneyFixtures::usd_1000(),
            issue_date: None,
            due_date: TemporalFixtures::days_from_today(14),
        }
    }

    pub fn for_booking(mut self, booking_id: BookingId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn issued_on(mut self, date: NaiveDate) -> Self {
        self.issue_date = Some(date);
        self
    }

    pub fn due_on(mut self, date: NaiveDate) -> Self {
        self.due_date = date;
        self
    }

    pub fn build(self) -> CreateInvoiceInput {
        CreateInvoiceInput {
            booking_id: self.booking_id,
            quote_id: None,
            bill_to: CustomerFixtures::bill_to(),
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency: self.amount.currency(),
            items: vec![InvoiceItem::new("Kerala package", InvoiceItemType::TravelService, self.amount)],
            tax: None,
            notes: None,
        }
    }
}

/// Builds raw webhook bodies in the gateway's envelope format
pub struct GatewayEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: Map<String, Value>,
    metadata: Map<String, Value>,
}

impl GatewayEventBuilder {
    fn new(id: &str, event_type: &str, created: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            event_type: event_type.to_string(),
            created: created.timestamp(),
            object: Map::new(),
            metadata: Map::new(),
        }
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.object.insert(key.to_string(), value);
        self
    }

    pub fn payment_succeeded(id: &str, intent_id: &str, charge_id: &str, amount: Money, created: DateTime<Utc>) -> Self {
        Self::new(id, "payment_intent.succeeded", created)
            .set("id", json!(intent_id))
            .set("amount_received", json!(minor(amount)))
            .set("currency", json!(amount.currency().code().to_lowercase()))
            .set("latest_charge", json!(charge_id))
    }

    pub fn payment_failed(id: &str, intent_id: &str, amount: Money, message: &str, created: DateTime<Utc>) -> Self {
        Self::new(id, "payment_intent.payment_failed", created)
            .set("id", json!(intent_id))
            .set("amount", json!(minor(amount)))
            .set("currency", json!(amount.currency().code().to_lowercase()))
            .set("last_payment_error", json!({ "message": message }))
    }

    pub fn payment_canceled(id: &str, intent_id: &str, created: DateTime<Utc>) -> Self {
        Self::new(id, "payment_intent.canceled", created).set("id", json!(intent_id))
    }

    /// `amount_refunded` is the cumulative amount refunded on the charge
    pub fn charge_refunded(id: &str, charge_id: &str, amount_refunded: Money, created: DateTime<Utc>) -> Self {
        Self::new(id, "charge.refunded", created)
            .set("id", json!(charge_id))
            .set("amount_refunded", json!(minor(amount_refunded)))
            .set("currency", json!(amount_refunded.currency().code().to_lowercase()))
    }

    pub fn dispute_created(id: &str, dispute_id: &str, charge_id: &str, amount: Money, created: DateTime<Utc>) -> Self {
        Self::new(id, "charge.dispute.created", created)
            .set("id", json!(dispute_id))
            .set("charge", json!(charge_id))
            .set("amount", json!(minor(amount)))
            .set("currency", json!(amount.currency().code().to_lowercase()))
            .set("reason", json!("fraudulent"))
    }

    pub fn other(id: &str, event_type: &str, created: DateTime<Utc>) -> Self {
        Self::new(id, event_type, created).set("id", json!("obj_1"))
    }

    pub fn tenant(mut self, tenant_id: TenantId) -> Self {
        self.metadata.insert("tenant_id".to_string(), json!(tenant_id.to_string()));
        self
    }

    pub fn invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.metadata.insert("invoice_id".to_string(), json!(invoice_id.to_string()));
        self
    }

    pub fn booking(mut self, booking_id: BookingId) -> Self {
        self.metadata.insert("booking_id".to_string(), json!(booking_id.to_string()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut object = self.object;
        object.insert("metadata".to_string(), Value::Object(self.metadata));
        json!({
            "id": self.id,
            "type": self.event_type,
            "created": self.created,
            "data": { "object": object }
        })
        .to_string()
        .into_bytes()
    }
}

/// Gateway payloads carry minor units; fixture amounts always fit
fn minor(amount: Money) -> i64 {
    amount
        .to_minor()
        .unwrap_or_else(|e| panic!("fixture amount out of range: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_reconciliation::{GatewayEvent, GatewayEventKind};

    #[test]
    fn test_quote_builder_standard_scenario() {
        let input = QuoteInputBuilder::standard_scenario().build();
        assert_eq!(input.line_items.len(), 1);
        assert_eq!(input.discounts.len(), 1);
        assert_eq!(input.taxes.len(), 1);
    }

    #[test]
    fn test_gateway_builder_output_parses() {
        let tenant = IdFixtures::tenant_id();
        let body = GatewayEventBuilder::payment_succeeded(
            "evt_1",
            "pi_1",
            "ch_1",
            MoneyFixtures::usd_972(),
            TemporalFixtures::now(),
        )
        .tenant(tenant)
        .build();

        let event = GatewayEvent::parse(&body).unwrap();
        assert_eq!(event.metadata.tenant_id, Some(tenant));
        match event.kind {
            GatewayEventKind::PaymentSucceeded { charge_id, amount, .. } => {
                assert_eq!(charge_id, "ch_1");
                assert_eq!(amount, MoneyFixtures::usd_972());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
