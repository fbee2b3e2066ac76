//! Pre-built Test Fixtures
//!
//! Ready-to-use, predictable data for the travel back office: money,
//! instants, identifiers, tenants and customers.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use app_services::ItinerarySummary;
use core_kernel::{Currency, CustomerId, ItineraryId, LeadId, Money, TenantId, Timezone, UserId};
use domain_booking::BookingCustomer;
use domain_billing::BillTo;
use domain_quote::{CustomerSnapshot, TravelerCounts};
use domain_sequence::Tenant;

pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    pub fn usd_1000() -> Money {
        Self::usd(dec!(1000.00))
    }

    pub fn usd_972() -> Money {
        Self::usd(dec!(972.00))
    }

    /// For currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }

    pub fn inr(amount: Decimal) -> Money {
        Money::new(amount, Currency::INR)
    }
}

pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The instant every harness clock starts at (10 March 2025, 10:00 UTC)
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap()
    }

    pub fn today() -> NaiveDate {
        Self::now().date_naive()
    }

    pub fn travel_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    pub fn travel_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 8).unwrap()
    }

    pub fn days_from_today(days: i64) -> NaiveDate {
        Self::today() + chrono::Duration::days(days)
    }
}

pub struct IdFixtures;

impl IdFixtures {
    pub fn tenant_id() -> TenantId {
        TenantId::from_uuid(Uuid::parse_str("6f1c2a10-0000-4000-8000-000000000001").unwrap())
    }

    pub fn other_tenant_id() -> TenantId {
        TenantId::from_uuid(Uuid::parse_str("6f1c2a10-0000-4000-8000-000000000002").unwrap())
    }

    pub fn user_id() -> UserId {
        UserId::from_uuid(Uuid::parse_str("6f1c2a10-0000-4000-8000-000000000010").unwrap())
    }

    pub fn customer_id() -> CustomerId {
        CustomerId::from_uuid(Uuid::parse_str("6f1c2a10-0000-4000-8000-000000000030").unwrap())
    }

    pub fn itinerary_id() -> ItineraryId {
        ItineraryId::from_uuid(Uuid::parse_str("6f1c2a10-0000-4000-8000-000000000020").unwrap())
    }
}

pub struct TenantFixtures;

impl TenantFixtures {
    /// Default numbering, UTC calendar
    pub fn agency() -> Tenant {
        Tenant::new(IdFixtures::tenant_id(), "Sunrise Travels")
    }

    /// Agency on the Asia/Kolkata calendar
    pub fn kolkata_agency() -> Tenant {
        Tenant::new(IdFixtures::other_tenant_id(), "Monsoon Journeys").with_timezone(Timezone::new(chrono_tz::Asia::Kolkata))
    }
}

pub struct CustomerFixtures;

impl CustomerFixtures {
    pub fn snapshot() -> CustomerSnapshot {
        CustomerSnapshot {
            customer_id: Some(IdFixtures::customer_id()),
            lead_id: None,
            name: "Asha Menon".to_string(),
            email: "asha.menon@example.com".to_string(),
            phone: Some("+91-98450-00000".to_string()),
        }
    }

    /// A lead with generated name and email
    pub fn random_snapshot() -> CustomerSnapshot {
        CustomerSnapshot {
            customer_id: None,
            lead_id: Some(LeadId::new()),
            name: Name().fake(),
            email: SafeEmail().fake(),
            phone: None,
        }
    }

    pub fn booking_customer() -> BookingCustomer {
        let snapshot = Self::snapshot();
        BookingCustomer {
            customer_id: None,
            name: snapshot.name,
            email: snapshot.email,
            phone: snapshot.phone,
        }
    }

    pub fn bill_to() -> BillTo {
        let snapshot = Self::snapshot();
        BillTo {
            customer_id: None,
            name: snapshot.name,
            email: snapshot.email,
        }
    }

    pub fn family() -> TravelerCounts {
        TravelerCounts {
            adults: 2,
            children: 1,
            infants: 0,
        }
    }
}

pub struct ItineraryFixtures;

impl ItineraryFixtures {
    pub fn kerala() -> ItinerarySummary {
        ItinerarySummary {
            id: IdFixtures::itinerary_id(),
            title: "Kerala Backwaters".to_string(),
            destination: "Kerala, India".to_string(),
            start_date: TemporalFixtures::travel_start(),
            end_date: TemporalFixtures::travel_end(),
        }
    }
}
