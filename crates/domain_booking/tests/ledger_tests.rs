//! Booking ledger invariants

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money, PaymentMethod, TenantId, UserId};
use domain_booking::*;

fn booking_with_price(cents: i64) -> Booking {
    let input = NewBooking {
        tenant_id: TenantId::new(),
        quote_id: None,
        itinerary_id: None,
        customer: BookingCustomer {
            customer_id: None,
            name: "Lena Fischer".to_string(),
            email: "lena@example.com".to_string(),
            phone: None,
        },
        travelers: vec![Traveler::named(TravelerKind::Adult, "Lena Fischer")],
        travel_start: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
        travel_end: NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
        destination: "Crete".to_string(),
        total_price: Money::from_minor(cents, Currency::EUR),
        deposit_due_date: None,
        notes: None,
        created_by: UserId::new(),
    };
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    Booking::new(input, "BKG-2506-0001".to_string(), now, now.date_naive()).unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Charge(i64, u8),
    Refund(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..200_000, 0u8..3).prop_map(|(c, s)| Op::Charge(c, s)),
        (1i64..50_000).prop_map(Op::Refund),
    ]
}

mod invariant_tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_totals_match_completed_entries(price in 1i64..1_000_000, ops in proptest::collection::vec(op_strategy(), 0..20)) {
            let mut booking = booking_with_price(price);
            let now = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
            let today = now.date_naive();

            for op in ops {
                let entry = match op {
                    Op::Charge(cents, status) => {
                        let status = match status {
                            0 => EntryStatus::Completed,
                            1 => EntryStatus::Pending,
                            _ => EntryStatus::Failed,
                        };
                        NewLedgerEntry::completed_charge(Money::from_minor(cents, Currency::EUR), PaymentMethod::BankTransfer)
                            .with_status(status)
                    }
                    Op::Refund(cents) => {
                        NewLedgerEntry::completed_refund(Money::from_minor(cents, Currency::EUR), PaymentMethod::BankTransfer)
                    }
                };
                // Over-refunds are rejected and must leave the ledger untouched
                let _ = booking.add_payment(entry, now, today);

                let expected: Decimal = booking
                    .payments()
                    .iter()
                    .filter(|e| e.status == EntryStatus::Completed)
                    .map(|e| match e.kind {
                        EntryKind::Charge => e.amount.amount(),
                        EntryKind::Refund => -e.amount.amount(),
                    })
                    .sum();

                prop_assert_eq!(booking.total_paid().amount(), expected);
                prop_assert_eq!(
                    booking.balance_due().amount(),
                    booking.pricing().total_price.amount() - booking.total_paid().amount()
                );
                prop_assert!(!booking.total_paid().is_negative());
            }
        }
    }
}

mod status_tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_exits() {
        let all = [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::InProgress,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ];
        for terminal in [BookingStatus::Completed, BookingStatus::Cancelled] {
            assert!(all.iter().all(|target| !terminal.can_transition_to(*target)));
        }
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::InProgress));
    }

    #[test]
    fn test_booking_json_round_trip_keeps_derived_fields() {
        let mut booking = booking_with_price(50_000);
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
        booking
            .add_payment(
                NewLedgerEntry::completed_charge(Money::from_minor(20_000, Currency::EUR), PaymentMethod::Cash),
                now,
                now.date_naive(),
            )
            .unwrap();

        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["payment_status"], "partially-paid");

        let restored: Booking = serde_json::from_value(json).unwrap();
        assert_eq!(restored.balance_due(), booking.balance_due());
        assert_eq!(restored.payments().len(), 1);
    }
}
