//! Property-Based Test Generators
//!
//! Proptest strategies producing amounts and payment sequences that respect
//! the domain's own input rules.

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money, PaymentMethod};
use domain_booking::EntryStatus;

pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::INR),
        Just(Currency::JPY),
        Just(Currency::AED),
    ]
}

/// Positive amounts in minor units, up to ten million major units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

pub fn usd_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|amount| Money::from_minor(amount, Currency::USD))
}

/// Percentages with two decimals between 0 and 100
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=10_000u32).prop_map(|n| Decimal::new(n as i64, 2))
}

pub fn manual_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::CreditCard),
        Just(PaymentMethod::DebitCard),
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Check),
    ]
}

pub fn entry_status_strategy() -> impl Strategy<Value = EntryStatus> {
    prop_oneof![
        6 => Just(EntryStatus::Completed),
        2 => Just(EntryStatus::Pending),
        2 => Just(EntryStatus::Failed),
    ]
}

/// A sequence of USD charges with their settlement status
pub fn payment_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<(Money, EntryStatus)>> {
    prop::collection::vec(
        ((1i64..5_000_000i64).prop_map(|minor| Money::from_minor(minor, Currency::USD)), entry_status_strategy()),
        0..max_len,
    )
}

/// Invoice totals and a series of payments that never exceed them
pub fn invoice_payments_strategy() -> impl Strategy<Value = (Money, Vec<Money>)> {
    (100i64..10_000_000i64).prop_flat_map(|total_minor| {
        let total = Money::from_minor(total_minor, Currency::USD);
        prop::collection::vec(1i64..=total_minor, 1..6).prop_map(move |raw| {
            let mut remaining = total_minor;
            let mut payments = Vec::new();
            for minor in raw {
                let take = minor.min(remaining);
                if take == 0 {
                    break;
                }
                remaining -= take;
                payments.push(Money::from_minor(take, Currency::USD));
            }
            (total, payments)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_invoice_payments_never_exceed_total((total, payments) in invoice_payments_strategy()) {
            let paid = Money::sum(Currency::USD, payments.iter()).unwrap();
            prop_assert!(paid <= total);
            prop_assert!(!payments.is_empty());
        }

        #[test]
        fn test_percentages_in_range(p in percentage_strategy()) {
            prop_assert!(p >= Decimal::ZERO && p <= Decimal::ONE_HUNDRED);
        }
    }
}
