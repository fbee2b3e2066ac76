//! Integration tests for Money as used by pricing and payment schedules

use core_kernel::{Currency, Money, MoneyError, Rate};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::USD);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_minor_units_respect_currency_precision() {
        assert_eq!(Money::from_minor(10050, Currency::USD).amount(), dec!(100.50));
        assert_eq!(Money::from_minor(1500, Currency::JPY).amount(), dec!(1500));
        assert_eq!(Money::new(dec!(972.00), Currency::EUR).to_minor().unwrap(), 97200);
    }

    #[test]
    fn test_minor_units_out_of_range_is_an_error() {
        let huge = Money::new(dec!(100000000000000000000), Currency::USD);
        assert!(matches!(huge.to_minor(), Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("inr".parse::<Currency>().unwrap(), Currency::INR);
        assert!(matches!(
            "XYZ".parse::<Currency>(),
            Err(MoneyError::UnknownCurrency(_))
        ));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_operations_reject_mixed_currencies() {
        let usd = Money::new(dec!(10), Currency::USD);
        let eur = Money::new(dec!(10), Currency::EUR);

        assert!(matches!(
            usd.checked_add(&eur),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
        assert!(usd.partial_cmp(&eur).is_none());
    }

    #[test]
    fn test_sum_of_line_totals() {
        let lines = [
            Money::new(dec!(600), Currency::USD),
            Money::new(dec!(400), Currency::USD),
        ];
        let total = Money::sum(Currency::USD, lines.iter()).unwrap();
        assert_eq!(total.amount(), dec!(1000));
    }

    #[test]
    fn test_discount_then_tax_chain() {
        let subtotal = Money::new(dec!(1000), Currency::USD);
        let discount = Rate::from_percentage(dec!(10)).apply(&subtotal);
        let taxable = subtotal.checked_sub(&discount).unwrap();
        let tax = Rate::from_percentage(dec!(8)).apply(&taxable);
        let grand = taxable.checked_add(&tax).unwrap().round_to_currency();

        assert_eq!(discount.amount(), dec!(100));
        assert_eq!(tax.amount(), dec!(72));
        assert_eq!(grand.amount(), dec!(972));
    }
}

mod allocation {
    use super::*;

    #[test]
    fn test_deposit_and_balance_split() {
        let total = Money::new(dec!(972), Currency::USD);
        let parts = total.allocate_by_ratios(&[dec!(30), dec!(70)]).unwrap();

        assert_eq!(parts[0].amount(), dec!(291.60));
        assert_eq!(parts[1].amount(), dec!(680.40));
    }

    #[test]
    fn test_remainder_lands_on_last_part() {
        let total = Money::new(dec!(100), Currency::USD);
        let parts = total
            .allocate_by_ratios(&[dec!(1), dec!(1), dec!(1)])
            .unwrap();

        assert_eq!(parts[0].amount(), dec!(33.33));
        assert_eq!(parts[1].amount(), dec!(33.33));
        assert_eq!(parts[2].amount(), dec!(33.34));
    }

    #[test]
    fn test_zero_ratios_rejected() {
        let total = Money::new(dec!(100), Currency::USD);
        assert!(matches!(
            total.allocate_by_ratios(&[dec!(0), dec!(0)]),
            Err(MoneyError::DivisionByZero)
        ));
        assert!(total.allocate_by_ratios(&[]).is_err());
    }
}
