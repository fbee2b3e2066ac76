//! Sequence formatting properties

use chrono::NaiveDate;
use domain_sequence::{format_number, parse_suffix, DocumentKind, NumberingScheme};
use proptest::prelude::*;

mod format_tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_suffix_survives_formatting(seq in 1u64..10_000_000, year in 2000i32..2099, month in 1u32..=12) {
            let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
            for kind in DocumentKind::ALL {
                let period = kind.period_for(date);
                let number = format_number(kind.default_prefix(), &period, seq, kind.width());

                prop_assert_eq!(parse_suffix(&number), Some(seq));
                let expected_prefix = format!("{}-{}-", kind.default_prefix(), period);
                prop_assert!(number.starts_with(&expected_prefix));
            }
        }

        #[test]
        fn prop_padding_keeps_lexicographic_order(a in 1u64..9_999, b in 1u64..9_999) {
            let left = format_number("BKG", "2503", a, 4);
            let right = format_number("BKG", "2503", b, 4);
            prop_assert_eq!(a.cmp(&b), left.cmp(&right));
        }
    }
}

mod scheme_tests {
    use super::*;

    #[test]
    fn test_default_schemes() {
        assert_eq!(NumberingScheme::default_for(DocumentKind::Booking).prefix, "BKG");
        assert_eq!(NumberingScheme::default_for(DocumentKind::Invoice).prefix, "INV");
        assert_eq!(NumberingScheme::default_for(DocumentKind::Quote).prefix, "QT");
        assert_eq!(NumberingScheme::default_for(DocumentKind::Transaction).start_number, 1);
    }
}
