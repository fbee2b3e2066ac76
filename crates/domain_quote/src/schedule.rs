//! Payment schedules
//!
//! Milestones split a quote's grand total into dated instalments, typically a
//! deposit followed by a balance payment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::Money;

use crate::error::QuoteError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub label: String,
    pub due_date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    milestones: Vec<Milestone>,
}

impl PaymentSchedule {
    /// Builds a schedule from explicit milestones, ordered by due date
    pub fn new(mut milestones: Vec<Milestone>) -> Self {
        milestones.sort_by_key(|m| m.due_date);
        Self { milestones }
    }

    /// Splits `total` by percentages; the last milestone absorbs rounding
    pub fn from_percentages(
        total: &Money,
        parts: &[(String, NaiveDate, Decimal)],
    ) -> Result<Self, QuoteError> {
        let ratios: Vec<Decimal> = parts.iter().map(|(_, _, pct)| *pct).collect();
        if ratios.iter().any(|r| r.is_sign_negative()) {
            return Err(QuoteError::validation("schedule percentages cannot be negative"));
        }
        if ratios.iter().sum::<Decimal>() != Decimal::ONE_HUNDRED {
            return Err(QuoteError::validation("schedule percentages must add up to 100"));
        }
        let amounts = total.round_to_currency().allocate_by_ratios(&ratios)?;
        let milestones = parts
            .iter()
            .zip(amounts)
            .map(|((label, due_date, _), amount)| Milestone {
                label: label.clone(),
                due_date: *due_date,
                amount,
            })
            .collect();
        Ok(Self::new(milestones))
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn is_empty(&self) -> bool {
        self.milestones.is_empty()
    }

    /// Due date of the first instalment
    pub fn deposit_due_date(&self) -> Option<NaiveDate> {
        self.milestones.first().map(|m| m.due_date)
    }

    /// Scheduled amounts must not exceed what the quote charges
    pub fn validate_against(&self, grand_total: &Money) -> Result<(), QuoteError> {
        let scheduled = Money::sum(grand_total.currency(), self.milestones.iter().map(|m| &m.amount))?;
        if scheduled > *grand_total {
            return Err(QuoteError::validation(format!(
                "payment schedule {} exceeds grand total {}",
                scheduled, grand_total
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_deposit_and_balance() {
        let total = Money::new(dec!(972), Currency::USD);
        let schedule = PaymentSchedule::from_percentages(
            &total,
            &[
                ("Balance".to_string(), date(5, 1), dec!(75)),
                ("Deposit".to_string(), date(3, 1), dec!(25)),
            ],
        )
        .unwrap();

        assert_eq!(schedule.deposit_due_date(), Some(date(3, 1)));
        assert_eq!(schedule.milestones()[0].amount.amount(), dec!(243));
        assert_eq!(schedule.milestones()[1].amount.amount(), dec!(729));
        assert!(schedule.validate_against(&total).is_ok());
    }

    #[test]
    fn test_percentages_must_total_100() {
        let total = Money::new(dec!(100), Currency::USD);
        let result = PaymentSchedule::from_percentages(&total, &[("Deposit".to_string(), date(1, 1), dec!(30))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_schedule_over_total_rejected() {
        let schedule = PaymentSchedule::new(vec![Milestone {
            label: "Deposit".to_string(),
            due_date: date(1, 1),
            amount: Money::new(dec!(500), Currency::USD),
        }]);
        assert!(schedule.validate_against(&Money::new(dec!(400), Currency::USD)).is_err());
    }
}
