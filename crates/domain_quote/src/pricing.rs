//! Quote pricing
//!
//! `grand_total = subtotal - discount_total + tax_total`. Percentage
//! discounts apply to the subtotal, taxes apply to the discounted subtotal.
//! Every component is rounded to the currency's minor unit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, LineItemId, Money, Rate};

use crate::error::QuoteError;

/// Kind of travel component on a quote line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemType {
    Flight,
    Hotel,
    Transfer,
    Activity,
    Insurance,
    Visa,
    Package,
    ServiceFee,
    Other,
}

/// A priced quote line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub item_type: LineItemType,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// `quantity * unit_price`, never set directly
    total: Money,
}

impl LineItem {
    pub fn new(
        item_type: LineItemType,
        description: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, QuoteError> {
        if quantity == 0 {
            return Err(QuoteError::validation("line item quantity must be at least 1"));
        }
        if unit_price.is_negative() {
            return Err(QuoteError::validation("line item unit price cannot be negative"));
        }
        Ok(Self {
            id: LineItemId::new(),
            item_type,
            description: description.into(),
            quantity,
            total: unit_price.multiply(Decimal::from(quantity)).round_to_currency(),
            unit_price,
        })
    }

    pub fn total(&self) -> Money {
        self.total
    }
}

/// Percentage of a base or a fixed amount
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Adjustment {
    Percentage(Decimal),
    Fixed(Money),
}

impl Adjustment {
    fn validate(&self, currency: Currency) -> Result<(), QuoteError> {
        match self {
            Adjustment::Percentage(p) if *p < Decimal::ZERO || *p > dec!(100) => Err(
                QuoteError::validation(format!("percentage {} must be between 0 and 100", p)),
            ),
            Adjustment::Fixed(amount) if amount.is_negative() => {
                Err(QuoteError::validation("fixed adjustment cannot be negative"))
            }
            Adjustment::Fixed(amount) if amount.currency() != currency => {
                Err(QuoteError::Money(core_kernel::MoneyError::CurrencyMismatch(
                    currency.to_string(),
                    amount.currency().to_string(),
                )))
            }
            _ => Ok(()),
        }
    }

    fn amount_of(&self, base: &Money) -> Money {
        match self {
            Adjustment::Percentage(p) => Rate::from_percentage(*p).apply(base).round_to_currency(),
            Adjustment::Fixed(amount) => *amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub description: String,
    pub adjustment: Adjustment,
}

impl Discount {
    pub fn percentage(description: impl Into<String>, percent: Decimal) -> Self {
        Self {
            description: description.into(),
            adjustment: Adjustment::Percentage(percent),
        }
    }

    pub fn fixed(description: impl Into<String>, amount: Money) -> Self {
        Self {
            description: description.into(),
            adjustment: Adjustment::Fixed(amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub name: String,
    pub adjustment: Adjustment,
}

impl Tax {
    pub fn percentage(name: impl Into<String>, percent: Decimal) -> Self {
        Self {
            name: name.into(),
            adjustment: Adjustment::Percentage(percent),
        }
    }

    pub fn fixed(name: impl Into<String>, amount: Money) -> Self {
        Self {
            name: name.into(),
            adjustment: Adjustment::Fixed(amount),
        }
    }
}

/// Computed totals of a quote
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub subtotal: Money,
    pub discount_total: Money,
    pub tax_total: Money,
    pub grand_total: Money,
}

impl Pricing {
    pub fn zero(currency: Currency) -> Self {
        Self {
            subtotal: Money::zero(currency),
            discount_total: Money::zero(currency),
            tax_total: Money::zero(currency),
            grand_total: Money::zero(currency),
        }
    }

    /// Computes totals from line items, discounts and taxes
    pub fn compute(
        currency: Currency,
        line_items: &[LineItem],
        discounts: &[Discount],
        taxes: &[Tax],
    ) -> Result<Self, QuoteError> {
        let subtotal = Money::sum(currency, line_items.iter().map(|item| &item.total))?;

        let mut discount_total = Money::zero(currency);
        for discount in discounts {
            discount.adjustment.validate(currency)?;
            discount_total = discount_total.checked_add(&discount.adjustment.amount_of(&subtotal))?;
        }
        if discount_total > subtotal {
            return Err(QuoteError::validation(format!(
                "discounts {} exceed subtotal {}",
                discount_total, subtotal
            )));
        }

        let taxable = subtotal.checked_sub(&discount_total)?;
        let mut tax_total = Money::zero(currency);
        for tax in taxes {
            tax.adjustment.validate(currency)?;
            tax_total = tax_total.checked_add(&tax.adjustment.amount_of(&taxable))?;
        }

        Ok(Self {
            subtotal: subtotal.round_to_currency(),
            discount_total: discount_total.round_to_currency(),
            tax_total: tax_total.round_to_currency(),
            grand_total: taxable.checked_add(&tax_total)?.round_to_currency(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    #[test]
    fn test_percentage_discount_then_tax() {
        let items = vec![
            LineItem::new(LineItemType::Flight, "Return flights", 2, usd(dec!(300))).unwrap(),
            LineItem::new(LineItemType::Hotel, "4 nights", 1, usd(dec!(400))).unwrap(),
        ];
        let pricing = Pricing::compute(
            Currency::USD,
            &items,
            &[Discount::percentage("Early bird", dec!(10))],
            &[Tax::percentage("GST", dec!(8))],
        )
        .unwrap();

        assert_eq!(pricing.subtotal.amount(), dec!(1000));
        assert_eq!(pricing.discount_total.amount(), dec!(100));
        assert_eq!(pricing.tax_total.amount(), dec!(72));
        assert_eq!(pricing.grand_total.amount(), dec!(972));
    }

    #[test]
    fn test_fixed_adjustments() {
        let items = vec![LineItem::new(LineItemType::Package, "Bali package", 1, usd(dec!(1500))).unwrap()];
        let pricing = Pricing::compute(
            Currency::USD,
            &items,
            &[Discount::fixed("Loyalty", usd(dec!(50)))],
            &[Tax::fixed("Tourism levy", usd(dec!(25)))],
        )
        .unwrap();

        assert_eq!(pricing.grand_total.amount(), dec!(1475));
    }

    #[test]
    fn test_discounts_cannot_exceed_subtotal() {
        let items = vec![LineItem::new(LineItemType::Visa, "Visa", 1, usd(dec!(80))).unwrap()];
        let result = Pricing::compute(
            Currency::USD,
            &items,
            &[Discount::fixed("Too generous", usd(dec!(100)))],
            &[],
        );
        assert!(matches!(result, Err(QuoteError::Validation(_))));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(LineItem::new(LineItemType::Hotel, "x", 0, usd(dec!(10))).is_err());
        assert!(LineItem::new(LineItemType::Hotel, "x", 1, usd(dec!(-10))).is_err());

        let items = vec![LineItem::new(LineItemType::Hotel, "x", 1, usd(dec!(10))).unwrap()];
        let over = Pricing::compute(Currency::USD, &items, &[Discount::percentage("x", dec!(120))], &[]);
        assert!(over.is_err());

        let eur = Tax::fixed("levy", Money::new(dec!(1), Currency::EUR));
        assert!(matches!(
            Pricing::compute(Currency::USD, &items, &[], &[eur]),
            Err(QuoteError::Money(_))
        ));
    }
}
