//! Request and response bodies
//!
//! Requests carry plain decimals plus an ISO currency code; conversion into
//! service inputs happens here so handlers stay thin.

pub mod quotes;
pub mod bookings;
pub mod invoices;
pub mod operations;

use rust_decimal::Decimal;
use std::str::FromStr;

use app_services::ServiceResult;
use core_kernel::{Currency, Money};

pub(crate) fn parse_currency(code: &str) -> ServiceResult<Currency> {
    Ok(Currency::from_str(code)?)
}

pub(crate) fn money(amount: Decimal, currency: Currency) -> Money {
    Money::new(amount, currency)
}

/// Parses a path segment such as `QUO-<uuid>` or a bare UUID
pub(crate) fn parse_id<T: FromStr>(entity: &'static str, raw: &str) -> Result<T, crate::error::ApiError> {
    raw.parse()
        .map_err(|_| crate::error::ApiError::BadRequest(format!("malformed {} id '{}'", entity, raw)))
}
