//! Custom Test Assertions
//!
//! Assertions over the financial invariants, with messages that name the
//! document and the numbers involved.

use core_kernel::Money;
use domain_billing::Invoice;
use domain_booking::{Booking, EntryKind, EntryStatus};

use app_services::ServiceError;

/// Asserts that two amounts are equal and in the same currency
pub fn assert_money_eq(actual: Money, expected: Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual,
        expected
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Amount mismatch: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts `total_paid` equals completed charges minus completed refunds and
/// `balance_due = total_price - total_paid`
pub fn assert_booking_ledger_consistent(booking: &Booking) {
    let currency = booking.pricing().total_price.currency();
    let mut paid = Money::zero(currency);
    for entry in booking.payments().iter().filter(|e| e.status == EntryStatus::Completed) {
        paid = match entry.kind {
            EntryKind::Charge => paid.checked_add(&entry.amount).unwrap(),
            EntryKind::Refund => paid.checked_sub(&entry.amount).unwrap(),
        };
    }

    assert_money_eq(booking.total_paid(), paid);
    assert_money_eq(
        booking.balance_due(),
        booking.pricing().total_price.checked_sub(&paid).unwrap(),
    );
}

/// Asserts `amount_due + amount_paid = total`
pub fn assert_invoice_balanced(invoice: &Invoice) {
    let sum = invoice.amount_due().checked_add(&invoice.amount_paid()).unwrap();
    assert_eq!(
        sum,
        invoice.total(),
        "Invoice {} unbalanced: due={} paid={} total={}",
        invoice.invoice_number(),
        invoice.amount_due(),
        invoice.amount_paid(),
        invoice.total()
    );
}

/// Asserts that a service call failed with `code`, returning the error
pub fn assert_error_code<T: std::fmt::Debug>(result: Result<T, ServiceError>, code: &str) -> ServiceError {
    match result {
        Ok(value) => panic!("Expected error code {}, got Ok({:?})", code, value),
        Err(e) => {
            assert_eq!(e.code(), code, "Unexpected error: {}", e);
            e
        }
    }
}
