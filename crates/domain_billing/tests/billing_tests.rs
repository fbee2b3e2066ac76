//! Comprehensive tests for domain_billing

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{BookingId, Currency, Money, PaymentMethod, TenantId};

use domain_billing::invoice::{BillTo, Invoice, InvoiceItem, InvoiceItemType, InvoiceStatus, NewInvoice};
use domain_billing::payment::{GatewayLink, NewPayment, Payment, PaymentStatus};
use domain_billing::BillingError;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()
}

fn usd(amount: Decimal) -> Money {
    Money::new(amount, Currency::USD)
}

fn invoice_for(total: Money, due_date: NaiveDate) -> Invoice {
    let input = NewInvoice {
        tenant_id: TenantId::new(),
        booking_id: Some(BookingId::new()),
        quote_id: None,
        bill_to: BillTo {
            customer_id: None,
            name: "Sofia Rossi".to_string(),
            email: "sofia@example.com".to_string(),
        },
        issue_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        due_date,
        currency: total.currency(),
        items: vec![InvoiceItem::new("Alpine tour", InvoiceItemType::TravelService, total)],
        tax: None,
        notes: None,
    };
    Invoice::new(input, "INV-2025-00007".to_string(), now()).unwrap()
}

// ============================================================================
// Invoice Tests
// ============================================================================

mod invoice_tests {
    use super::*;

    #[test]
    fn test_invoice_totals_with_items_and_tax() {
        let input = NewInvoice {
            tenant_id: TenantId::new(),
            booking_id: None,
            quote_id: None,
            bill_to: BillTo {
                customer_id: None,
                name: "Sofia Rossi".to_string(),
                email: "sofia@example.com".to_string(),
            },
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            currency: Currency::USD,
            items: vec![
                InvoiceItem::new("Hotel nights", InvoiceItemType::TravelService, usd(dec!(120)))
                    .with_quantity(dec!(3)),
                InvoiceItem::new("Service fee", InvoiceItemType::ServiceFee, usd(dec!(50)))
                    .with_discount(usd(dec!(10))),
            ],
            tax: Some(usd(dec!(32))),
            notes: None,
        };
        let invoice = Invoice::new(input, "INV-2025-00001".to_string(), now()).unwrap();

        assert_eq!(invoice.subtotal().amount(), dec!(400));
        assert_eq!(invoice.total().amount(), dec!(432));
        assert_eq!(invoice.amount_due().amount(), dec!(432));
        assert_eq!(invoice.status(), InvoiceStatus::Draft);
    }

    #[test]
    fn test_invoice_rejects_due_before_issue() {
        let mut input_date = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        let input = NewInvoice {
            tenant_id: TenantId::new(),
            booking_id: None,
            quote_id: None,
            bill_to: BillTo {
                customer_id: None,
                name: "x".to_string(),
                email: "x@example.com".to_string(),
            },
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            due_date: input_date,
            currency: Currency::USD,
            items: vec![InvoiceItem::new("x", InvoiceItemType::Other, usd(dec!(1)))],
            tax: None,
            notes: None,
        };
        assert!(matches!(
            Invoice::new(input.clone(), "INV".to_string(), now()),
            Err(BillingError::Validation(_))
        ));

        input_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let same_day = NewInvoice { due_date: input_date, ..input };
        assert!(Invoice::new(same_day, "INV".to_string(), now()).is_ok());
    }

    #[test]
    fn test_read_time_overdue_keeps_amounts() {
        let mut invoice = invoice_for(usd(dec!(5000)), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        invoice.mark_as_sent("sofia@example.com", now()).unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(invoice.is_overdue(today));
        assert!(invoice.classify_overdue(today, now()));

        assert_eq!(invoice.status(), InvoiceStatus::Overdue);
        assert_eq!(invoice.amount_due().amount(), dec!(5000));
        assert!(!invoice.classify_overdue(today, now()));
    }

    #[test]
    fn test_overdue_invoice_can_still_be_paid() {
        let mut invoice = invoice_for(usd(dec!(300)), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        invoice.mark_as_sent("sofia@example.com", now()).unwrap();
        invoice.mark_as_overdue(now()).unwrap();

        invoice
            .mark_as_paid(usd(dec!(300)), PaymentMethod::CreditCard, Some("POS-99".into()), now())
            .unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert!(invoice.paid_at().is_some());
    }

    #[test]
    fn test_resend_logs_email_without_status_change() {
        let mut invoice = invoice_for(usd(dec!(300)), NaiveDate::from_ymd_opt(2025, 2, 5).unwrap());
        invoice.mark_as_sent("sofia@example.com", now()).unwrap();
        invoice.mark_as_sent("accounts@example.com", now()).unwrap();

        assert_eq!(invoice.status(), InvoiceStatus::Sent);
        assert_eq!(invoice.email_log().len(), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Pay(i64),
        Refund(i64),
    }

    proptest! {
        #[test]
        fn prop_amount_due_plus_paid_equals_total(
            total_cents in 100i64..1_000_000,
            ops in proptest::collection::vec(
                prop_oneof![(1i64..400_000).prop_map(Op::Pay), (1i64..400_000).prop_map(Op::Refund)],
                0..25,
            ),
        ) {
            let total = Money::from_minor(total_cents, Currency::USD);
            let mut invoice = invoice_for(total, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
            invoice.mark_as_sent("sofia@example.com", now()).unwrap();

            for op in ops {
                let _ = match op {
                    Op::Pay(c) => invoice.mark_as_paid(Money::from_minor(c, Currency::USD), PaymentMethod::Cash, None, now()),
                    Op::Refund(c) => invoice.refund(Money::from_minor(c, Currency::USD), "prop", now()),
                };
                prop_assert_eq!(
                    invoice.amount_due().amount() + invoice.amount_paid().amount(),
                    invoice.total().amount()
                );
                prop_assert!(!invoice.amount_paid().is_negative());
            }
        }
    }
}

// ============================================================================
// Payment Tests
// ============================================================================

mod payment_tests {
    use super::*;

    fn gateway_payment() -> Payment {
        Payment::completed(
            NewPayment {
                tenant_id: TenantId::new(),
                transaction_id: "TXN-2501-000042".to_string(),
                booking_id: BookingId::new(),
                invoice_id: None,
                amount: usd(dec!(972)),
                method: PaymentMethod::Gateway,
                gateway: Some(GatewayLink {
                    provider: "stripe".to_string(),
                    gateway_transaction_id: "ch_3Nabc".to_string(),
                    payment_intent_id: Some("pi_3Nabc".to_string()),
                }),
                reference: None,
                notes: None,
            },
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_completed_payment_is_stamped() {
        let payment = gateway_payment();
        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert_eq!(payment.paid_at(), Some(now()));
        assert!(payment.refund().is_none());
        assert_eq!(payment.gateway().unwrap().gateway_transaction_id, "ch_3Nabc");
    }

    #[test]
    fn test_incremental_refunds_accumulate() {
        let mut payment = gateway_payment();
        payment.refund_amount(usd(dec!(100)), "seat change", now()).unwrap();
        payment.refund_amount(usd(dec!(72)), "fee waived", now()).unwrap();

        assert_eq!(payment.amount_refunded().amount(), dec!(172));
        assert_eq!(payment.status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(payment.refund().unwrap().reason.as_deref(), Some("fee waived"));
    }

    #[test]
    fn test_refund_after_dispute_keeps_disputed_status() {
        let mut payment = gateway_payment();
        payment.mark_disputed("dp_1", "product_not_received", usd(dec!(972)), now()).unwrap();
        payment.apply_refund_total(usd(dec!(972)), None, now()).unwrap();

        assert_eq!(payment.status(), PaymentStatus::Disputed);
        assert_eq!(payment.amount_refunded().amount(), dec!(972));
    }
}
