//! Webhook intake: verify, parse, plan

use chrono::{TimeZone, Utc};
use serde_json::json;

use core_kernel::{BookingId, TenantId};
use domain_reconciliation::{
    plan, Decision, GatewayEvent, GatewayEventKind, PlanContext, ReconciliationError, WebhookVerifier,
};

fn body(event_type: &str, object: serde_json::Value) -> Vec<u8> {
    json!({
        "id": "evt_100",
        "type": event_type,
        "created": 1_740_830_400,
        "data": { "object": object }
    })
    .to_string()
    .into_bytes()
}

#[test]
fn test_signed_success_event_plans_payment_for_metadata_booking() {
    let verifier = WebhookVerifier::new("whsec_integration", 300);
    let now = Utc.timestamp_opt(1_740_830_410, 0).unwrap();
    let booking = BookingId::new();
    let payload = body(
        "payment_intent.succeeded",
        json!({
            "id": "pi_9",
            "amount": 50000,
            "currency": "inr",
            "latest_charge": "ch_9",
            "metadata": { "tenant_id": TenantId::new().to_string(), "booking_id": booking.to_string() }
        }),
    );
    let header = verifier.sign(&payload, now.timestamp()).unwrap();

    verifier.verify(&payload, &header, now).unwrap();
    let event = GatewayEvent::parse(&payload).unwrap();
    let decision = plan(&event, &PlanContext::default()).unwrap();

    match decision {
        Decision::RecordSuccess {
            booking_id,
            charge_id,
            amount,
            ..
        } => {
            assert_eq!(booking_id, booking);
            assert_eq!(charge_id, "ch_9");
            assert_eq!(amount.to_minor().unwrap(), 50000);
        }
        other => panic!("unexpected decision {:?}", other),
    }
}

#[test]
fn test_tampered_payload_never_reaches_parser() {
    let verifier = WebhookVerifier::new("whsec_integration", 300);
    let now = Utc.timestamp_opt(1_740_830_410, 0).unwrap();
    let payload = body("payment_intent.canceled", json!({ "id": "pi_9" }));
    let header = verifier.sign(&payload, now.timestamp()).unwrap();

    let mut tampered = payload.clone();
    tampered.extend_from_slice(b" ");

    assert!(matches!(
        verifier.verify(&tampered, &header, now),
        Err(ReconciliationError::InvalidSignature(_))
    ));
}

#[test]
fn test_unsupported_event_is_skipped() {
    let payload = body("invoice.finalized", json!({ "id": "in_1" }));
    let event = GatewayEvent::parse(&payload).unwrap();

    assert_eq!(event.kind, GatewayEventKind::Unsupported);
    assert!(plan(&event, &PlanContext::default()).unwrap().is_skip());
}

#[test]
fn test_dispute_parses_charge_reference() {
    let payload = body(
        "charge.dispute.created",
        json!({ "id": "dp_1", "charge": "ch_9", "amount": 1500, "currency": "usd", "reason": "fraudulent" }),
    );
    let event = GatewayEvent::parse(&payload).unwrap();

    assert_eq!(event.charge_id(), Some("ch_9"));
    assert!(matches!(
        plan(&event, &PlanContext::default()),
        Err(ReconciliationError::UnknownDocument { .. })
    ));
}
