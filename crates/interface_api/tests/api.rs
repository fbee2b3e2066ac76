//! HTTP surface tests over the in-memory harness

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use core_kernel::{Clock, HealthCheckResult, HealthCheckable, TenantId, UserId};
use domain_reconciliation::SIGNATURE_HEADER;
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState};
use test_utils::{
    GatewayEventBuilder, IdFixtures, InvoiceInputBuilder, MoneyFixtures, TemporalFixtures, TestHarness,
    WEBHOOK_SECRET,
};

const JWT_SECRET: &str = "api-test-secret";

struct Api {
    server: TestServer,
    harness: TestHarness,
    token: String,
}

impl Api {
    async fn new() -> Self {
        Self::with_roles(&["admin"]).await
    }

    async fn with_roles(roles: &[&str]) -> Self {
        Self::build(roles, Vec::new()).await
    }

    async fn build(roles: &[&str], readiness: Vec<Arc<dyn HealthCheckable>>) -> Self {
        let harness = TestHarness::new().await;
        let config = ApiConfig {
            jwt_secret: JWT_SECRET.to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            ..ApiConfig::default()
        };
        let clock: Arc<dyn Clock> = harness.clock.clone();
        let mut state = AppState::new(harness.services.clone(), config, clock);
        for adapter in readiness {
            state = state.with_readiness_check(adapter);
        }

        let token = token_for(
            harness.actor.user_id,
            harness.tenant_id(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
        let server = TestServer::new(create_router(state)).unwrap();
        Self { server, harness, token }
    }

    fn authed(&self, request: TestRequest) -> TestRequest {
        bearer(request, &self.token)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self.authed(self.server.post(path)).json(&body).await;
        (response.status_code(), response.json())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.authed(self.server.get(path)).await;
        (response.status_code(), response.json())
    }

    /// Draft quote for the seeded itinerary: 1000 USD, 10% off, 8% tax
    async fn create_quote(&self) -> Value {
        let (status, quote) = self.post("/api/v1/quotes", quote_body()).await;
        assert_eq!(status, StatusCode::CREATED, "{}", quote);
        quote
    }

    async fn approved_quote(&self) -> Value {
        let quote = self.create_quote().await;
        let id = id_of(&quote);
        let (status, _) = self
            .post(&format!("/api/v1/quotes/{}/send", id), json!({ "recipient": "family@example.com" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, approved) = self
            .post(&format!("/api/v1/quotes/{}/approve", id), json!({ "approver_name": "Asha Menon" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        approved
    }

    async fn converted_booking(&self) -> Value {
        let quote = self.approved_quote().await;
        let (status, body) = self
            .post(&format!("/api/v1/quotes/{}/convert", id_of(&quote)), json!({}))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["booking"].clone()
    }
}

fn token_for(user_id: UserId, tenant_id: TenantId, roles: Vec<String>) -> String {
    create_token(user_id, tenant_id, roles, JWT_SECRET, 3600).unwrap()
}

fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

fn quote_body() -> Value {
    json!({
        "itinerary_id": IdFixtures::itinerary_id(),
        "customer": { "customer_id": IdFixtures::customer_id(), "name": "Asha Menon", "email": "asha@example.com" },
        "travelers": { "adults": 2, "children": 1 },
        "currency": "USD",
        "line_items": [
            { "item_type": "package", "description": "Backwaters package", "quantity": 1, "unit_price": "1000.00" }
        ],
        "discounts": [ { "description": "Early bird", "kind": "percentage", "value": "10" } ],
        "taxes": [ { "description": "GST", "kind": "percentage", "value": "8" } ]
    })
}

fn id_of(document: &Value) -> String {
    document["id"].as_str().unwrap().to_string()
}

fn amount(money: &Value) -> Decimal {
    money["amount"].as_str().unwrap().parse().unwrap()
}

mod health {
    use super::*;

    struct Unreachable;

    #[async_trait]
    impl HealthCheckable for Unreachable {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::unhealthy("platform", 3, "connection refused")
        }
    }

    #[tokio::test]
    async fn test_liveness_needs_no_token() {
        let api = Api::new().await;
        let response = api.server.get("/health").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_failing_adapter() {
        let api = Api::build(&["admin"], vec![Arc::new(Unreachable)]).await;
        let response = api.server.get("/health/ready").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["checks"][0]["adapter_id"], "platform");
        assert_eq!(body["checks"][0]["status"], "unhealthy");
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let api = Api::new().await;
        let response = api.server.post("/api/v1/quotes").json(&quote_body()).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let api = Api::with_roles(&[permissions::QUOTE_READ]).await;
        let (status, body) = api.post("/api/v1/quotes", quote_body()).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_see_quote() {
        let api = Api::new().await;
        let quote = api.create_quote().await;

        let outsider = token_for(UserId::new(), TenantId::new(), vec!["admin".to_string()]);
        let response = bearer(api.server.get(&format!("/api/v1/quotes/{}", id_of(&quote))), &outsider).await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "not_found");
    }
}

mod quotes {
    use super::*;

    #[tokio::test]
    async fn test_create_quote_prices_and_numbers() {
        let api = Api::new().await;
        let quote = api.create_quote().await;

        assert_eq!(quote["status"], "draft");
        assert_eq!(quote["version"], 1);
        assert!(quote["quote_number"].as_str().unwrap().starts_with("QT-2025-"));
        assert_eq!(amount(&quote["pricing"]["grand_total"]), dec!(972));
    }

    #[tokio::test]
    async fn test_invalid_body_lists_every_problem() {
        let api = Api::new().await;
        let mut body = quote_body();
        body["customer"]["email"] = json!("nope");
        body["currency"] = json!("DOLLARS");

        let (status, error) = api.post("/api/v1/quotes", body).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"], "validation_error");
        let details: Vec<&str> = error["details"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert!(details.iter().any(|d| d.starts_with("currency")));
        assert!(details.iter().any(|d| d.starts_with("customer.email")));
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let api = Api::new().await;
        let (status, body) = api.get("/api/v1/quotes/not-a-uuid").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_second_conversion_reports_current_state() {
        let api = Api::new().await;
        let quote = api.approved_quote().await;
        let path = format!("/api/v1/quotes/{}/convert", id_of(&quote));

        let (status, first) = api.post(&path, json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(first["booking"]["booking_number"].as_str().unwrap().starts_with("BKG-2503-"));
        assert_eq!(first["quote"]["status"], "converted");

        let (status, second) = api.post(&path, json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(second["error"], "invalid_state");
        assert_eq!(second["current_state"], "converted");
    }

    #[tokio::test]
    async fn test_revision_chain_by_number() {
        let api = Api::new().await;
        let quote = api.create_quote().await;
        let (status, revised) = api
            .post(
                &format!("/api/v1/quotes/{}/revisions", id_of(&quote)),
                json!({ "travelers": { "adults": 3 }, "valid_for_days": 10 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", revised);
        assert_eq!(revised["version"], 2);

        let number = quote["quote_number"].as_str().unwrap();
        let (status, chain) = api.get(&format!("/api/v1/quotes/by-number/{}/revisions", number)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(chain.as_array().unwrap().len(), 2);

        let (status, stale) = api
            .post(&format!("/api/v1/quotes/{}/revisions", id_of(&quote)), json!({}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(stale["error"], "invalid_state");
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn test_payment_then_over_refund() {
        let api = Api::new().await;
        let booking = api.converted_booking().await;

        let (status, recorded) = api
            .post(
                &format!("/api/v1/bookings/{}/payments", id_of(&booking)),
                json!({ "amount": "600.00", "currency": "USD", "method": "bank_transfer" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", recorded);
        assert_eq!(recorded["booking"]["payment_status"], "partially-paid");
        let payment_id = id_of(&recorded["payment"]);

        let (status, error) = api
            .post(
                &format!("/api/v1/payments/{}/refund", payment_id),
                json!({ "amount": "700.00", "reason": "Goodwill" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"], "validation_error");

        let (status, refunded) = api
            .post(
                &format!("/api/v1/payments/{}/refund", payment_id),
                json!({ "amount": "100.00", "reason": "Goodwill" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", refunded);

        let (_, payments) = api.get(&format!("/api/v1/bookings/{}/payments", id_of(&booking))).await;
        assert_eq!(payments.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_booking_refuses_payment() {
        let api = Api::new().await;
        let booking = api.converted_booking().await;
        let response = api
            .authed(api.server.put(&format!("/api/v1/bookings/{}/status", id_of(&booking))))
            .json(&json!({ "status": "cancelled", "reason": "Change of plans" }))
            .await;
        response.assert_status(StatusCode::OK);

        let (status, error) = api
            .post(
                &format!("/api/v1/bookings/{}/payments", id_of(&booking)),
                json!({ "amount": "100.00", "currency": "USD", "method": "cash" }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error"], "invalid_state");
    }
}

mod invoices {
    use super::*;

    #[tokio::test]
    async fn test_booking_invoice_to_payment_intent() {
        let api = Api::new().await;
        let booking = api.converted_booking().await;

        let (status, invoice) = api
            .post(
                &format!("/api/v1/bookings/{}/invoices", id_of(&booking)),
                json!({ "due_date": TemporalFixtures::days_from_today(14) }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", invoice);
        assert!(invoice["invoice_number"].as_str().unwrap().starts_with("INV-2025-"));

        let intents = format!("/api/v1/invoices/{}/payment-intents", id_of(&invoice));
        let (status, error) = api.post(&intents, json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT, "draft invoices cannot be collected");
        assert_eq!(error["error"], "invalid_state");

        let (status, _) = api.post(&format!("/api/v1/invoices/{}/send", id_of(&invoice)), json!({})).await;
        assert_eq!(status, StatusCode::OK);

        let (status, intent) = api.post(&intents, json!({})).await;
        assert_eq!(status, StatusCode::CREATED, "{}", intent);
        assert!(!intent["client_secret"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_outage_is_bad_gateway() {
        let api = Api::new().await;
        let invoice = api
            .harness
            .services
            .invoices
            .create_invoice(&api.harness.actor, InvoiceInputBuilder::new().build())
            .await
            .unwrap();
        api.harness
            .services
            .invoices
            .send_invoice(&api.harness.actor, invoice.id(), None)
            .await
            .unwrap();
        api.harness.gateway.set_unavailable(true).await;

        let (status, error) = api
            .post(&format!("/api/v1/invoices/{}/payment-intents", invoice.id().as_uuid()), json!({}))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(error["error"], "gateway_error");
    }

    #[tokio::test]
    async fn test_blank_cancel_reason_rejected() {
        let api = Api::new().await;
        let invoice = api
            .harness
            .services
            .invoices
            .create_invoice(&api.harness.actor, InvoiceInputBuilder::new().build())
            .await
            .unwrap();

        let (status, error) = api
            .post(&format!("/api/v1/invoices/{}/cancel", invoice.id()), json!({ "reason": "" }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["details"][0], "reason: must not be empty");
    }
}

mod webhooks {
    use super::*;

    async fn deliver(api: &Api, body: Vec<u8>, signature: &str) -> (StatusCode, Value) {
        let response = api
            .server
            .post("/webhooks/gateway")
            .add_header(
                HeaderName::from_static(SIGNATURE_HEADER),
                HeaderValue::from_str(signature).unwrap(),
            )
            .bytes(body.into())
            .await;
        (response.status_code(), response.json())
    }

    #[tokio::test]
    async fn test_signed_event_applied_once() {
        let api = Api::new().await;
        let h = &api.harness;
        let booking = api.converted_booking().await;
        let booking_id = booking["id"].as_str().unwrap().parse().unwrap();
        let invoice = h
            .services
            .invoices
            .create_invoice_from_booking(&h.actor, booking_id, TemporalFixtures::days_from_today(14), None)
            .await
            .unwrap();
        h.services.invoices.send_invoice(&h.actor, invoice.id(), None).await.unwrap();

        let body = GatewayEventBuilder::payment_succeeded("evt_1", "pi_1", "ch_1", MoneyFixtures::usd_972(), h.now())
            .tenant(h.tenant_id())
            .invoice(invoice.id())
            .booking(booking_id)
            .build();
        let signature = h.sign(&body);

        let (status, outcome) = deliver(&api, body.clone(), &signature).await;
        assert_eq!(status, StatusCode::OK, "{}", outcome);
        assert_eq!(outcome["outcome"], "applied");
        assert_eq!(outcome["action"], "payment_recorded");

        let (status, outcome) = deliver(&api, body, &signature).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["outcome"], "duplicate");
        assert_eq!(outcome["event_id"], "evt_1");
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let api = Api::new().await;
        let body = GatewayEventBuilder::payment_canceled("evt_2", "pi_2", api.harness.now())
            .tenant(api.harness.tenant_id())
            .build();

        let (status, error) = deliver(&api, body, "t=1,v1=deadbeef").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "gateway_signature_invalid");
    }
}

mod operations {
    use super::*;

    #[tokio::test]
    async fn test_overdue_sweep_counts_reclassified() {
        let api = Api::new().await;
        let h = &api.harness;
        for due in [-2, 5] {
            let invoice = h
                .services
                .invoices
                .create_invoice(
                    &h.actor,
                    InvoiceInputBuilder::new()
                        .issued_on(TemporalFixtures::days_from_today(-20))
                        .due_on(TemporalFixtures::days_from_today(due))
                        .build(),
                )
                .await
                .unwrap();
            h.services.invoices.send_invoice(&h.actor, invoice.id(), None).await.unwrap();
        }

        let (status, body) = api.post("/api/v1/operations/overdue-sweep", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reclassified"], 1);
    }

    #[tokio::test]
    async fn test_operations_need_the_operations_role() {
        let api = Api::with_roles(&[permissions::INVOICE_WRITE]).await;
        let (status, _) = api.post("/api/v1/operations/overdue-sweep", json!({})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_purge_rejects_zero_retention() {
        let api = Api::new().await;
        let (status, error) = api
            .post("/api/v1/operations/processed-events/purge", json!({ "retention_days": 0 }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"], "validation_error");

        let (status, body) = api.post("/api/v1/operations/processed-events/purge", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["retention_days"], 30);
        assert_eq!(body["purged"], 0);
    }
}
