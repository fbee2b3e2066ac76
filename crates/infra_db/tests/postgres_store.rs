//! PostgreSQL adapter tests
//!
//! Each test registers its own tenant in the shared container, so they can
//! run in any order. They need Docker and are ignored by default:
//!
//! ```text
//! cargo test -p infra_db -- --ignored
//! ```

use std::sync::Arc;

use chrono::Duration;
use rust_decimal_macros::dec;
use tokio::task::JoinSet;

use app_services::mock::{MockDocumentRenderer, MockItineraryCatalog, RecordingMailer};
use app_services::{
    Actor, AddPaymentInput, ChangeSet, Collaborators, CommitOutcome, FinancialServices, FinancialStore,
    ProcessedEvent, ReconciliationOutcome, ServiceContext,
};
use core_kernel::{AdapterHealth, Clock, FixedClock, HealthCheckable, PaymentMethod, TenantId};
use domain_booking::PaymentStatus;
use domain_quote::QuoteStatus;
use domain_reconciliation::gateway::mock::MockPaymentGateway;
use domain_reconciliation::{WebhookVerifier, DEFAULT_TOLERANCE_SECS};
use domain_sequence::{CounterKey, CounterStore, DocumentKind, SequenceAllocator, Tenant};
use infra_db::{PostgresCounterStore, PostgresFinancialStore, PostgresTenantDirectory};
use test_utils::{
    assert_booking_ledger_consistent, assert_error_code, create_isolated_test_database, get_shared_test_database, BookingInputBuilder,
    GatewayEventBuilder, IdFixtures, ItineraryFixtures, MoneyFixtures, QuoteInputBuilder, TemporalFixtures,
    TestDatabase, WEBHOOK_SECRET,
};

struct PgHarness {
    store: Arc<PostgresFinancialStore>,
    counters: Arc<PostgresCounterStore>,
    clock: Arc<FixedClock>,
    verifier: WebhookVerifier,
    services: FinancialServices,
    actor: Actor,
}

impl PgHarness {
    async fn new(db: &TestDatabase) -> Self {
        let tenant = Tenant::new(TenantId::new(), "Harbour Holidays");
        db.seed_tenant(&tenant).await.unwrap();
        let actor = Actor::new(tenant.id, IdFixtures::user_id());

        let pool = db.pool().clone();
        let store = Arc::new(PostgresFinancialStore::new(pool.clone()));
        let counters = Arc::new(PostgresCounterStore::new(pool.clone()));
        let tenants = Arc::new(PostgresTenantDirectory::new(pool));
        let clock = Arc::new(FixedClock::at(TemporalFixtures::now()));

        let itineraries = Arc::new(MockItineraryCatalog::new());
        itineraries.insert(actor.tenant_id, ItineraryFixtures::kerala()).await;
        let verifier = WebhookVerifier::new(WEBHOOK_SECRET, DEFAULT_TOLERANCE_SECS);

        let ctx = ServiceContext::new(
            store.clone(),
            tenants.clone(),
            SequenceAllocator::new(tenants, counters.clone()),
            clock.clone(),
        );
        let services = FinancialServices::new(
            ctx,
            Collaborators {
                itineraries,
                mailer: Arc::new(RecordingMailer::new()),
                renderer: Arc::new(MockDocumentRenderer::new()),
                gateway: Arc::new(MockPaymentGateway::new()),
            },
            verifier.clone(),
        );

        Self {
            store,
            counters,
            clock,
            verifier,
            services,
            actor,
        }
    }

    fn tenant_id(&self) -> TenantId {
        self.actor.tenant_id
    }

    fn sign(&self, payload: &[u8]) -> String {
        self.verifier.sign(payload, self.clock.now().timestamp()).unwrap()
    }
}

mod counters {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_concurrent_allocations_are_distinct() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let key = CounterKey::new(h.tenant_id(), DocumentKind::Invoice, "2025");

        let mut tasks = JoinSet::new();
        for _ in 0..20 {
            let counters = h.counters.clone();
            let key = key.clone();
            tasks.spawn(async move { counters.next_value(&key, 1).await.unwrap() });
        }
        let mut values = tasks.join_all().await;

        values.sort_unstable();
        assert_eq!(values, (1..=20).collect::<Vec<u64>>());
        assert_eq!(h.counters.peek(&key).await.unwrap(), Some(20));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_first_value_honours_start_number() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let key = CounterKey::new(h.tenant_id(), DocumentKind::Booking, "2503");

        assert_eq!(h.counters.peek(&key).await.unwrap(), None);
        assert_eq!(h.counters.next_value(&key, 500).await.unwrap(), 500);
        assert_eq!(h.counters.next_value(&key, 500).await.unwrap(), 501);
    }
}

mod commits {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_stale_version_is_rejected() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let booking = h
            .services
            .bookings
            .create_booking(&h.actor, BookingInputBuilder::new().build())
            .await
            .unwrap();
        assert_eq!(booking.lock_version(), 1);

        let first = h.store.get_booking(h.tenant_id(), booking.id()).await.unwrap().unwrap();
        let second = first.clone();

        let applied = h.store.commit(ChangeSet::new().with_booking(first)).await.unwrap();
        let CommitOutcome::Applied(mut applied) = applied else {
            panic!("expected the first writer to win");
        };
        assert_eq!(applied.take_booking().unwrap().lock_version(), 2);

        let err = h.store.commit(ChangeSet::new().with_booking(second)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_failed_commit_writes_nothing() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let booking = h
            .services
            .bookings
            .create_booking(&h.actor, BookingInputBuilder::new().build())
            .await
            .unwrap();
        let quote = h
            .services
            .quotes
            .create_quote(&h.actor, QuoteInputBuilder::new().build())
            .await
            .unwrap();

        let mut stale = booking.clone();
        stale.set_lock_version(7);
        let event = ProcessedEvent {
            tenant_id: h.tenant_id(),
            event_id: "evt_rollback".to_string(),
            event_type: "payment_intent.succeeded".to_string(),
            outcome: "payment_recorded".to_string(),
            processed_at: h.clock.now(),
        };
        let err = h
            .store
            .commit(
                ChangeSet::new()
                    .with_quote(quote.clone())
                    .with_booking(stale)
                    .with_processed_event(event),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = h.store.get_quote(h.tenant_id(), quote.id()).await.unwrap().unwrap();
        assert_eq!(stored.lock_version(), quote.lock_version());
        assert!(!h.store.is_event_processed(h.tenant_id(), "evt_rollback").await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_recorded_event_blocks_replay() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let event = ProcessedEvent {
            tenant_id: h.tenant_id(),
            event_id: "evt_once".to_string(),
            event_type: "charge.refunded".to_string(),
            outcome: "refund_applied".to_string(),
            processed_at: h.clock.now(),
        };

        let first = h.store.commit(ChangeSet::new().with_processed_event(event.clone())).await.unwrap();
        assert!(matches!(first, CommitOutcome::Applied(_)));
        let replay = h.store.commit(ChangeSet::new().with_processed_event(event)).await.unwrap();
        assert!(matches!(replay, CommitOutcome::DuplicateEvent));
        assert!(h.store.is_event_processed(h.tenant_id(), "evt_once").await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_reused_document_number_is_refused() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let first = h
            .services
            .bookings
            .create_booking(&h.actor, BookingInputBuilder::new().build())
            .await
            .unwrap();

        sqlx::query("DELETE FROM sequence_counters WHERE tenant_id = $1")
            .bind(h.tenant_id().as_uuid())
            .execute(db.pool())
            .await
            .unwrap();

        assert_error_code(
            h.services
                .bookings
                .create_booking(&h.actor, BookingInputBuilder::new().build())
                .await,
            "conflict",
        );
        let stored = h.store.get_booking(h.tenant_id(), first.id()).await.unwrap().unwrap();
        assert_eq!(stored.booking_number(), first.booking_number());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_documents_are_tenant_scoped() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let booking = h
            .services
            .bookings
            .create_booking(&h.actor, BookingInputBuilder::new().build())
            .await
            .unwrap();

        assert!(h.store.get_booking(TenantId::new(), booking.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_health_check_reports_healthy() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;

        assert_eq!(h.store.health_check().await.status, AdapterHealth::Healthy);
        assert!(h.store.is_ready().await);
    }
}

mod service_flows {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_quote_to_paid_booking() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let quotes = &h.services.quotes;

        let quote = quotes
            .create_quote(&h.actor, QuoteInputBuilder::standard_scenario().build())
            .await
            .unwrap();
        quotes.send_quote(&h.actor, quote.id(), "asha.menon@example.com").await.unwrap();
        quotes.approve_quote(&h.actor, quote.id(), "Asha Menon", None).await.unwrap();
        let (booking, converted) = quotes.convert_to_booking(&h.actor, quote.id()).await.unwrap();
        assert_eq!(converted.status(), QuoteStatus::Converted);

        let recorded = h
            .services
            .bookings
            .add_payment(
                &h.actor,
                booking.id(),
                AddPaymentInput::completed(MoneyFixtures::usd_972(), PaymentMethod::BankTransfer),
            )
            .await
            .unwrap();
        assert_eq!(recorded.booking.payment_status(), PaymentStatus::FullyPaid);

        let stored = h.services.bookings.get_booking(&h.actor, booking.id()).await.unwrap();
        assert_booking_ledger_consistent(&stored);
        let payments = h.services.bookings.list_payments(&h.actor, booking.id()).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].transaction_id(), recorded.payment.transaction_id());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_concurrent_payments_on_one_booking() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let booking = h
            .services
            .bookings
            .create_booking(&h.actor, BookingInputBuilder::new().build())
            .await
            .unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..4 {
            let bookings = h.services.bookings.clone();
            let (actor, booking_id) = (h.actor, booking.id());
            tasks.spawn(async move {
                bookings
                    .add_payment(
                        &actor,
                        booking_id,
                        AddPaymentInput::completed(MoneyFixtures::usd(dec!(50)), PaymentMethod::Cash),
                    )
                    .await
            });
        }
        let results = tasks.join_all().await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert!(succeeded >= 1);

        let stored = h.services.bookings.get_booking(&h.actor, booking.id()).await.unwrap();
        assert_eq!(stored.payments().len(), succeeded);
        assert_booking_ledger_consistent(&stored);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_webhook_applied_once_and_purged() {
        // purging is global, so this one gets its own container
        let db = create_isolated_test_database().await.unwrap();
        let h = PgHarness::new(&db).await;
        let booking = h
            .services
            .bookings
            .create_booking(&h.actor, BookingInputBuilder::new().build())
            .await
            .unwrap();
        let invoices = &h.services.invoices;
        let invoice = invoices
            .create_invoice_from_booking(&h.actor, booking.id(), TemporalFixtures::days_from_today(14), None)
            .await
            .unwrap();
        invoices.send_invoice(&h.actor, invoice.id(), None).await.unwrap();

        let charge_id = format!("ch_{}", h.tenant_id().as_uuid().simple());
        let body = GatewayEventBuilder::payment_succeeded("evt_pg_1", "pi_pg_1", &charge_id, MoneyFixtures::usd_1000(), h.clock.now())
            .tenant(h.tenant_id())
            .invoice(invoice.id())
            .booking(booking.id())
            .build();
        let signature = h.sign(&body);
        let reconciliation = &h.services.reconciliation;

        let first = reconciliation.receive_gateway_event(&body, Some(&signature)).await.unwrap();
        assert!(matches!(first, ReconciliationOutcome::Applied { .. }));
        let second = reconciliation.receive_gateway_event(&body, Some(&signature)).await.unwrap();
        assert!(matches!(second, ReconciliationOutcome::Duplicate { .. }));

        assert_eq!(h.store.locate_gateway_charge(&charge_id).await.unwrap(), Some(h.tenant_id()));
        let payment = h
            .store
            .find_payment_by_gateway_id(h.tenant_id(), &charge_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.booking_id(), booking.id());

        h.clock.advance(Duration::days(31));
        assert_eq!(reconciliation.purge_processed_events(30).await.unwrap(), 1);
        assert!(!h.store.is_event_processed(h.tenant_id(), "evt_pg_1").await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_overdue_sweep_uses_due_date_index() {
        let db = get_shared_test_database().await;
        let h = PgHarness::new(&db).await;
        let invoices = &h.services.invoices;
        for due in [-2, 5] {
            let invoice = invoices
                .create_invoice(
                    &h.actor,
                    test_utils::InvoiceInputBuilder::new()
                        .issued_on(TemporalFixtures::days_from_today(-10))
                        .due_on(TemporalFixtures::days_from_today(due))
                        .build(),
                )
                .await
                .unwrap();
            invoices.send_invoice(&h.actor, invoice.id(), None).await.unwrap();
        }

        assert_eq!(invoices.sweep_overdue_invoices(h.tenant_id()).await.unwrap(), 1);
    }
}
