//! Service Harness
//!
//! Wires the application services over the in-memory adapters with a
//! fixed clock, one seeded tenant and one seeded itinerary.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use app_services::mock::{InMemoryFinancialStore, MockDocumentRenderer, MockItineraryCatalog, RecordingMailer};
use app_services::{Actor, Collaborators, FinancialServices, ServiceContext};
use core_kernel::{Clock, FixedClock, TenantId};
use domain_reconciliation::gateway::mock::MockPaymentGateway;
use domain_reconciliation::{WebhookVerifier, DEFAULT_TOLERANCE_SECS};
use domain_sequence::ports::mock::{MockCounterStore, MockTenantDirectory};
use domain_sequence::{SequenceAllocator, Tenant};

use crate::fixtures::{IdFixtures, ItineraryFixtures, TemporalFixtures, TenantFixtures};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub struct TestHarness {
    pub store: Arc<InMemoryFinancialStore>,
    pub tenants: Arc<MockTenantDirectory>,
    pub counters: Arc<MockCounterStore>,
    pub clock: Arc<FixedClock>,
    pub itineraries: Arc<MockItineraryCatalog>,
    pub mailer: Arc<RecordingMailer>,
    pub renderer: Arc<MockDocumentRenderer>,
    pub gateway: Arc<MockPaymentGateway>,
    pub verifier: WebhookVerifier,
    pub services: FinancialServices,
    pub actor: Actor,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_tenant(TenantFixtures::agency()).await
    }

    pub async fn with_tenant(tenant: Tenant) -> Self {
        let actor = Actor::new(tenant.id, IdFixtures::user_id());
        let tenants = Arc::new(MockTenantDirectory::with_tenants(vec![tenant]).await);
        let counters = Arc::new(MockCounterStore::new());
        let store = Arc::new(InMemoryFinancialStore::new());
        let clock = Arc::new(FixedClock::at(TemporalFixtures::now()));

        let itineraries = Arc::new(MockItineraryCatalog::new());
        itineraries.insert(actor.tenant_id, ItineraryFixtures::kerala()).await;
        let mailer = Arc::new(RecordingMailer::new());
        let renderer = Arc::new(MockDocumentRenderer::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let verifier = WebhookVerifier::new(WEBHOOK_SECRET, DEFAULT_TOLERANCE_SECS);

        let ctx = ServiceContext::new(
            store.clone(),
            tenants.clone(),
            SequenceAllocator::new(tenants.clone(), counters.clone()),
            clock.clone(),
        );
        let services = FinancialServices::new(
            ctx,
            Collaborators {
                itineraries: itineraries.clone(),
                mailer: mailer.clone(),
                renderer: renderer.clone(),
                gateway: gateway.clone(),
            },
            verifier.clone(),
        );

        Self {
            store,
            tenants,
            counters,
            clock,
            itineraries,
            mailer,
            renderer,
            gateway,
            verifier,
            services,
            actor,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.actor.tenant_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    /// Signature header for `payload`, signed at the harness clock
    pub fn sign(&self, payload: &[u8]) -> String {
        self.verifier
            .sign(payload, self.now().timestamp())
            .expect("test secret is non-empty")
    }
}
