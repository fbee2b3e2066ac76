//! Payment gateway port
//!
//! Outbound side of the gateway integration: creating payment intents the
//! customer completes on the gateway's hosted page. The inbound side arrives
//! as webhook events handled by the planner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{DomainPort, Money, PortError};

/// Request for a new payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    pub amount: Money,
    pub description: Option<String>,
    /// Echoed back in every event about this intent
    pub metadata: BTreeMap<String, String>,
    /// Repeated requests with the same key return the same intent
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: DomainPort {
    /// Provider name stored on invoices and payments, e.g. "stripe"
    fn provider(&self) -> &str;

    async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PortError>;
}

/// In-memory gateway for tests and local runs
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    struct State {
        requests: Vec<PaymentIntentRequest>,
        by_key: HashMap<String, PaymentIntent>,
        unavailable: bool,
    }

    #[derive(Debug, Default, Clone)]
    pub struct MockPaymentGateway {
        state: Arc<Mutex<State>>,
    }

    impl MockPaymentGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every following call fail as if the gateway were down
        pub async fn set_unavailable(&self, unavailable: bool) {
            self.state.lock().await.unavailable = unavailable;
        }

        pub async fn requests(&self) -> Vec<PaymentIntentRequest> {
            self.state.lock().await.requests.clone()
        }
    }

    impl DomainPort for MockPaymentGateway {}

    #[async_trait]
    impl PaymentGateway for MockPaymentGateway {
        fn provider(&self) -> &str {
            "mock"
        }

        async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PortError> {
            let mut state = self.state.lock().await;
            if state.unavailable {
                return Err(PortError::ServiceUnavailable {
                    service: "mock gateway".to_string(),
                });
            }
            state.requests.push(request.clone());
            if let Some(existing) = state.by_key.get(&request.idempotency_key) {
                return Ok(existing.clone());
            }

            let n = state.by_key.len() + 1;
            let intent = PaymentIntent {
                id: format!("pi_mock_{}", n),
                client_secret: format!("pi_mock_{}_secret", n),
                status: "requires_payment_method".to_string(),
            };
            state.by_key.insert(request.idempotency_key.clone(), intent.clone());
            Ok(intent)
        }
    }
}
