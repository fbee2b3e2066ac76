//! HTTP adapter for a Stripe-compatible payment gateway

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError};

use crate::gateway::{PaymentGateway, PaymentIntent, PaymentIntentRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateIntentBody<'a> {
    /// Smallest currency unit
    amount: i64,
    currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    metadata: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    config: HttpGatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PortError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

impl DomainPort for HttpPaymentGateway {}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn provider(&self) -> &str {
        &self.config.provider
    }

    #[instrument(skip(self, request), fields(amount = %request.amount))]
    async fn create_payment_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PortError> {
        let body = CreateIntentBody {
            amount: request
                .amount
                .to_minor()
                .map_err(|e| PortError::transformation(e.to_string()))?,
            currency: request.amount.currency().code().to_ascii_lowercase(),
            description: request.description.as_deref(),
            metadata: &request.metadata,
        };

        let response = self
            .client
            .post(self.url("v1/payment_intents"))
            .bearer_auth(&self.config.api_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;
        debug!(status = %status, "Gateway create_payment_intent response");

        if status.is_success() {
            let intent: PaymentIntent = serde_json::from_str(&text)
                .map_err(|e| PortError::transformation(format!("unexpected gateway response: {}", e)))?;
            info!(intent_id = %intent.id, provider = %self.config.provider, "Payment intent created");
            return Ok(intent);
        }

        let detail = serde_json::from_str::<GatewayErrorBody>(&text)
            .ok()
            .map(|body| {
                format!(
                    "{}: {}",
                    body.error.code.unwrap_or_else(|| "unknown".to_string()),
                    body.error.message.unwrap_or_default()
                )
            })
            .unwrap_or(text);
        error!(status = %status, detail = %detail, "Gateway rejected payment intent");
        Err(map_status(status, detail, &self.config.provider))
    }
}

#[async_trait]
impl HealthCheckable for HttpPaymentGateway {
    async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let result = self
            .client
            .get(self.url("v1/balance"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await;
        let elapsed = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => HealthCheckResult::healthy("payment_gateway", elapsed),
            Ok(response) => HealthCheckResult::unhealthy(
                "payment_gateway",
                elapsed,
                format!("status {}", response.status()),
            ),
            Err(e) => HealthCheckResult::unhealthy("payment_gateway", elapsed, e.to_string()),
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout {
            operation: "payment gateway request".to_string(),
            duration_ms: REQUEST_TIMEOUT.as_millis() as u64,
        }
    } else {
        PortError::Connection {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

fn map_status(status: StatusCode, detail: String, provider: &str) -> PortError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized { message: detail },
        StatusCode::CONFLICT => PortError::conflict(detail),
        s if s.is_client_error() => PortError::validation(detail),
        s if s.is_server_error() => PortError::ServiceUnavailable {
            service: provider.to_string(),
        },
        _ => PortError::internal(detail),
    }
}
