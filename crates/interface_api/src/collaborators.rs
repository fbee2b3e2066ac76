//! HTTP client for the agency platform
//!
//! Itineraries, outbound email and PDF rendering live in the platform; one
//! client serves all three ports against `{base_url}/tenants/{tenant}/...`.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use app_services::{DocumentRenderer, ItinerarySummary, ItineraryCatalog, Mailer};
use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, ItineraryId, PortError, TenantId};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ADAPTER_ID: &str = "platform";

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
struct ItineraryBody {
    id: ItineraryId,
    title: String,
    destination: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct EmailBody<'a> {
    to: &'a str,
    template: &'a str,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RenderedBody {
    url: String,
}

#[derive(Clone)]
pub struct PlatformClient {
    client: Client,
    config: PlatformConfig,
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PortError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, tenant_id: TenantId, path: &str) -> String {
        format!(
            "{}/tenants/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            tenant_id.as_uuid(),
            path
        )
    }

    async fn failure(response: reqwest::Response) -> PortError {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        warn!(status = %status, detail = %detail, "Platform request failed");
        map_status(status, detail)
    }
}

impl DomainPort for PlatformClient {}

#[async_trait]
impl ItineraryCatalog for PlatformClient {
    #[instrument(skip(self))]
    async fn get_itinerary(
        &self,
        tenant_id: TenantId,
        itinerary_id: ItineraryId,
    ) -> Result<Option<ItinerarySummary>, PortError> {
        let response = self
            .client
            .get(self.url(tenant_id, &format!("itineraries/{}", itinerary_id.as_uuid())))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body: ItineraryBody = response
            .json()
            .await
            .map_err(|e| PortError::transformation(format!("unexpected itinerary response: {}", e)))?;
        Ok(Some(ItinerarySummary {
            id: body.id,
            title: body.title,
            destination: body.destination,
            start_date: body.start_date,
            end_date: body.end_date,
        }))
    }
}

#[async_trait]
impl Mailer for PlatformClient {
    #[instrument(skip(self, data))]
    async fn send_email(&self, tenant_id: TenantId, to: &str, template: &str, data: Value) -> Result<(), PortError> {
        let response = self
            .client
            .post(self.url(tenant_id, "emails"))
            .bearer_auth(&self.config.api_key)
            .json(&EmailBody { to, template, data })
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        debug!("Email accepted by platform");
        Ok(())
    }
}

#[async_trait]
impl DocumentRenderer for PlatformClient {
    #[instrument(skip(self, document))]
    async fn render_pdf(&self, tenant_id: TenantId, document_number: &str, document: Value) -> Result<String, PortError> {
        let response = self
            .client
            .post(self.url(tenant_id, &format!("documents/{}/pdf", document_number)))
            .bearer_auth(&self.config.api_key)
            .json(&document)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        let body: RenderedBody = response
            .json()
            .await
            .map_err(|e| PortError::transformation(format!("unexpected render response: {}", e)))?;
        Ok(body.url)
    }
}

#[async_trait]
impl HealthCheckable for PlatformClient {
    async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));
        let result = self.client.get(url).send().await;
        let elapsed = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => HealthCheckResult::healthy(ADAPTER_ID, elapsed),
            Ok(response) => HealthCheckResult::unhealthy(ADAPTER_ID, elapsed, format!("status {}", response.status())),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, elapsed, e.to_string()),
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout {
            operation: "platform request".to_string(),
            duration_ms: REQUEST_TIMEOUT.as_millis() as u64,
        }
    } else {
        PortError::Connection {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

fn map_status(status: StatusCode, detail: String) -> PortError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized { message: detail },
        StatusCode::NOT_FOUND => PortError::not_found("platform resource", detail),
        s if s.is_client_error() => PortError::validation(detail),
        s if s.is_server_error() => PortError::ServiceUnavailable {
            service: ADAPTER_ID.to_string(),
        },
        _ => PortError::internal(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PlatformClient {
        PlatformClient::new(PlatformConfig {
            base_url: "http://platform.local/internal/".to_string(),
            api_key: "key".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_urls_are_tenant_scoped() {
        let tenant_id = TenantId::new();
        assert_eq!(
            client().url(tenant_id, "emails"),
            format!("http://platform.local/internal/tenants/{}/emails", tenant_id.as_uuid())
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "no".into()),
            PortError::Unauthorized { .. }
        ));
        assert!(map_status(StatusCode::NOT_FOUND, "document".into()).is_not_found());
        assert!(map_status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
    }
}
