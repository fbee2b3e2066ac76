//! Gateway webhook
//!
//! Not behind bearer auth: the signature header is what authenticates the
//! caller, and the tenant comes from the event metadata.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use tracing::info;

use app_services::ReconciliationOutcome;
use domain_reconciliation::SIGNATURE_HEADER;

use crate::error::ApiError;
use crate::AppState;

pub async fn receive_gateway_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReconciliationOutcome>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = state
        .services
        .reconciliation
        .receive_gateway_event(&body, signature)
        .await?;
    info!(event_id = %outcome.event_id(), "Gateway event handled");
    Ok(Json(outcome))
}
