//! Scheduled maintenance, triggered over HTTP by the job runner

use axum::{extract::State, Extension, Json};
use tracing::info;
use validator::Validate;

use crate::auth::{permissions, Claims};
use crate::dto::operations::*;
use crate::error::ApiError;
use crate::handlers::authorize;
use crate::AppState;

/// Reclassifies the calling tenant's past-due invoices as overdue
pub async fn sweep_overdue_invoices(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SweepResponse>, ApiError> {
    let actor = authorize(&claims, permissions::OPERATIONS)?;
    let reclassified = state.services.invoices.sweep_overdue_invoices(actor.tenant_id).await?;
    info!(tenant_id = %actor.tenant_id, reclassified, "Overdue sweep finished");
    Ok(Json(SweepResponse {
        tenant_id: actor.tenant_id,
        reclassified,
    }))
}

/// Drops processed-event records older than the retention window
pub async fn purge_processed_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    request: Option<Json<PurgeRequest>>,
) -> Result<Json<PurgeResponse>, ApiError> {
    authorize(&claims, permissions::OPERATIONS)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let retention_days = request
        .retention_days
        .unwrap_or(state.config.processed_event_retention_days);
    let purged = state
        .services
        .reconciliation
        .purge_processed_events(retention_days)
        .await?;
    Ok(Json(PurgeResponse { retention_days, purged }))
}
