//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use core_kernel::InvoiceId;
use domain_billing::Invoice;

use crate::auth::{permissions, Claims};
use crate::dto::invoices::*;
use crate::dto::{money, parse_id};
use crate::error::ApiError;
use crate::handlers::authorize;
use crate::AppState;

fn invoice_id(raw: &str) -> Result<InvoiceId, ApiError> {
    parse_id("invoice", raw)
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let actor = authorize(&claims, permissions::INVOICE_WRITE)?;
    request.validate()?;
    let invoice = state
        .services
        .invoices
        .create_invoice(&actor, request.into_input()?)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// A past-due invoice reads as `overdue` even before the sweep runs
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    let actor = authorize(&claims, permissions::INVOICE_READ)?;
    Ok(Json(state.services.invoices.get_invoice(&actor, invoice_id(&id)?).await?))
}

pub async fn send_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    request: Option<Json<SendInvoiceRequest>>,
) -> Result<Json<Invoice>, ApiError> {
    let actor = authorize(&claims, permissions::INVOICE_WRITE)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    request.validate()?;
    let invoice = state
        .services
        .invoices
        .send_invoice(&actor, invoice_id(&id)?, request.recipient.as_deref())
        .await?;
    Ok(Json(invoice))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<MarkPaidRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let actor = authorize(&claims, permissions::PAYMENT_WRITE)?;
    let id = invoice_id(&id)?;
    let currency = state.services.invoices.get_invoice(&actor, id).await?.currency();
    let invoice = state
        .services
        .invoices
        .mark_invoice_paid(&actor, id, request.into_input(currency))
        .await?;
    Ok(Json(invoice))
}

pub async fn refund_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<RefundInvoiceRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let actor = authorize(&claims, permissions::PAYMENT_REFUND)?;
    request.validate()?;
    let id = invoice_id(&id)?;
    let currency = state.services.invoices.get_invoice(&actor, id).await?.currency();
    let invoice = state
        .services
        .invoices
        .refund_invoice(&actor, id, money(request.amount, currency), &request.reason)
        .await?;
    Ok(Json(invoice))
}

pub async fn mark_overdue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    let actor = authorize(&claims, permissions::INVOICE_WRITE)?;
    Ok(Json(state.services.invoices.mark_invoice_overdue(&actor, invoice_id(&id)?).await?))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<CancelInvoiceRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let actor = authorize(&claims, permissions::INVOICE_WRITE)?;
    request.validate()?;
    let invoice = state
        .services
        .invoices
        .cancel_invoice(&actor, invoice_id(&id)?, &request.reason)
        .await?;
    Ok(Json(invoice))
}

pub async fn add_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<InternalNoteRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let actor = authorize(&claims, permissions::INVOICE_WRITE)?;
    request.validate()?;
    let invoice = state
        .services
        .invoices
        .add_internal_note(&actor, invoice_id(&id)?, &request.text)
        .await?;
    Ok(Json(invoice))
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    request: Option<Json<PaymentIntentRequest>>,
) -> Result<(StatusCode, Json<PaymentIntentResponse>), ApiError> {
    let actor = authorize(&claims, permissions::PAYMENT_WRITE)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let id = invoice_id(&id)?;
    let amount = match request.amount {
        Some(amount) => {
            let currency = state.services.invoices.get_invoice(&actor, id).await?.currency();
            Some(money(amount, currency))
        }
        None => None,
    };
    let intent = state.services.invoices.create_payment_intent(&actor, id, amount).await?;
    Ok((StatusCode::CREATED, Json(intent.into())))
}
