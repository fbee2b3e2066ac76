//! Quote handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use core_kernel::QuoteId;
use domain_quote::Quote;

use crate::auth::{permissions, Claims};
use crate::dto::parse_id;
use crate::dto::quotes::*;
use crate::error::ApiError;
use crate::handlers::authorize;
use crate::AppState;

fn quote_id(raw: &str) -> Result<QuoteId, ApiError> {
    parse_id("quote", raw)
}

pub async fn create_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<Quote>), ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    request.validate()?;
    let quote = state.services.quotes.create_quote(&actor, request.into_input()?).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// Reading an expired quote returns it as `expired`
pub async fn get_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_READ)?;
    Ok(Json(state.services.quotes.get_quote(&actor, quote_id(&id)?).await?))
}

pub async fn update_pricing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePricingRequest>,
) -> Result<Json<Quote>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    request.validate()?;
    let id = quote_id(&id)?;
    let currency = state.services.quotes.get_quote(&actor, id).await?.currency();
    let (line_items, discounts, taxes) = request.into_parts(currency)?;
    let quote = state
        .services
        .quotes
        .update_pricing(&actor, id, line_items, discounts, taxes)
        .await?;
    Ok(Json(quote))
}

pub async fn set_payment_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<PaymentScheduleRequest>,
) -> Result<Json<Quote>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    request.validate()?;
    let id = quote_id(&id)?;
    let currency = state.services.quotes.get_quote(&actor, id).await?.currency();
    let quote = state
        .services
        .quotes
        .set_payment_schedule(&actor, id, request.into_schedule(currency))
        .await?;
    Ok(Json(quote))
}

pub async fn send_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<SendQuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    request.validate()?;
    let quote = state
        .services
        .quotes
        .send_quote(&actor, quote_id(&id)?, &request.recipient)
        .await?;
    Ok(Json(quote))
}

pub async fn mark_viewed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_READ)?;
    Ok(Json(state.services.quotes.mark_viewed(&actor, quote_id(&id)?).await?))
}

pub async fn approve_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<ApproveQuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    request.validate()?;
    let quote = state
        .services
        .quotes
        .approve_quote(&actor, quote_id(&id)?, &request.approver_name, request.notes)
        .await?;
    Ok(Json(quote))
}

pub async fn reject_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<RejectQuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    request.validate()?;
    let quote = state
        .services
        .quotes
        .reject_quote(&actor, quote_id(&id)?, &request.reason)
        .await?;
    Ok(Json(quote))
}

/// Creates the next version; only the latest version may be revised
pub async fn revise_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<ReviseQuoteRequest>,
) -> Result<(StatusCode, Json<Quote>), ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    request.validate()?;
    let id = quote_id(&id)?;
    let currency = state.services.quotes.get_quote(&actor, id).await?.currency();
    let revision = request.into_revision(currency, state.clock.now())?;
    let quote = state.services.quotes.revise_quote(&actor, id, revision).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn list_revisions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quote_number): Path<String>,
) -> Result<Json<Vec<Quote>>, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_READ)?;
    Ok(Json(state.services.quotes.list_revisions(&actor, &quote_number).await?))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let actor = authorize(&claims, permissions::QUOTE_WRITE)?;
    state.services.quotes.delete_quote(&actor, quote_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn convert_to_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ConversionResponse>), ApiError> {
    let actor = authorize(&claims, permissions::BOOKING_WRITE)?;
    let (booking, quote) = state.services.quotes.convert_to_booking(&actor, quote_id(&id)?).await?;
    Ok((StatusCode::CREATED, Json(ConversionResponse { booking, quote })))
}
