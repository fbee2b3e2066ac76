//! Booking and payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use core_kernel::{BookingId, PaymentId};
use domain_billing::{Invoice, Payment};
use domain_booking::Booking;

use crate::auth::{permissions, Claims};
use crate::dto::bookings::*;
use crate::dto::invoices::InvoiceFromBookingRequest;
use crate::dto::{money, parse_currency, parse_id};
use crate::error::ApiError;
use crate::handlers::authorize;
use crate::AppState;

fn booking_id(raw: &str) -> Result<BookingId, ApiError> {
    parse_id("booking", raw)
}

fn payment_id(raw: &str) -> Result<PaymentId, ApiError> {
    parse_id("payment", raw)
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let actor = authorize(&claims, permissions::BOOKING_WRITE)?;
    request.validate()?;
    let booking = state
        .services
        .bookings
        .create_booking(&actor, request.into_input()?)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let actor = authorize(&claims, permissions::BOOKING_READ)?;
    Ok(Json(state.services.bookings.get_booking(&actor, booking_id(&id)?).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<UpdateBookingStatusRequest>,
) -> Result<Json<Booking>, ApiError> {
    let actor = authorize(&claims, permissions::BOOKING_WRITE)?;
    let booking = state
        .services
        .bookings
        .update_status(&actor, booking_id(&id)?, request.status, request.reason, request.notes)
        .await?;
    Ok(Json(booking))
}

pub async fn update_total_price(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTotalPriceRequest>,
) -> Result<Json<Booking>, ApiError> {
    let actor = authorize(&claims, permissions::BOOKING_WRITE)?;
    request.validate()?;
    let total = money(request.total_price, parse_currency(&request.currency)?);
    let booking = state
        .services
        .bookings
        .update_total_price(&actor, booking_id(&id)?, total, request.deposit_due_date)
        .await?;
    Ok(Json(booking))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let actor = authorize(&claims, permissions::BOOKING_READ)?;
    Ok(Json(state.services.bookings.list_payments(&actor, booking_id(&id)?).await?))
}

pub async fn add_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<AddPaymentRequest>,
) -> Result<(StatusCode, Json<RecordedPaymentResponse>), ApiError> {
    let actor = authorize(&claims, permissions::PAYMENT_WRITE)?;
    request.validate()?;
    let recorded = state
        .services
        .bookings
        .add_payment(&actor, booking_id(&id)?, request.into_input()?)
        .await?;
    Ok((StatusCode::CREATED, Json(recorded.into())))
}

/// Bills the booking's outstanding balance, or part of it
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<InvoiceFromBookingRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let actor = authorize(&claims, permissions::INVOICE_WRITE)?;
    let id = booking_id(&id)?;
    let amount = match request.amount {
        Some(amount) => {
            let currency = state.services.bookings.get_booking(&actor, id).await?.balance_due().currency();
            Some(money(amount, currency))
        }
        None => None,
    };
    let invoice = state
        .services
        .invoices
        .create_invoice_from_booking(&actor, id, request.due_date, amount)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let actor = authorize(&claims, permissions::BOOKING_READ)?;
    Ok(Json(state.services.bookings.get_payment(&actor, payment_id(&id)?).await?))
}

pub async fn complete_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<RecordedPaymentResponse>, ApiError> {
    let actor = authorize(&claims, permissions::PAYMENT_WRITE)?;
    let recorded = state.services.bookings.complete_payment(&actor, payment_id(&id)?).await?;
    Ok(Json(recorded.into()))
}

pub async fn fail_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<FailPaymentRequest>,
) -> Result<Json<RecordedPaymentResponse>, ApiError> {
    let actor = authorize(&claims, permissions::PAYMENT_WRITE)?;
    request.validate()?;
    let recorded = state
        .services
        .bookings
        .fail_payment(&actor, payment_id(&id)?, &request.reason)
        .await?;
    Ok(Json(recorded.into()))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<RefundPaymentRequest>,
) -> Result<Json<RecordedPaymentResponse>, ApiError> {
    let actor = authorize(&claims, permissions::PAYMENT_REFUND)?;
    request.validate()?;
    let id = payment_id(&id)?;
    let currency = state.services.bookings.get_payment(&actor, id).await?.amount().currency();
    let recorded = state
        .services
        .bookings
        .refund_payment(&actor, id, money(request.amount, currency), &request.reason)
        .await?;
    Ok(Json(recorded.into()))
}
