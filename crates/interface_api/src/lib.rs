//! HTTP API Layer
//!
//! REST surface of the back office over [`FinancialServices`], using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per document family plus the gateway webhook
//! - **Middleware**: bearer-token tenant resolution and audit logging
//! - **DTOs**: request bodies and their conversion into service inputs
//! - **Error Handling**: `{error, message, current_state?, details?}` bodies
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(services, config, clock));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod collaborators;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use app_services::FinancialServices;
use core_kernel::{Clock, HealthCheckable};

use crate::config::ApiConfig;
use crate::handlers::{bookings, health, invoices, operations, quotes, webhooks};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub services: FinancialServices,
    pub config: ApiConfig,
    pub clock: Arc<dyn Clock>,
    /// Adapters polled by `/health/ready`
    pub readiness: Vec<Arc<dyn HealthCheckable>>,
}

impl AppState {
    pub fn new(services: FinancialServices, config: ApiConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            services,
            config,
            clock,
            readiness: Vec::new(),
        }
    }

    pub fn with_readiness_check(mut self, adapter: Arc<dyn HealthCheckable>) -> Self {
        self.readiness.push(adapter);
        self
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no bearer token)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/webhooks/gateway", post(webhooks::receive_gateway_event));

    let quote_routes = Router::new()
        .route("/", post(quotes::create_quote))
        .route("/:id", get(quotes::get_quote).delete(quotes::delete_quote))
        .route("/:id/pricing", put(quotes::update_pricing))
        .route("/:id/payment-schedule", put(quotes::set_payment_schedule))
        .route("/:id/send", post(quotes::send_quote))
        .route("/:id/view", post(quotes::mark_viewed))
        .route("/:id/approve", post(quotes::approve_quote))
        .route("/:id/reject", post(quotes::reject_quote))
        .route("/:id/revisions", post(quotes::revise_quote))
        .route("/:id/convert", post(quotes::convert_to_booking))
        .route("/by-number/:quote_number/revisions", get(quotes::list_revisions));

    let booking_routes = Router::new()
        .route("/", post(bookings::create_booking))
        .route("/:id", get(bookings::get_booking))
        .route("/:id/status", put(bookings::update_status))
        .route("/:id/total-price", put(bookings::update_total_price))
        .route("/:id/payments", get(bookings::list_payments).post(bookings::add_payment))
        .route("/:id/invoices", post(bookings::create_invoice));

    let payment_routes = Router::new()
        .route("/:id", get(bookings::get_payment))
        .route("/:id/complete", post(bookings::complete_payment))
        .route("/:id/fail", post(bookings::fail_payment))
        .route("/:id/refund", post(bookings::refund_payment));

    let invoice_routes = Router::new()
        .route("/", post(invoices::create_invoice))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/send", post(invoices::send_invoice))
        .route("/:id/pay", post(invoices::mark_paid))
        .route("/:id/refund", post(invoices::refund_invoice))
        .route("/:id/overdue", post(invoices::mark_overdue))
        .route("/:id/cancel", post(invoices::cancel_invoice))
        .route("/:id/notes", post(invoices::add_note))
        .route("/:id/payment-intents", post(invoices::create_payment_intent));

    let operations_routes = Router::new()
        .route("/overdue-sweep", post(operations::sweep_overdue_invoices))
        .route("/processed-events/purge", post(operations::purge_processed_events));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/quotes", quote_routes)
        .nest("/bookings", booking_routes)
        .nest("/payments", payment_routes)
        .nest("/invoices", invoice_routes)
        .nest("/operations", operations_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
