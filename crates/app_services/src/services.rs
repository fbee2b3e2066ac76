//! Wiring of the four services over one shared context

use std::sync::Arc;

use domain_reconciliation::{PaymentGateway, WebhookVerifier};

use crate::booking_service::BookingService;
use crate::context::ServiceContext;
use crate::invoice_service::InvoiceService;
use crate::ports::{DocumentRenderer, ItineraryCatalog, Mailer};
use crate::quote_service::QuoteService;
use crate::reconciliation_service::ReconciliationService;

/// Outbound collaborators the services call
#[derive(Clone)]
pub struct Collaborators {
    pub itineraries: Arc<dyn ItineraryCatalog>,
    pub mailer: Arc<dyn Mailer>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub gateway: Arc<dyn PaymentGateway>,
}

#[derive(Clone)]
pub struct FinancialServices {
    pub quotes: QuoteService,
    pub bookings: BookingService,
    pub invoices: InvoiceService,
    pub reconciliation: ReconciliationService,
}

impl FinancialServices {
    pub fn new(ctx: ServiceContext, collaborators: Collaborators, verifier: WebhookVerifier) -> Self {
        let bookings = BookingService::new(ctx.clone());
        let provider = collaborators.gateway.provider().to_string();
        Self {
            quotes: QuoteService::new(
                ctx.clone(),
                collaborators.itineraries,
                collaborators.mailer.clone(),
                collaborators.renderer,
            ),
            invoices: InvoiceService::new(
                ctx.clone(),
                bookings.clone(),
                collaborators.mailer,
                collaborators.gateway,
            ),
            reconciliation: ReconciliationService::new(ctx, verifier, provider),
            bookings,
        }
    }
}
