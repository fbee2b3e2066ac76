//! Quote operations: creation from an itinerary, the send / decision
//! workflow, revision chains and conversion into a booking

use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{Currency, DateRange, ItineraryId, PortError, QuoteId, ValidityWindow};
use domain_booking::{Booking, BookingCustomer, NewBooking, Traveler};
use domain_quote::{
    CustomerSnapshot, Discount, LineItem, NewQuote, PaymentSchedule, Quote, QuoteError, QuoteRevision, Tax,
    TravelerCounts,
};
use domain_sequence::DocumentKind;

use crate::context::{committed, with_conflict_retry, Actor, ServiceContext};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{ChangeSet, DocumentRenderer, ItineraryCatalog, Mailer};

pub const DEFAULT_VALIDITY_DAYS: i64 = 14;

#[derive(Debug, Clone)]
pub struct CreateQuoteInput {
    pub itinerary_id: ItineraryId,
    pub customer: CustomerSnapshot,
    pub travelers: TravelerCounts,
    /// Defaults to the itinerary's dates
    pub travel_dates: Option<DateRange>,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
    pub discounts: Vec<Discount>,
    pub taxes: Vec<Tax>,
    pub valid_for_days: Option<i64>,
    pub payment_schedule: Option<PaymentSchedule>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct QuoteService {
    ctx: ServiceContext,
    itineraries: Arc<dyn ItineraryCatalog>,
    mailer: Arc<dyn Mailer>,
    renderer: Arc<dyn DocumentRenderer>,
}

impl QuoteService {
    pub fn new(
        ctx: ServiceContext,
        itineraries: Arc<dyn ItineraryCatalog>,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            ctx,
            itineraries,
            mailer,
            renderer,
        }
    }

    #[instrument(skip(self, input), fields(tenant_id = %actor.tenant_id, itinerary_id = %input.itinerary_id))]
    pub async fn create_quote(&self, actor: &Actor, input: CreateQuoteInput) -> ServiceResult<Quote> {
        let itinerary = self
            .itineraries
            .get_itinerary(actor.tenant_id, input.itinerary_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Itinerary", input.itinerary_id))?;

        let travel_dates = match input.travel_dates {
            Some(dates) => dates,
            None => DateRange::new(itinerary.start_date, itinerary.end_date)?,
        };
        let now = self.ctx.clock.now();
        let validity = ValidityWindow::days_from(now, input.valid_for_days.unwrap_or(DEFAULT_VALIDITY_DAYS));

        let number = self
            .ctx
            .allocator
            .allocate(actor.tenant_id, DocumentKind::Quote, now)
            .await?;
        let quote = Quote::new(
            NewQuote {
                tenant_id: actor.tenant_id,
                itinerary_id: itinerary.id,
                customer: input.customer,
                travelers: input.travelers,
                travel_dates,
                destination: itinerary.destination,
                currency: input.currency,
                line_items: input.line_items,
                discounts: input.discounts,
                taxes: input.taxes,
                validity,
                payment_schedule: input.payment_schedule.unwrap_or_default(),
                notes: input.notes,
                created_by: actor.user_id,
            },
            number,
            now,
        )?;

        let quote = committed(self.ctx.commit(ChangeSet::new().with_quote(quote)).await?.take_quote(), "quote")?;
        info!(
            quote_number = %quote.quote_number(),
            grand_total = %quote.pricing().grand_total,
            "Quote created"
        );
        Ok(quote)
    }

    /// Loads a quote, persisting lazy expiry first
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn get_quote(&self, actor: &Actor, quote_id: QuoteId) -> ServiceResult<Quote> {
        let mut quote = self.load(actor, quote_id).await?;
        if quote.apply_lazy_expiry(self.ctx.clock.now()) {
            quote = self.save(quote).await?;
            info!(quote_number = %quote.quote_number(), version = quote.version(), "Quote expired");
        }
        Ok(quote)
    }

    pub async fn update_pricing(
        &self,
        actor: &Actor,
        quote_id: QuoteId,
        line_items: Vec<LineItem>,
        discounts: Vec<Discount>,
        taxes: Vec<Tax>,
    ) -> ServiceResult<Quote> {
        let mut quote = self.get_quote(actor, quote_id).await?;
        quote.update_pricing(line_items, discounts, taxes, self.ctx.clock.now())?;
        self.save(quote).await
    }

    pub async fn set_payment_schedule(
        &self,
        actor: &Actor,
        quote_id: QuoteId,
        schedule: PaymentSchedule,
    ) -> ServiceResult<Quote> {
        let mut quote = self.get_quote(actor, quote_id).await?;
        quote.set_payment_schedule(schedule, self.ctx.clock.now())?;
        self.save(quote).await
    }

    /// Renders the PDF, marks the quote sent and then emails the customer
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn send_quote(&self, actor: &Actor, quote_id: QuoteId, recipient: &str) -> ServiceResult<Quote> {
        let now = self.ctx.clock.now();
        let mut preview = self.get_quote(actor, quote_id).await?;
        preview.mark_as_sent(recipient, now)?;

        let document = serde_json::to_value(&preview).map_err(|e| PortError::transformation(e.to_string()))?;
        let pdf_url = self
            .renderer
            .render_pdf(actor.tenant_id, preview.quote_number(), document)
            .await?;

        // The email goes out only once the sent state is committed
        let pdf = pdf_url.as_str();
        let quote = with_conflict_retry(self.ctx.max_conflict_retries, "send_quote", move || async move {
            let mut quote = self.get_quote(actor, quote_id).await?;
            quote.mark_as_sent(recipient, now)?;
            quote.attach_pdf(pdf.to_string(), now);
            self.save(quote).await
        })
        .await?;

        self.mailer
            .send_email(
                actor.tenant_id,
                recipient,
                "quote_sent",
                json!({
                    "quote_number": quote.quote_number(),
                    "version": quote.version(),
                    "customer_name": quote.customer().name,
                    "destination": quote.destination(),
                    "grand_total": quote.pricing().grand_total.to_string(),
                    "valid_until": quote.validity().valid_until,
                    "pdf_url": pdf_url,
                }),
            )
            .await?;

        info!(quote_number = %quote.quote_number(), version = quote.version(), "Quote sent");
        Ok(quote)
    }

    /// Records a customer view; a no-op unless the quote is sent
    pub async fn mark_viewed(&self, actor: &Actor, quote_id: QuoteId) -> ServiceResult<Quote> {
        let mut quote = self.get_quote(actor, quote_id).await?;
        if quote.mark_as_viewed(self.ctx.clock.now()) {
            return self.save(quote).await;
        }
        Ok(quote)
    }

    #[instrument(skip(self, notes), fields(tenant_id = %actor.tenant_id))]
    pub async fn approve_quote(
        &self,
        actor: &Actor,
        quote_id: QuoteId,
        approver_name: &str,
        notes: Option<String>,
    ) -> ServiceResult<Quote> {
        let mut quote = self.get_quote(actor, quote_id).await?;
        quote.approve(approver_name, notes, self.ctx.clock.now())?;
        let quote = self.save(quote).await?;
        info!(quote_number = %quote.quote_number(), version = quote.version(), "Quote approved");
        Ok(quote)
    }

    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn reject_quote(&self, actor: &Actor, quote_id: QuoteId, reason: &str) -> ServiceResult<Quote> {
        let mut quote = self.get_quote(actor, quote_id).await?;
        quote.reject(reason, self.ctx.clock.now())?;
        let quote = self.save(quote).await?;
        info!(quote_number = %quote.quote_number(), version = quote.version(), "Quote rejected");
        Ok(quote)
    }

    /// Creates the next version of a chain; only the latest version may be revised
    #[instrument(skip(self, updates), fields(tenant_id = %actor.tenant_id))]
    pub async fn revise_quote(&self, actor: &Actor, quote_id: QuoteId, updates: QuoteRevision) -> ServiceResult<Quote> {
        let quote = self.get_quote(actor, quote_id).await?;
        let versions = self
            .ctx
            .store
            .list_quote_versions(actor.tenant_id, quote.quote_number())
            .await?;
        let latest = versions.iter().map(Quote::version).max().unwrap_or(quote.version());
        if quote.version() != latest {
            return Err(QuoteError::NotLatestVersion {
                quote_id,
                version: quote.version(),
                latest,
            }
            .into());
        }

        let revision = quote.create_revision(updates, actor.user_id, self.ctx.clock.now())?;
        let revision = self.save(revision).await?;
        info!(
            quote_number = %revision.quote_number(),
            version = revision.version(),
            grand_total = %revision.pricing().grand_total,
            "Quote revised"
        );
        Ok(revision)
    }

    /// Every version of a chain, oldest first
    pub async fn list_revisions(&self, actor: &Actor, quote_number: &str) -> ServiceResult<Vec<Quote>> {
        let versions = self
            .ctx
            .store
            .list_quote_versions(actor.tenant_id, quote_number)
            .await?;
        if versions.is_empty() {
            return Err(ServiceError::not_found("Quote", quote_number));
        }
        Ok(versions)
    }

    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn delete_quote(&self, actor: &Actor, quote_id: QuoteId) -> ServiceResult<()> {
        let quote = self.load(actor, quote_id).await?;
        quote.ensure_deletable()?;
        self.ctx
            .store
            .delete_quote(actor.tenant_id, quote_id, quote.lock_version())
            .await?;
        info!(quote_number = %quote.quote_number(), version = quote.version(), "Quote deleted");
        Ok(())
    }

    /// Converts an approved quote into a pending booking, exactly once.
    ///
    /// The booking and the converted quote are written in one commit, so a
    /// concurrent second conversion loses on the quote's version check.
    #[instrument(skip(self), fields(tenant_id = %actor.tenant_id))]
    pub async fn convert_to_booking(&self, actor: &Actor, quote_id: QuoteId) -> ServiceResult<(Booking, Quote)> {
        self.get_quote(actor, quote_id).await?.conversion_snapshot()?;
        let booking_number = self
            .ctx
            .allocator
            .allocate(actor.tenant_id, DocumentKind::Booking, self.ctx.clock.now())
            .await?;

        let number = &booking_number;
        let (booking, quote) = with_conflict_retry(self.ctx.max_conflict_retries, "convert_to_booking", move || {
            self.try_convert(actor, quote_id, number)
        })
        .await?;

        info!(
            quote_number = %quote.quote_number(),
            booking_number = %booking.booking_number(),
            total_price = %booking.pricing().total_price,
            "Quote converted to booking"
        );
        Ok((booking, quote))
    }

    async fn try_convert(&self, actor: &Actor, quote_id: QuoteId, booking_number: &str) -> ServiceResult<(Booking, Quote)> {
        let mut quote = self.get_quote(actor, quote_id).await?;
        let snapshot = quote.conversion_snapshot()?;
        let now = self.ctx.clock.now();
        let today = self.ctx.tenant_today(actor.tenant_id).await?;

        let booking = Booking::new(
            NewBooking {
                tenant_id: snapshot.tenant_id,
                quote_id: Some(snapshot.quote_id),
                itinerary_id: Some(snapshot.itinerary_id),
                customer: BookingCustomer {
                    customer_id: snapshot.customer.customer_id,
                    name: snapshot.customer.name,
                    email: snapshot.customer.email,
                    phone: snapshot.customer.phone,
                },
                travelers: Traveler::slots(
                    snapshot.travelers.adults,
                    snapshot.travelers.children,
                    snapshot.travelers.infants,
                ),
                travel_start: snapshot.travel_dates.start,
                travel_end: snapshot.travel_dates.end,
                destination: snapshot.destination,
                total_price: snapshot.total_price,
                deposit_due_date: snapshot.deposit_due_date,
                notes: Some(format!("Converted from quote {}", snapshot.quote_number)),
                created_by: actor.user_id,
            },
            booking_number.to_string(),
            now,
            today,
        )?;
        quote.mark_converted(booking.id(), now)?;

        let mut applied = self
            .ctx
            .commit(ChangeSet::new().with_booking(booking).with_quote(quote))
            .await?;
        Ok((
            committed(applied.take_booking(), "booking")?,
            committed(applied.take_quote(), "quote")?,
        ))
    }

    async fn load(&self, actor: &Actor, quote_id: QuoteId) -> ServiceResult<Quote> {
        self.ctx
            .store
            .get_quote(actor.tenant_id, quote_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Quote", quote_id))
    }

    async fn save(&self, quote: Quote) -> ServiceResult<Quote> {
        committed(self.ctx.commit(ChangeSet::new().with_quote(quote)).await?.take_quote(), "quote")
    }
}

