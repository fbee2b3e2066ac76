//! Gateway event model
//!
//! Gateways post JSON envelopes shaped like
//! `{ "id", "type", "created", "data": { "object": { .. } } }`. Only the
//! fields the reconciliation rules read are parsed; everything else is
//! ignored. Amounts arrive in minor units and are converted to [`Money`]
//! using the object's currency.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use core_kernel::{BookingId, Currency, InvoiceId, Money, TenantId};

use crate::error::ReconciliationError;

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";
pub const PAYMENT_CANCELED: &str = "payment_intent.canceled";
pub const CHARGE_REFUNDED: &str = "charge.refunded";
pub const DISPUTE_CREATED: &str = "charge.dispute.created";

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: RawData,
}

#[derive(Debug, Deserialize)]
struct RawData {
    object: RawObject,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawObject {
    id: Option<String>,
    amount: Option<i64>,
    amount_received: Option<i64>,
    amount_refunded: Option<i64>,
    currency: Option<String>,
    latest_charge: Option<String>,
    charge: Option<String>,
    payment_intent: Option<String>,
    last_payment_error: Option<RawPaymentError>,
    failure_message: Option<String>,
    reason: Option<String>,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPaymentError {
    message: Option<String>,
}

/// Document references the integration attached when creating the intent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub tenant_id: Option<TenantId>,
    pub invoice_id: Option<InvoiceId>,
    pub booking_id: Option<BookingId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    PaymentSucceeded {
        payment_intent_id: String,
        /// Charge id, or the intent id when the gateway omits the charge
        charge_id: String,
        amount: Money,
    },
    PaymentFailed {
        payment_intent_id: String,
        amount: Option<Money>,
        reason: String,
    },
    PaymentCanceled {
        payment_intent_id: String,
    },
    ChargeRefunded {
        charge_id: String,
        /// Cumulative amount refunded on the charge so far
        amount_refunded: Money,
        reason: Option<String>,
    },
    DisputeCreated {
        dispute_id: String,
        charge_id: String,
        amount: Money,
        reason: String,
    },
    /// Acknowledged and recorded, never applied
    Unsupported,
}

/// A verified, parsed gateway event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    pub id: String,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub kind: GatewayEventKind,
    pub metadata: EventMetadata,
}

impl GatewayEvent {
    /// Parses a raw webhook body
    pub fn parse(payload: &[u8]) -> Result<Self, ReconciliationError> {
        let raw: RawEvent =
            serde_json::from_slice(payload).map_err(|e| ReconciliationError::malformed(e.to_string()))?;

        if raw.id.trim().is_empty() {
            return Err(ReconciliationError::malformed("event id is empty"));
        }
        let created_at = Utc
            .timestamp_opt(raw.created, 0)
            .single()
            .ok_or_else(|| ReconciliationError::malformed(format!("invalid created timestamp {}", raw.created)))?;

        let object = raw.data.object;
        let metadata = parse_metadata(&object.metadata)?;
        let kind = parse_kind(&raw.id, &raw.event_type, object)?;

        Ok(Self {
            id: raw.id,
            event_type: raw.event_type,
            created_at,
            kind,
            metadata,
        })
    }

    /// Charge id used to look up an existing payment record
    pub fn charge_id(&self) -> Option<&str> {
        match &self.kind {
            GatewayEventKind::PaymentSucceeded { charge_id, .. }
            | GatewayEventKind::ChargeRefunded { charge_id, .. }
            | GatewayEventKind::DisputeCreated { charge_id, .. } => Some(charge_id),
            _ => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self.kind, GatewayEventKind::Unsupported)
    }
}

fn parse_kind(event_id: &str, event_type: &str, object: RawObject) -> Result<GatewayEventKind, ReconciliationError> {
    let missing = |reference: &'static str| ReconciliationError::MissingReference {
        event_id: event_id.to_string(),
        reference,
    };

    let kind = match event_type {
        PAYMENT_SUCCEEDED => {
            let payment_intent_id = object.id.ok_or_else(|| missing("object id"))?;
            let currency = parse_currency(object.currency.as_deref())?;
            let minor = object
                .amount_received
                .or(object.amount)
                .ok_or_else(|| missing("amount"))?;
            GatewayEventKind::PaymentSucceeded {
                charge_id: object
                    .latest_charge
                    .or(object.charge)
                    .unwrap_or_else(|| payment_intent_id.clone()),
                payment_intent_id,
                amount: positive_amount(minor, currency)?,
            }
        }
        PAYMENT_FAILED => {
            let amount = match (object.amount, object.currency.as_deref()) {
                (Some(minor), Some(code)) if minor > 0 => Some(Money::from_minor(minor, parse_currency(Some(code))?)),
                _ => None,
            };
            GatewayEventKind::PaymentFailed {
                payment_intent_id: object.id.ok_or_else(|| missing("object id"))?,
                amount,
                reason: object
                    .last_payment_error
                    .and_then(|e| e.message)
                    .or(object.failure_message)
                    .unwrap_or_else(|| "payment failed".to_string()),
            }
        }
        PAYMENT_CANCELED => GatewayEventKind::PaymentCanceled {
            payment_intent_id: object.id.ok_or_else(|| missing("object id"))?,
        },
        CHARGE_REFUNDED => {
            let currency = parse_currency(object.currency.as_deref())?;
            let minor = object.amount_refunded.ok_or_else(|| missing("amount_refunded"))?;
            GatewayEventKind::ChargeRefunded {
                charge_id: object.id.ok_or_else(|| missing("object id"))?,
                amount_refunded: positive_amount(minor, currency)?,
                reason: object.reason,
            }
        }
        DISPUTE_CREATED => {
            let currency = parse_currency(object.currency.as_deref())?;
            let minor = object.amount.ok_or_else(|| missing("amount"))?;
            GatewayEventKind::DisputeCreated {
                dispute_id: object.id.ok_or_else(|| missing("object id"))?,
                charge_id: object.charge.ok_or_else(|| missing("charge"))?,
                amount: positive_amount(minor, currency)?,
                reason: object.reason.unwrap_or_else(|| "unspecified".to_string()),
            }
        }
        _ => GatewayEventKind::Unsupported,
    };
    Ok(kind)
}

fn parse_currency(code: Option<&str>) -> Result<Currency, ReconciliationError> {
    let code = code.ok_or_else(|| ReconciliationError::malformed("currency is missing"))?;
    Currency::from_str(code).map_err(|e| ReconciliationError::malformed(e.to_string()))
}

fn positive_amount(minor: i64, currency: Currency) -> Result<Money, ReconciliationError> {
    if minor <= 0 {
        return Err(ReconciliationError::malformed(format!("amount must be positive, got {}", minor)));
    }
    Ok(Money::from_minor(minor, currency))
}

fn parse_metadata(raw: &HashMap<String, String>) -> Result<EventMetadata, ReconciliationError> {
    fn field<T: FromStr>(raw: &HashMap<String, String>, key: &str) -> Result<Option<T>, ReconciliationError> {
        match raw.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ReconciliationError::malformed(format!("metadata {} is not a valid id", key))),
            None => Ok(None),
        }
    }

    Ok(EventMetadata {
        tenant_id: field(raw, "tenant_id")?,
        invoice_id: field(raw, "invoice_id")?,
        booking_id: field(raw, "booking_id")?,
    })
}
