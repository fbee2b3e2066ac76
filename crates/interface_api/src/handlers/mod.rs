//! Request handlers

pub mod quotes;
pub mod bookings;
pub mod invoices;
pub mod webhooks;
pub mod operations;
pub mod health;

use app_services::Actor;

use crate::auth::{require_role, Claims};
use crate::error::ApiError;

/// Checks `permission` and resolves the calling tenant and user
pub(crate) fn authorize(claims: &Claims, permission: &str) -> Result<Actor, ApiError> {
    require_role(claims, permission)?;
    Ok(claims.actor()?)
}
