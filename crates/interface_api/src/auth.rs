//! Authentication and authorization
//!
//! The bearer token is how a request resolves its tenant: `tenant_id` in the
//! claims scopes every document the request can reach.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use app_services::Actor;
use core_kernel::{TenantId, UserId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// The caller as the services see it
    pub fn actor(&self) -> Result<Actor, AuthError> {
        let tenant_id: TenantId = self.tenant_id.parse().map_err(|_| AuthError::InvalidToken)?;
        let user_id: UserId = self.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(Actor::new(tenant_id, user_id))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

/// Creates a new JWT token for a user of `tenant_id`
pub fn create_token(
    user_id: UserId,
    tenant_id: TenantId,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        tenant_id: tenant_id.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == "admin")
}

pub fn require_role(claims: &Claims, required_role: &str) -> Result<(), AuthError> {
    if has_role(claims, required_role) {
        Ok(())
    } else {
        Err(AuthError::MissingPermission(required_role.to_string()))
    }
}

/// Permission definitions
pub mod permissions {
    pub const QUOTE_READ: &str = "quote:read";
    pub const QUOTE_WRITE: &str = "quote:write";
    pub const BOOKING_READ: &str = "booking:read";
    pub const BOOKING_WRITE: &str = "booking:write";
    pub const PAYMENT_WRITE: &str = "payment:write";
    pub const PAYMENT_REFUND: &str = "payment:refund";
    pub const INVOICE_READ: &str = "invoice:read";
    pub const INVOICE_WRITE: &str = "invoice:write";
    pub const OPERATIONS: &str = "operations";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip_resolves_actor() {
        let user_id = UserId::new();
        let tenant_id = TenantId::new();
        let token = create_token(user_id, tenant_id, vec![permissions::QUOTE_READ.into()], SECRET, 60).unwrap();

        let claims = validate_token(&token, SECRET).unwrap();
        let actor = claims.actor().unwrap();
        assert_eq!(actor.tenant_id, tenant_id);
        assert_eq!(actor.user_id, user_id);
        assert!(has_role(&claims, permissions::QUOTE_READ));
        assert!(require_role(&claims, permissions::PAYMENT_REFUND).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(UserId::new(), TenantId::new(), vec![], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_admin_has_every_role() {
        let claims = Claims {
            sub: UserId::new().to_string(),
            tenant_id: TenantId::new().to_string(),
            roles: vec!["admin".into()],
            exp: 0,
            iat: 0,
        };
        assert!(has_role(&claims, permissions::INVOICE_WRITE));
    }

    #[test]
    fn test_malformed_tenant_claim_rejected() {
        let claims = Claims {
            sub: UserId::new().to_string(),
            tenant_id: "acme".into(),
            roles: vec![],
            exp: 0,
            iat: 0,
        };
        assert!(claims.actor().is_err());
    }
}
