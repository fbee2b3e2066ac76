//! API error handling
//!
//! Every failure leaves the API as `{error, message, current_state?, details?}`
//! where `error` is the stable code the services classify errors into.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

use app_services::ServiceError;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error")]
    Validation(Vec<String>),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

fn service_status(code: &str) -> StatusCode {
    match code {
        "validation_error" => StatusCode::UNPROCESSABLE_ENTITY,
        "not_found" | "tenant_not_found" => StatusCode::NOT_FOUND,
        "invalid_state" | "conflict" => StatusCode::CONFLICT,
        "gateway_signature_invalid" => StatusCode::BAD_REQUEST,
        "gateway_error" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Service(e) => {
                let code = e.code();
                let status = service_status(code);
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %e, "Unhandled service error");
                    "Internal server error".to_string()
                } else {
                    e.to_string()
                };
                (
                    status,
                    ErrorResponse {
                        error: code.to_string(),
                        message,
                        current_state: e.current_state().map(str::to_string),
                        details: None,
                    },
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "bad_request".to_string(),
                    message: msg.clone(),
                    current_state: None,
                    details: None,
                },
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "unauthorized".to_string(),
                    message: "Unauthorized".to_string(),
                    current_state: None,
                    details: None,
                },
            ),
            ApiError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: "forbidden".to_string(),
                    message: msg.clone(),
                    current_state: None,
                    details: None,
                },
            ),
            ApiError::Validation(details) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "validation_error".to_string(),
                    message: "Request validation failed".to_string(),
                    current_state: None,
                    details: Some(details.clone()),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(p) => ApiError::Forbidden(format!("missing permission {}", p)),
            AuthError::InvalidToken | AuthError::TokenExpired => ApiError::Unauthorized,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect_validation_details("", &errors, &mut details);
        details.sort();
        ApiError::Validation(details)
    }
}

/// Flattens nested validation errors into `path: message` lines
fn collect_validation_details(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => out.extend(errs.iter().map(|e| match &e.message {
                Some(message) => format!("{}: {}", path, message),
                None => format!("{}: {}", path, e.code),
            })),
            ValidationErrorsKind::Struct(inner) => collect_validation_details(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_validation_details(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;
    use domain_quote::QuoteError;
    use domain_reconciliation::ReconciliationError;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_service_codes_map_to_statuses() {
        assert_eq!(
            status_of(ServiceError::validation("bad dates").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(ServiceError::not_found("Booking", "x").into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ServiceError::from(PortError::conflict("stale")).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::from(ReconciliationError::InvalidSignature("mismatch".into())).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::from(PortError::internal("boom")).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_state_keeps_current_state() {
        let err: ApiError = ServiceError::from(QuoteError::InvalidStateTransition {
            from: "draft".into(),
            to: "approved".into(),
        })
        .into();
        let ApiError::Service(inner) = &err else {
            panic!("expected a service error");
        };
        assert_eq!(inner.current_state(), Some("draft"));
        assert_eq!(status_of(err), StatusCode::CONFLICT);
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(status_of(AuthError::TokenExpired.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AuthError::MissingPermission("quote:write".into()).into()),
            StatusCode::FORBIDDEN
        );
    }
}
