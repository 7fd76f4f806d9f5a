//! services/api/src/error.rs
//!
//! Every failure a handler or binary can return, and the JSON body and status
//! code each one becomes.

use crate::config::ConfigError;
use crate::validation::field_errors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use client_portal_core::{error::DomainError, ports::PortError};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad configuration: {0}")]
    Config(#[from] ConfigError),

    /// A rule of the portal rejected the request.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A store, storage or mail failure outside any domain rule.
    #[error("port failure: {0}")]
    Port(#[from] PortError),

    /// Connecting or migrating at startup.
    #[error("postgres: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Missing, malformed or expired bearer token.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("CSRF token validation failed")]
    CsrfMismatch,

    #[error("{0}")]
    RateLimited(&'static str),

    /// Malformed request payload (bad multipart, unparsable field, ...).
    #[error("{0}")]
    BadRequest(String),

    #[error("internal: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Domain(DomainError::Validation(field_errors(&errors)))
    }
}

fn message(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::DuplicateIdentity
        | DomainError::AgeRestriction
        | DomainError::InvalidOrExpiredOtp
        | DomainError::InvalidOrExpiredToken
        | DomainError::NoFile
        | DomainError::UnsupportedFile(_)
        | DomainError::MissingParticulars => StatusCode::BAD_REQUEST,
        DomainError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        DomainError::Deactivated | DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::DuplicateBillNumber => StatusCode::CONFLICT,
        DomainError::AccountLocked => StatusCode::LOCKED,
        DomainError::OtpCooldown => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Delivery | DomainError::Port(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(errors) => {
            let errors: Vec<_> = errors
                .iter()
                .map(|e| json!({ "field": e.field, "message": e.message }))
                .collect();
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Validation failed", "errors": errors })),
            )
                .into_response()
        }
        DomainError::Port(port) => port_response(port),
        other => message(domain_status(&other), other.to_string()),
    }
}

fn port_response(err: PortError) -> Response {
    match err {
        PortError::NotFound(what) => message(StatusCode::NOT_FOUND, format!("{what} not found")),
        PortError::Conflict(field) => {
            message(StatusCode::CONFLICT, format!("A record with this {field} already exists"))
        }
        PortError::Unauthorized => message(StatusCode::UNAUTHORIZED, "Unauthorized"),
        PortError::Unexpected(detail) => {
            error!("Unexpected port failure: {}", detail);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong!")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(err) => domain_response(err),
            ApiError::Port(err) => port_response(err),
            ApiError::Unauthorized(reason) => message(StatusCode::UNAUTHORIZED, reason),
            ApiError::CsrfMismatch => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "message": "CSRF token validation failed",
                    "code": "EBADCSRFTOKEN",
                })),
            )
                .into_response(),
            ApiError::RateLimited(reason) => message(StatusCode::TOO_MANY_REQUESTS, reason),
            ApiError::BadRequest(reason) => message(StatusCode::BAD_REQUEST, reason),
            other => {
                error!("Request failed: {}", other);
                message(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong!")
            }
        }
    }
}
