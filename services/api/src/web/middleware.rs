//! services/api/src/web/middleware.rs
//!
//! Request guards: bearer authentication, the administrator check, anti-forgery
//! tokens and per-client rate limits.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, Method},
    middleware::Next,
    response::Response,
};
use client_portal_core::{authorize, Principal, Requirement};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::web::csrf::CSRF_HEADER;
use crate::web::state::AppState;

//=========================================================================================
// Authentication
//=========================================================================================

/// Validates the `Authorization: Bearer` token and loads the caller.
///
/// If valid, inserts the caller's `Principal` into request extensions for handlers to use.
/// Deactivated accounts are refused with 403.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized("No token, authorization denied"))?;

    // 2. Resolve it to an active user
    let user = state.identity.authenticate(token).await.map_err(|e| {
        debug!("Bearer token rejected: {}", e);
        match e {
            client_portal_core::DomainError::Deactivated => ApiError::Domain(e),
            _ => ApiError::Unauthorized("Token is not valid"),
        }
    })?;

    // 3. Insert the principal into request extensions
    req.extensions_mut().insert(Principal {
        user_id: user.id,
        pan: user.pan,
        role: user.role,
    });

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

/// An authenticated caller that has passed the administrator check.
///
/// Extracting it runs `authorize(.., Requirement::Admin)` before the handler body.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(ApiError::Unauthorized("No token, authorization denied"))?;
        authorize(&principal, Requirement::Admin).into_result()?;
        Ok(AdminPrincipal(principal))
    }
}

//=========================================================================================
// Anti-forgery
//=========================================================================================

/// Rejects state-changing requests that do not echo a valid anti-forgery token.
pub async fn verify_csrf(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let safe = matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    if !safe {
        let valid = req
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|token| state.csrf.validate(token));
        if !valid {
            warn!("CSRF check failed for {} {}", req.method(), req.uri().path());
            return Err(ApiError::CsrfMismatch);
        }
    }
    Ok(next.run(req).await)
}

//=========================================================================================
// Rate limiting
//=========================================================================================

/// The socket peer, or the first `x-forwarded-for` hop when the proxy is
/// trusted. Requests with neither share one bucket.
fn client_key(req: &Request, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| req.headers().get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn global_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req, state.config.trust_proxy);
    if !state.global_limiter.check(&key) {
        warn!("Global rate limit exceeded for {}", key);
        return Err(ApiError::RateLimited(
            "Too many requests from this IP, please try again later.",
        ));
    }
    Ok(next.run(req).await)
}

/// The stricter budget for login, forgot-password and reset-password.
pub async fn auth_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req, state.config.trust_proxy);
    if !state.auth_limiter.check(&key) {
        warn!("Auth rate limit exceeded for {}", key);
        return Err(ApiError::RateLimited(
            "Too many attempts, please try again after 15 minutes.",
        ));
    }
    Ok(next.run(req).await)
}
