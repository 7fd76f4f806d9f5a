//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: registration, password login, OTP verification
//! and the password-reset flow. None of these require a bearer token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use client_portal_core::UserType;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::services::identity::{Registration, RESET_REQUESTED_MESSAGE};
use crate::web::csrf::CSRF_HEADER;
use crate::web::dto::{
    CsrfTokenResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
    ResendOtpRequest, ResetPasswordRequest, SessionResponse, VerifyOtpRequest,
};
use crate::web::state::AppState;

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new client account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = MessageResponse),
        (status = 400, description = "Validation failed, duplicate identity or under age"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Check the identity fields
    req.validate()?;

    // 2. Parse the account type
    let user_type = req
        .user_type
        .parse::<UserType>()
        .map_err(|_| ApiError::BadRequest("Invalid user type".to_string()))?;

    // 3. Assemble the profile; a nested `directorDetails` wins over the flat fields
    let flat_director = req.flat_director();
    let mut fields = req.profile;
    if fields.director_details.is_none() {
        fields.director_details = flat_director;
    }

    // 4. Register
    let user = state
        .identity
        .register(
            Registration {
                user_type,
                email: req.email,
                mobile: req.mobile,
                pan: req.pan,
                password: req.password,
                profile: fields.into_profile(),
            },
            Utc::now().date_naive(),
        )
        .await?;
    info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Registration successful! Please login.")),
    ))
}

/// POST /auth/login - Login with PAN and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 401, description = "Invalid PAN or password"),
        (status = 403, description = "Account is deactivated"),
        (status = 423, description = "Account is temporarily locked"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.identity.login(&req.pan, &req.password, Utc::now()).await?;
    Ok(Json(SessionResponse::new(session.token, &session.user)))
}

/// POST /auth/verify-otp - Exchange an emailed one-time passcode for a token
#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP accepted", body = SessionResponse),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 423, description = "Account is temporarily locked")
    )
)]
pub async fn verify_otp_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .identity
        .verify_otp(req.user_id, &req.otp, Utc::now())
        .await?;
    Ok(Json(SessionResponse::new(session.token, &session.user)))
}

/// POST /auth/resend-otp - Email a fresh one-time passcode
#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    tag = "auth",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "OTP sent", body = MessageResponse),
        (status = 404, description = "User not found"),
        (status = 429, description = "Requested again too soon")
    )
)]
pub async fn resend_otp_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.identity.resend_otp(req.user_id, Utc::now()).await?;
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

/// POST /auth/forgot-password - Email a password-reset link
///
/// Always answers with the same message so the existence of a PAN is not revealed.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Generic acknowledgement", body = MessageResponse)
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.identity.forgot_password(&req.pan, Utc::now()).await?;
    Ok(Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)))
}

/// PUT /auth/reset-password/{token} - Set a new password with an emailed token
#[utoipa::path(
    put,
    path = "/api/auth/reset-password/{token}",
    tag = "auth",
    request_body = ResetPasswordRequest,
    params(("token" = String, Path, description = "The raw token from the reset link")),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or weak password")
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    req.validate()?;
    state.identity.reset_password(&token, &req.password).await?;
    Ok(Json(MessageResponse::new("Password reset successful")))
}

/// GET /csrf-token - Issue an anti-forgery token
#[utoipa::path(
    get,
    path = "/api/csrf-token",
    tag = "auth",
    responses(
        (status = 200, description = "A token to echo in the x-csrf-token header", body = CsrfTokenResponse)
    )
)]
pub async fn csrf_token_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let token = state.csrf.issue();
    (
        [(CSRF_HEADER, token.clone())],
        Json(CsrfTokenResponse { csrf_token: token }),
    )
}
