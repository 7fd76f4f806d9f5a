//! services/api/src/web/profile.rs
//!
//! Self-service profile endpoints and the administrator's account management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use client_portal_core::{Principal, Role, UserType};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::services::profiles::{AccountChanges, NewAccount};
use crate::web::dto::{
    AdminUserUpdateRequest, CreateUserRequest, MessageResponse, ProfileFields,
    ProfileUpdateRequest, UserMessageResponse, UserView, SELF_PATCH_KEYS,
};
use crate::web::middleware::AdminPrincipal;
use crate::web::state::AppState;

fn parse_user_type(value: &str) -> Result<UserType, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user type".to_string()))
}

fn parse_role(value: &str) -> Result<Role, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid role".to_string()))
}

//=========================================================================================
// Self-service
//=========================================================================================

/// GET /profile - The caller's own profile
#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "profile",
    responses(
        (status = 200, description = "The caller's profile", body = UserView),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserView>, ApiError> {
    let user = state.profiles.get(principal.user_id).await?;
    Ok(Json(UserView::from(&user)))
}

/// PATCH /profile - Edit name parts, trade name, address and director details
///
/// Any other key in the body rejects the whole request.
#[utoipa::path(
    patch,
    path = "/api/profile",
    tag = "profile",
    request_body = ProfileFields,
    responses(
        (status = 200, description = "Updated profile", body = UserView),
        (status = 400, description = "Invalid updates")
    ),
    security(("bearer" = []))
)]
pub async fn patch_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<Value>,
) -> Result<Json<UserView>, ApiError> {
    // 1. Only whitelisted keys are allowed
    let invalid = || ApiError::BadRequest("Invalid updates".to_string());
    let keys = body.as_object().ok_or_else(invalid)?;
    if !keys.keys().all(|k| SELF_PATCH_KEYS.contains(&k.as_str())) {
        return Err(invalid());
    }

    // 2. Apply them
    let fields: ProfileFields = serde_json::from_value(body).map_err(|_| invalid())?;
    let user = state
        .profiles
        .patch_own(principal.user_id, fields.into_patch())
        .await?;
    Ok(Json(UserView::from(&user)))
}

/// PUT /profile - Broader self-service edit; email and PAN stay unchanged
#[utoipa::path(
    put,
    path = "/api/profile",
    tag = "profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserView),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer" = []))
)]
pub async fn put_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<UserView>, ApiError> {
    req.validate()?;
    let user = state
        .profiles
        .update_own(
            principal.user_id,
            AccountChanges {
                mobile: req.mobile,
                profile: req.profile.into_patch(),
                ..AccountChanges::default()
            },
        )
        .await?;
    Ok(Json(UserView::from(&user)))
}

//=========================================================================================
// Administration
//=========================================================================================

/// GET /profile/all - Every account
#[utoipa::path(
    get,
    path = "/api/profile/all",
    tag = "profile",
    responses(
        (status = 200, description = "All users", body = [UserView]),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer" = []))
)]
pub async fn list_profiles_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = state.profiles.list_all().await?;
    Ok(Json(users.iter().map(UserView::for_admin).collect()))
}

/// POST /profile - Create an account directly, optionally as an administrator
#[utoipa::path(
    post,
    path = "/api/profile",
    tag = "profile",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserMessageResponse),
        (status = 400, description = "Validation failed or duplicate identity"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer" = []))
)]
pub async fn create_profile_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let account = NewAccount {
        user_type: parse_user_type(&req.user_type)?,
        email: req.email,
        mobile: req.mobile,
        pan: req.pan,
        password: req.password,
        role: req.role.as_deref().map(parse_role).transpose()?.unwrap_or(Role::User),
        profile: req.profile.into_profile(),
    };
    let user = state
        .profiles
        .create_account(account, Utc::now().date_naive())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UserMessageResponse {
            message: "User created successfully".to_string(),
            user: UserView::for_admin(&user),
        }),
    ))
}

/// PATCH /profile/{id} - Overwrite any account field, including the password
#[utoipa::path(
    patch,
    path = "/api/profile/{id}",
    tag = "profile",
    request_body = AdminUserUpdateRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Updated user", body = UserView),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdminUserUpdateRequest>,
) -> Result<Json<UserView>, ApiError> {
    req.validate()?;
    let changes = AccountChanges {
        email: req.email,
        mobile: req.mobile,
        pan: req.pan,
        password: req.password,
        role: req.role.as_deref().map(parse_role).transpose()?,
        user_type: req.user_type.as_deref().map(parse_user_type).transpose()?,
        is_active: req.is_active,
        profile: req.profile.into_patch(),
    };
    let user = state.profiles.admin_update(user_id, changes).await?;
    Ok(Json(UserView::for_admin(&user)))
}

/// PATCH /profile/{id}/activate
#[utoipa::path(
    patch,
    path = "/api/profile/{id}/activate",
    tag = "profile",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User activated", body = MessageResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn activate_profile_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.profiles.set_active(user_id, true, None).await?;
    Ok(Json(MessageResponse::new("User activated successfully")))
}

/// PATCH /profile/{id}/deactivate
#[utoipa::path(
    patch,
    path = "/api/profile/{id}/deactivate",
    tag = "profile",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated", body = MessageResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn deactivate_profile_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.profiles.set_active(user_id, false, None).await?;
    Ok(Json(MessageResponse::new("User deactivated successfully")))
}
