//! services/api/src/web/rest.rs
//!
//! The OpenAPI document for the portal and the router that serves it, the
//! `/api` routes and the uploaded files.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Router,
};
use client_portal_core::files::MAX_UPLOAD_BYTES;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::{ApiError, ApiResult};
use crate::services::billing::BILL_AREA;
use crate::web::csrf::CSRF_HEADER;
use crate::web::dto::{self, UPLOADS_PREFIX};
use crate::web::middleware::{auth_rate_limit, global_rate_limit, require_auth, verify_csrf};
use crate::web::state::AppState;
use crate::web::{admin, auth, billing, documents, profile};

//=========================================================================================
// OpenAPI Document
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::verify_otp_handler,
        auth::resend_otp_handler,
        auth::forgot_password_handler,
        auth::reset_password_handler,
        auth::csrf_token_handler,
        profile::get_profile_handler,
        profile::patch_profile_handler,
        profile::put_profile_handler,
        profile::list_profiles_handler,
        profile::create_profile_handler,
        profile::update_profile_handler,
        profile::activate_profile_handler,
        profile::deactivate_profile_handler,
        documents::list_documents_handler,
        documents::categories_handler,
        documents::upload_own_document_handler,
        documents::admin_upload_document_handler,
        documents::download_document_handler,
        documents::view_document_handler,
        documents::delete_document_handler,
        billing::list_bills_handler,
        billing::export_bills_handler,
        billing::get_bill_handler,
        billing::download_bill_handler,
        billing::create_bill_handler,
        billing::update_bill_handler,
        billing::add_payment_handler,
        billing::update_payment_handler,
        billing::delete_payment_handler,
        billing::delete_bill_handler,
        admin::stats_handler,
        admin::outstanding_handler,
        admin::list_users_handler,
        admin::user_detail_handler,
        admin::user_status_handler,
        admin::user_activity_handler,
        admin::deactivate_overdue_handler,
        admin::upload_user_document_handler,
        admin::user_documents_handler,
        admin::admin_categories_handler,
        admin::admin_delete_document_handler,
        admin::access_logs_handler,
        admin::overdue_bills_handler,
    ),
    components(
        schemas(
            dto::MessageResponse,
            dto::RegisterRequest,
            dto::LoginRequest,
            dto::VerifyOtpRequest,
            dto::ResendOtpRequest,
            dto::ForgotPasswordRequest,
            dto::ResetPasswordRequest,
            dto::SessionResponse,
            dto::CsrfTokenResponse,
            dto::UserView,
            dto::ProfileFields,
            dto::ProfileUpdateRequest,
            dto::CreateUserRequest,
            dto::AdminUserUpdateRequest,
            dto::UserStatusRequest,
            dto::UserMessageResponse,
            dto::DocumentView,
            dto::DocumentUploadResponse,
            dto::CategoryView,
            dto::CatalogView,
            dto::BillView,
            dto::PaymentRequest,
            dto::PaymentUpdateRequest,
            dto::OutstandingView,
            dto::StatsView,
            dto::UserPageView,
            dto::UserDetailView,
            dto::AccessLogLineView,
            dto::DeactivateOverdueRequest,
            dto::DeactivateOverdueResponse,
            dto::UserActivityView,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login, OTP and password reset."),
        (name = "profile", description = "Own profile and administrator account management."),
        (name = "documents", description = "Tax documents and their access log."),
        (name = "billing", description = "Bills, payments and statements."),
        (name = "admin", description = "Administrator dashboard.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// Router
//=========================================================================================

/// Builds the complete application: `/api` routes, stored files under `/uploads`
/// and the Swagger UI.
pub fn build_router(state: Arc<AppState>) -> ApiResult<Router> {
    // --- Authentication (no token, no anti-forgery check) ---
    let throttled_auth = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/auth/reset-password/{token}", put(auth::reset_password_handler))
        .route_layer(from_fn_with_state(state.clone(), auth_rate_limit));

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/verify-otp", post(auth::verify_otp_handler))
        .route("/auth/resend-otp", post(auth::resend_otp_handler))
        .route("/csrf-token", get(auth::csrf_token_handler))
        .merge(throttled_auth);

    // --- Everything else needs a bearer token and, when mutating, a CSRF token ---
    let protected_routes = Router::new()
        .route(
            "/profile",
            get(profile::get_profile_handler)
                .patch(profile::patch_profile_handler)
                .put(profile::put_profile_handler)
                .post(profile::create_profile_handler),
        )
        .route("/profile/all", get(profile::list_profiles_handler))
        .route("/profile/{id}", patch(profile::update_profile_handler))
        .route("/profile/{id}/activate", patch(profile::activate_profile_handler))
        .route("/profile/{id}/deactivate", patch(profile::deactivate_profile_handler))
        .route(
            "/documents",
            get(documents::list_documents_handler).post(documents::upload_own_document_handler),
        )
        .route("/documents/categories", get(documents::categories_handler))
        .route("/documents/upload", post(documents::admin_upload_document_handler))
        .route("/documents/{id}", axum::routing::delete(documents::delete_document_handler))
        .route("/documents/{id}/download", get(documents::download_document_handler))
        .route("/documents/{id}/view", get(documents::view_document_handler))
        .route(
            "/billing",
            get(billing::list_bills_handler).post(billing::create_bill_handler),
        )
        .route("/billing/export.csv", get(billing::export_bills_handler))
        .route(
            "/billing/{id}",
            get(billing::get_bill_handler)
                .patch(billing::update_bill_handler)
                .delete(billing::delete_bill_handler),
        )
        .route("/billing/{id}/download", get(billing::download_bill_handler))
        .route("/billing/{id}/payments", post(billing::add_payment_handler))
        .route(
            "/billing/{id}/payments/{payment_id}",
            patch(billing::update_payment_handler).delete(billing::delete_payment_handler),
        )
        .route("/admin/stats", get(admin::stats_handler))
        .route("/admin/outstanding", get(admin::outstanding_handler))
        .route("/admin/users", get(admin::list_users_handler))
        .route(
            "/admin/users/deactivate-overdue",
            post(admin::deactivate_overdue_handler),
        )
        .route("/admin/users/{id}", get(admin::user_detail_handler))
        .route("/admin/users/{id}/status", patch(admin::user_status_handler))
        .route("/admin/users/{id}/activity", get(admin::user_activity_handler))
        .route(
            "/admin/users/{id}/documents",
            get(admin::user_documents_handler).post(admin::upload_user_document_handler),
        )
        .route("/admin/document-categories", get(admin::admin_categories_handler))
        .route(
            "/admin/documents/{id}",
            axum::routing::delete(admin::admin_delete_document_handler),
        )
        .route("/admin/logs/documents", get(admin::access_logs_handler))
        .route("/admin/bills/overdue", get(admin::overdue_bills_handler))
        .route_layer(from_fn_with_state(state.clone(), verify_csrf))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(from_fn_with_state(state.clone(), global_rate_limit));

    // --- Cross-origin access for the web client ---
    let origin = state.config.frontend_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!(
            "FRONTEND_URL '{}' is not a valid origin: {}",
            state.config.frontend_url, e
        ))
    })?;
    let csrf_header = HeaderName::from_static(CSRF_HEADER);
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, csrf_header.clone()])
        .expose_headers([csrf_header]);

    let bill_dir = state.config.upload_dir.join(BILL_AREA);
    let app = Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .nest_service(&format!("{UPLOADS_PREFIX}/{BILL_AREA}"), ServeDir::new(bill_dir))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(cors);

    Ok(app)
}
