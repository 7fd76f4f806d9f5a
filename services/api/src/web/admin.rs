//! services/api/src/web/admin.rs
//!
//! The administrator dashboard: statistics, user management, access logs and
//! overdue handling. Every handler here extracts `AdminPrincipal`.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use client_portal_core::domain::{AccessLogQuery, DocumentQuery};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::billing::bill_views;
use crate::web::documents::{catalog_view, created, upload_from_form, DOCUMENT_FIELD};
use crate::web::dto::{
    AccessLogLineView, AccessLogQueryParams, AdminUsersQuery, BillView, CatalogView,
    DeactivateOverdueRequest, DeactivateOverdueResponse, DocumentUploadResponse, DocumentView,
    MessageResponse, OutstandingView, StatsView, UserActivityView, UserDetailView,
    UserMessageResponse, UserPageView, UserStatusRequest, UserView,
};
use crate::web::middleware::AdminPrincipal;
use crate::web::state::AppState;
use crate::web::upload::{parse_timestamp, UploadForm};

const DEFAULT_PAGE_SIZE: i64 = 10;

/// A bare date as the end of a range covers the whole day.
fn range_end(value: &str) -> Result<DateTime<Utc>, ApiError> {
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .map(|t| t.and_utc())
            .ok_or_else(|| ApiError::BadRequest("Invalid endDate".to_string())),
        Err(_) => parse_timestamp(value, "endDate"),
    }
}

fn active_filter(status: Option<&str>) -> Option<bool> {
    match status {
        Some("active") => Some(true),
        Some("inactive") => Some(false),
        _ => None,
    }
}

//=========================================================================================
// Overview
//=========================================================================================

/// GET /admin/stats - Portal-wide counters
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    responses(
        (status = 200, description = "Counters", body = StatsView),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer" = []))
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
) -> Result<Json<StatsView>, ApiError> {
    Ok(Json(state.admin.stats().await?.into()))
}

/// GET /admin/outstanding - Unpaid totals per user
#[utoipa::path(
    get,
    path = "/api/admin/outstanding",
    tag = "admin",
    responses((status = 200, description = "Outstanding balances", body = [OutstandingView])),
    security(("bearer" = []))
)]
pub async fn outstanding_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<OutstandingView>>, ApiError> {
    let balances = state.billing.outstanding_by_user().await?;
    Ok(Json(balances.iter().map(OutstandingView::from).collect()))
}

//=========================================================================================
// Users
//=========================================================================================

/// GET /admin/users - Paginated, searchable user list, newest first
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    params(
        ("page" = Option<i64>, Query, description = "Page number, from 1"),
        ("limit" = Option<i64>, Query, description = "Page size, 1 to 100"),
        ("search" = Option<String>, Query, description = "Matches PAN, email, first, last or company name"),
        ("status" = Option<String>, Query, description = "active or inactive")
    ),
    responses((status = 200, description = "One page of users", body = UserPageView)),
    security(("bearer" = []))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Json<UserPageView>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let search = query.search.filter(|s| !s.trim().is_empty());

    let result = state
        .admin
        .users(page, limit, search, active_filter(query.status.as_deref()))
        .await?;

    Ok(Json(UserPageView {
        users: result.items.iter().map(UserView::for_admin).collect(),
        total_pages: (result.total + limit - 1) / limit,
        current_page: page,
        total: result.total,
    }))
}

/// GET /admin/users/{id} - A user with their documents and bills
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = UserDetailView),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn user_detail_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserDetailView>, ApiError> {
    let detail = state.admin.user_detail(user_id).await?;
    Ok(Json(UserDetailView {
        user: UserView::for_admin(&detail.user),
        documents: detail.documents.iter().map(DocumentView::from).collect(),
        billing: bill_views(&state, &detail.bills).await?,
    }))
}

/// PATCH /admin/users/{id}/status - Activate or deactivate with a reason
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/status",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = UserMessageResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn user_status_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserStatusRequest>,
) -> Result<Json<UserMessageResponse>, ApiError> {
    let user = state
        .profiles
        .set_active(user_id, req.is_active, req.reason)
        .await?;
    let verb = if req.is_active { "activated" } else { "deactivated" };
    Ok(Json(UserMessageResponse {
        message: format!("User {} successfully", verb),
        user: UserView::for_admin(&user),
    }))
}

/// GET /admin/users/{id}/activity - Last login, document access and billing totals
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/activity",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Activity summary", body = UserActivityView),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn user_activity_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserActivityView>, ApiError> {
    let activity = state.admin.activity(user_id).await?;
    Ok(Json(UserActivityView::from(&activity)))
}

/// POST /admin/users/deactivate-overdue - Deactivate owners of long-overdue bills
#[utoipa::path(
    post,
    path = "/api/admin/users/deactivate-overdue",
    tag = "admin",
    request_body = DeactivateOverdueRequest,
    responses((status = 200, description = "How many users were deactivated", body = DeactivateOverdueResponse)),
    security(("bearer" = []))
)]
pub async fn deactivate_overdue_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Json(req): Json<DeactivateOverdueRequest>,
) -> Result<Json<DeactivateOverdueResponse>, ApiError> {
    let count = state
        .admin
        .deactivate_overdue(req.days_overdue, Utc::now().date_naive())
        .await?;
    Ok(Json(DeactivateOverdueResponse {
        message: "Users deactivated successfully".to_string(),
        count,
    }))
}

//=========================================================================================
// Documents
//=========================================================================================

/// POST /admin/users/{id}/documents - Upload a document for this user
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/documents",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Owner id")),
    request_body(content_type = "multipart/form-data", description = "Fields category, documentType, financialYear, description and the file part `document`."),
    responses(
        (status = 201, description = "Stored", body = DocumentUploadResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn upload_user_document_handler(
    State(state): State<Arc<AppState>>,
    AdminPrincipal(admin): AdminPrincipal,
    Path(user_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart, DOCUMENT_FIELD).await?;
    let upload = upload_from_form(form, user_id)?;
    let document = state.documents.upload(&admin, upload, true).await?;
    Ok(created(&document))
}

/// GET /admin/users/{id}/documents - Every document of this user
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/documents",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Owner id")),
    responses((status = 200, description = "Documents, newest first", body = [DocumentView])),
    security(("bearer" = []))
)]
pub async fn user_documents_handler(
    State(state): State<Arc<AppState>>,
    AdminPrincipal(admin): AdminPrincipal,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<DocumentView>>, ApiError> {
    let documents = state
        .documents
        .list(
            &admin,
            DocumentQuery {
                user_id: Some(user_id),
                ..DocumentQuery::default()
            },
        )
        .await?;
    Ok(Json(documents.iter().map(DocumentView::from).collect()))
}

/// GET /admin/document-categories
#[utoipa::path(
    get,
    path = "/api/admin/document-categories",
    tag = "admin",
    responses((status = 200, description = "Document types per category", body = CatalogView)),
    security(("bearer" = []))
)]
pub async fn admin_categories_handler(
    _admin: AdminPrincipal,
) -> Json<CatalogView> {
    Json(catalog_view())
}

/// DELETE /admin/documents/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/documents/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Only admin uploads can be deleted"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer" = []))
)]
pub async fn admin_delete_document_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(document_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.documents.delete(document_id).await?;
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

/// GET /admin/logs/documents - Flattened document access log, newest first
#[utoipa::path(
    get,
    path = "/api/admin/logs/documents",
    tag = "admin",
    params(
        ("startDate" = Option<String>, Query, description = "From (RFC 3339 or YYYY-MM-DD)"),
        ("endDate" = Option<String>, Query, description = "To, inclusive (RFC 3339 or YYYY-MM-DD)"),
        ("userId" = Option<Uuid>, Query, description = "Only this accessing user")
    ),
    responses((status = 200, description = "Access log lines", body = [AccessLogLineView])),
    security(("bearer" = []))
)]
pub async fn access_logs_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Query(params): Query<AccessLogQueryParams>,
) -> Result<Json<Vec<AccessLogLineView>>, ApiError> {
    let query = AccessLogQuery {
        from: params
            .start_date
            .as_deref()
            .map(|v| parse_timestamp(v, "startDate"))
            .transpose()?,
        to: params.end_date.as_deref().map(range_end).transpose()?,
        user_id: params.user_id,
    };
    let lines = state.admin.access_logs(query).await?;
    Ok(Json(lines.iter().map(AccessLogLineView::from).collect()))
}

//=========================================================================================
// Bills
//=========================================================================================

/// GET /admin/bills/overdue - Unpaid bills past their due date, earliest first
#[utoipa::path(
    get,
    path = "/api/admin/bills/overdue",
    tag = "admin",
    responses((status = 200, description = "Overdue bills", body = [BillView])),
    security(("bearer" = []))
)]
pub async fn overdue_bills_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<BillView>>, ApiError> {
    let bills = state.admin.overdue_bills(Utc::now().date_naive()).await?;
    Ok(Json(bill_views(&state, &bills).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_only_knows_two_words() {
        assert_eq!(active_filter(Some("active")), Some(true));
        assert_eq!(active_filter(Some("inactive")), Some(false));
        assert_eq!(active_filter(Some("all")), None);
        assert_eq!(active_filter(None), None);
    }

    #[test]
    fn bare_end_date_covers_the_whole_day() {
        let end = range_end("2025-01-31").unwrap();
        assert_eq!(end.to_rfc3339(), "2025-01-31T23:59:59.999+00:00");
    }
}
