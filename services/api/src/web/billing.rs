//! services/api/src/web/billing.rs
//!
//! Bill and payment endpoints. Reads are open to owners; writes need an administrator.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use client_portal_core::domain::{BillPatch, NewPayment, PaymentPatch};
use client_portal_core::{Bill, Principal};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::billing::{BillDraft, BillFilter};
use crate::web::documents::file_response;
use crate::web::dto::{
    BillListQuery, BillView, MessageResponse, PaymentRequest, PaymentUpdateRequest,
};
use crate::web::middleware::AdminPrincipal;
use crate::web::state::AppState;
use crate::web::upload::{parse_timestamp, UploadForm};

/// Multipart part carrying the bill PDF.
pub const BILL_FILE_FIELD: &str = "billFile";

/// Renders bills with their owners attached.
pub(crate) async fn bill_views(state: &AppState, bills: &[Bill]) -> Result<Vec<BillView>, ApiError> {
    let owners = state.billing.owners(bills).await?;
    let today = Utc::now().date_naive();
    Ok(bills
        .iter()
        .map(|bill| BillView::new(bill, owners.get(&bill.user_id), today))
        .collect())
}

async fn bill_view(state: &AppState, bill: Bill) -> Result<Json<BillView>, ApiError> {
    let mut views = bill_views(state, std::slice::from_ref(&bill)).await?;
    views
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::Internal("bill view missing".to_string()))
}

fn filter_from(query: BillListQuery) -> BillFilter {
    BillFilter {
        user_id: query.user_id,
        from_date: query.from_date,
        to_date: query.to_date,
    }
}

//=========================================================================================
// Reads
//=========================================================================================

/// GET /billing - Visible bills, newest first
#[utoipa::path(
    get,
    path = "/api/billing",
    tag = "billing",
    params(
        ("userId" = Option<Uuid>, Query, description = "Owner filter (admins only)"),
        ("fromDate" = Option<String>, Query, description = "Created on or after (YYYY-MM-DD)"),
        ("toDate" = Option<String>, Query, description = "Created on or before (YYYY-MM-DD)")
    ),
    responses((status = 200, description = "Bills", body = [BillView])),
    security(("bearer" = []))
)]
pub async fn list_bills_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<BillListQuery>,
) -> Result<Json<Vec<BillView>>, ApiError> {
    let bills = state.billing.list(&principal, filter_from(query)).await?;
    Ok(Json(bill_views(&state, &bills).await?))
}

/// GET /billing/export.csv - Statement of the visible bills
#[utoipa::path(
    get,
    path = "/api/billing/export.csv",
    tag = "billing",
    params(
        ("userId" = Option<Uuid>, Query, description = "Owner filter (admins only)"),
        ("fromDate" = Option<String>, Query, description = "Created on or after (YYYY-MM-DD)"),
        ("toDate" = Option<String>, Query, description = "Created on or before (YYYY-MM-DD)")
    ),
    responses((status = 200, description = "CSV statement", content_type = "text/csv", body = String)),
    security(("bearer" = []))
)]
pub async fn export_bills_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<BillListQuery>,
) -> Result<Response, ApiError> {
    let csv = state.billing.export_csv(&principal, filter_from(query)).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"bills.csv\""),
        ],
        csv,
    )
        .into_response())
}

/// GET /billing/{id}
#[utoipa::path(
    get,
    path = "/api/billing/{id}",
    tag = "billing",
    params(("id" = Uuid, Path, description = "Bill id")),
    responses(
        (status = 200, description = "The bill", body = BillView),
        (status = 404, description = "Bill not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_bill_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<BillView>, ApiError> {
    let bill = state.billing.get(&principal, bill_id).await?;
    bill_view(&state, bill).await
}

/// GET /billing/{id}/download - The attached PDF
#[utoipa::path(
    get,
    path = "/api/billing/{id}/download",
    tag = "billing",
    params(("id" = Uuid, Path, description = "Bill id")),
    responses(
        (status = 200, description = "PDF bytes", content_type = "application/pdf"),
        (status = 404, description = "Bill not found or nothing attached")
    ),
    security(("bearer" = []))
)]
pub async fn download_bill_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(bill_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (attachment, stream) = state.billing.open_attachment(&principal, bill_id).await?;
    Ok(file_response(
        stream,
        &attachment.file_name,
        "application/pdf",
        "attachment",
    ))
}

//=========================================================================================
// Writes
//=========================================================================================

/// POST /billing - Issue a bill, optionally with a PDF
#[utoipa::path(
    post,
    path = "/api/billing",
    tag = "billing",
    request_body(content_type = "multipart/form-data", description = "Fields userId, particulars, billNumber, amount, dueDate, description and the optional file part `billFile`."),
    responses(
        (status = 201, description = "Created", body = BillView),
        (status = 400, description = "Missing or invalid field"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Bill number already used")
    ),
    security(("bearer" = []))
)]
pub async fn create_bill_handler(
    State(state): State<Arc<AppState>>,
    AdminPrincipal(admin): AdminPrincipal,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart, BILL_FILE_FIELD).await?;
    let draft = BillDraft {
        user_id: form.parse_required("userId")?,
        particulars: form.text("particulars").unwrap_or_default(),
        bill_number: form.require("billNumber")?,
        amount: form.parse_required::<Decimal>("amount")?,
        due_date: form.parse_required("dueDate")?,
        description: form.text("description"),
        attachment: form.file,
    };
    let bill = state.billing.create(&admin, draft, Utc::now()).await?;
    let view = bill_view(&state, bill).await?;
    Ok((StatusCode::CREATED, view))
}

/// PATCH /billing/{id} - Overwrite bill fields and optionally replace the PDF
#[utoipa::path(
    patch,
    path = "/api/billing/{id}",
    tag = "billing",
    params(("id" = Uuid, Path, description = "Bill id")),
    request_body(content_type = "multipart/form-data", description = "Any of userId, particulars, billNumber, amount, dueDate, description and the file part `billFile`."),
    responses(
        (status = 200, description = "Updated", body = BillView),
        (status = 404, description = "Bill not found"),
        (status = 409, description = "Bill number already used")
    ),
    security(("bearer" = []))
)]
pub async fn update_bill_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(bill_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<BillView>, ApiError> {
    let form = UploadForm::read(multipart, BILL_FILE_FIELD).await?;
    let patch = BillPatch {
        user_id: form.parse("userId")?,
        particulars: form.text("particulars"),
        bill_number: form.text("billNumber"),
        amount: form.parse::<Decimal>("amount")?,
        due_date: form.parse("dueDate")?,
        description: form.text("description"),
    };
    let bill = state
        .billing
        .update(bill_id, patch, form.file, Utc::now())
        .await?;
    bill_view(&state, bill).await
}

/// POST /billing/{id}/payments - Record a payment and re-derive the status
#[utoipa::path(
    post,
    path = "/api/billing/{id}/payments",
    tag = "billing",
    params(("id" = Uuid, Path, description = "Bill id")),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "The bill with the new payment", body = BillView),
        (status = 400, description = "Invalid amount or date"),
        (status = 404, description = "Bill not found")
    ),
    security(("bearer" = []))
)]
pub async fn add_payment_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(bill_id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<BillView>, ApiError> {
    let payment = NewPayment {
        amount: req.amount,
        date: req
            .date
            .as_deref()
            .map(|d| parse_timestamp(d, "date"))
            .transpose()?,
        method: req.payment_method,
        remark: req.remark,
    };
    let bill = state.billing.add_payment(bill_id, payment, Utc::now()).await?;
    bill_view(&state, bill).await
}

/// PATCH /billing/{id}/payments/{paymentId}
#[utoipa::path(
    patch,
    path = "/api/billing/{id}/payments/{paymentId}",
    tag = "billing",
    params(
        ("id" = Uuid, Path, description = "Bill id"),
        ("paymentId" = Uuid, Path, description = "Payment id")
    ),
    request_body = PaymentUpdateRequest,
    responses(
        (status = 200, description = "The bill after the edit", body = BillView),
        (status = 404, description = "Bill or payment not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_payment_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path((bill_id, payment_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<PaymentUpdateRequest>,
) -> Result<Json<BillView>, ApiError> {
    let patch = PaymentPatch {
        amount: req.amount,
        date: req
            .date
            .as_deref()
            .map(|d| parse_timestamp(d, "date"))
            .transpose()?,
        method: req.payment_method,
        remark: req.remark,
    };
    let bill = state
        .billing
        .update_payment(bill_id, payment_id, patch)
        .await?;
    bill_view(&state, bill).await
}

/// DELETE /billing/{id}/payments/{paymentId}
#[utoipa::path(
    delete,
    path = "/api/billing/{id}/payments/{paymentId}",
    tag = "billing",
    params(
        ("id" = Uuid, Path, description = "Bill id"),
        ("paymentId" = Uuid, Path, description = "Payment id")
    ),
    responses(
        (status = 200, description = "The bill after the removal", body = BillView),
        (status = 404, description = "Bill or payment not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_payment_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path((bill_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BillView>, ApiError> {
    let bill = state.billing.delete_payment(bill_id, payment_id).await?;
    bill_view(&state, bill).await
}

/// DELETE /billing/{id} - Remove the bill and its PDF
#[utoipa::path(
    delete,
    path = "/api/billing/{id}",
    tag = "billing",
    params(("id" = Uuid, Path, description = "Bill id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Bill not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_bill_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.billing.delete(bill_id).await?;
    Ok(Json(MessageResponse::new("Bill deleted successfully")))
}
