//! services/api/src/web/documents.rs
//!
//! Document upload, listing, viewing and deletion.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use client_portal_core::{
    catalog::document_catalog, AccessAction, ByteStream, Document, DocumentCategory, DomainError,
    Principal,
};
use client_portal_core::domain::DocumentQuery;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::documents::DocumentUpload;
use crate::web::dto::{
    CatalogView, CategoryView, DocumentListQuery, DocumentUploadResponse, DocumentView,
    MessageResponse,
};
use crate::web::middleware::AdminPrincipal;
use crate::web::state::AppState;
use crate::web::upload::UploadForm;

/// Multipart part carrying the document file.
pub const DOCUMENT_FIELD: &str = "document";

pub(crate) fn parse_category(value: &str) -> Result<DocumentCategory, ApiError> {
    value
        .parse()
        .map_err(|_| DomainError::invalid("category", "Invalid document category").into())
}

/// Streams stored bytes back with the given disposition (`inline` or `attachment`).
pub(crate) fn file_response(
    stream: ByteStream,
    file_name: &str,
    mime_type: &str,
    disposition: &str,
) -> Response {
    let safe_name: String = file_name
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    let content_disposition = HeaderValue::from_str(&format!(
        "{}; filename=\"{}\"",
        disposition, safe_name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

pub(crate) fn catalog_view() -> CatalogView {
    CatalogView(
        document_catalog()
            .iter()
            .map(|spec| {
                let view = CategoryView {
                    name: spec.name.to_string(),
                    types: spec.types.iter().map(|t| t.to_string()).collect(),
                };
                (spec.category.to_string(), view)
            })
            .collect(),
    )
}

/// Maps the document form fields; `owner_id` is decided by the route.
pub(crate) fn upload_from_form(form: UploadForm, owner_id: Uuid) -> Result<DocumentUpload, ApiError> {
    Ok(DocumentUpload {
        owner_id,
        category: parse_category(&form.require("category")?)?,
        document_type: form.require("documentType")?,
        financial_year: form.require("financialYear")?,
        description: form.text("description"),
        file: form.file,
    })
}

pub(crate) fn created(document: &Document) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(DocumentUploadResponse {
            message: "Document uploaded successfully".to_string(),
            document: DocumentView::from(document),
        }),
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /documents - The caller's documents; admins may pass `userId`
#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "documents",
    params(
        ("userId" = Option<Uuid>, Query, description = "Owner filter (admins only)"),
        ("category" = Option<String>, Query, description = "income-tax or gst"),
        ("financialYear" = Option<String>, Query, description = "e.g. 2024-25")
    ),
    responses((status = 200, description = "Matching documents, newest first", body = [DocumentView])),
    security(("bearer" = []))
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Vec<DocumentView>>, ApiError> {
    let query = DocumentQuery {
        user_id: query.user_id,
        category: query.category.as_deref().map(parse_category).transpose()?,
        financial_year: query.financial_year,
    };
    let documents = state.documents.list(&principal, query).await?;
    Ok(Json(documents.iter().map(DocumentView::from).collect()))
}

/// GET /documents/categories - The static document catalog
#[utoipa::path(
    get,
    path = "/api/documents/categories",
    tag = "documents",
    responses((status = 200, description = "Document types per category", body = CatalogView)),
    security(("bearer" = []))
)]
pub async fn categories_handler() -> Json<CatalogView> {
    Json(catalog_view())
}

/// POST /documents - Upload one of the caller's own documents
#[utoipa::path(
    post,
    path = "/api/documents",
    tag = "documents",
    request_body(content_type = "multipart/form-data", description = "Fields category, documentType, financialYear, description and the file part `document`."),
    responses(
        (status = 201, description = "Stored", body = DocumentUploadResponse),
        (status = 400, description = "Missing file, unsupported type or bad field")
    ),
    security(("bearer" = []))
)]
pub async fn upload_own_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart, DOCUMENT_FIELD).await?;
    let upload = upload_from_form(form, principal.user_id)?;
    let document = state.documents.upload(&principal, upload, false).await?;
    Ok(created(&document))
}

/// POST /documents/upload - Upload a document for any user
#[utoipa::path(
    post,
    path = "/api/documents/upload",
    tag = "documents",
    request_body(content_type = "multipart/form-data", description = "Fields userId, category, documentType, financialYear, description and the file part `document`."),
    responses(
        (status = 201, description = "Stored", body = DocumentUploadResponse),
        (status = 400, description = "Missing file, unsupported type or bad field"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn admin_upload_document_handler(
    State(state): State<Arc<AppState>>,
    AdminPrincipal(admin): AdminPrincipal,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart, DOCUMENT_FIELD).await?;
    let owner_id: Uuid = form.parse_required("userId")?;
    let upload = upload_from_form(form, owner_id)?;
    let document = state.documents.upload(&admin, upload, true).await?;
    Ok(created(&document))
}

async fn open_document(
    state: &AppState,
    principal: &Principal,
    document_id: Uuid,
    action: AccessAction,
) -> Result<Response, ApiError> {
    let (document, stream) = state
        .documents
        .open(principal, document_id, action, Utc::now())
        .await?;
    let disposition = match action {
        AccessAction::View => "inline",
        AccessAction::Download => "attachment",
    };
    Ok(file_response(
        stream,
        &document.file.original_name,
        &document.file.mime_type,
        disposition,
    ))
}

/// GET /documents/{id}/download - Download the file; the access is logged
#[utoipa::path(
    get,
    path = "/api/documents/{id}/download",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "File bytes as an attachment"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer" = []))
)]
pub async fn download_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(document_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    open_document(&state, &principal, document_id, AccessAction::Download).await
}

/// GET /documents/{id}/view - Show the file inline; the access is logged
#[utoipa::path(
    get,
    path = "/api/documents/{id}/view",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "File bytes for inline display"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer" = []))
)]
pub async fn view_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(document_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    open_document(&state, &principal, document_id, AccessAction::View).await
}

/// DELETE /documents/{id} - Remove an administrator-uploaded document and its file
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not an admin, or the document was not uploaded by one"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminPrincipal,
    Path(document_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.documents.delete(document_id).await?;
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}
