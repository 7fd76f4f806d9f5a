//! services/api/src/web/dto.rs
//!
//! JSON payloads and views exchanged over the REST API. Keys are camelCase.

use chrono::{DateTime, NaiveDate, Utc};
use client_portal_core::domain::{
    AccessLogEntry, Bill, BillAttachment, DirectorDetails, Document, OutstandingBalance, Payment,
    Profile, ProfilePatch, User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::services::admin::{
    AccessLogLine, BillingSummary, DocumentAccessSummary, PortalStats, UserActivity,
};
use crate::validation::{mobile_format, pan_format};

/// Public path prefix under which bill attachments are served.
pub const UPLOADS_PREFIX: &str = "/uploads";

fn file_url(key: &str) -> String {
    format!("{}/{}", UPLOADS_PREFIX, key)
}

/// Documents are only reachable through the checked, logged view route.
fn document_url(document_id: Uuid) -> String {
    format!("/api/documents/{}/view", document_id)
}

//=========================================================================================
// Shared
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectorDto {
    pub name: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<String>,
    pub din: Option<String>,
}

impl From<DirectorDto> for DirectorDetails {
    fn from(d: DirectorDto) -> Self {
        DirectorDetails {
            name: d.name,
            pan: d.pan,
            aadhar: d.aadhar,
            din: d.din,
        }
    }
}

impl From<&DirectorDetails> for DirectorDto {
    fn from(d: &DirectorDetails) -> Self {
        DirectorDto {
            name: d.name.clone(),
            pan: d.pan.clone(),
            aadhar: d.aadhar.clone(),
            din: d.din.clone(),
        }
    }
}

/// Every editable profile field. Flattened into the requests that carry them.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub trade_name: Option<String>,
    pub father_first_name: Option<String>,
    pub father_middle_name: Option<String>,
    pub father_last_name: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gst_number: Option<String>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub date_of_incorporation: Option<NaiveDate>,
    pub director_details: Option<DirectorDto>,
}

impl ProfileFields {
    pub fn into_patch(self) -> ProfilePatch {
        ProfilePatch {
            first_name: self.first_name,
            middle_name: self.middle_name,
            last_name: self.last_name,
            trade_name: self.trade_name,
            father_first_name: self.father_first_name,
            father_middle_name: self.father_middle_name,
            father_last_name: self.father_last_name,
            address: self.address,
            date_of_birth: self.date_of_birth,
            gst_number: self.gst_number,
            company_name: self.company_name,
            company_address: self.company_address,
            date_of_incorporation: self.date_of_incorporation,
            director: self.director_details.map(Into::into),
        }
    }

    pub fn into_profile(self) -> Profile {
        let mut profile = Profile::default();
        self.into_patch().apply_to(&mut profile);
        profile
    }
}

/// The keys `PATCH /profile` accepts; anything else is refused.
pub const SELF_PATCH_KEYS: &[&str] = &[
    "firstName",
    "middleName",
    "lastName",
    "tradeName",
    "fatherFirstName",
    "fatherMiddleName",
    "fatherLastName",
    "address",
    "directorDetails",
];

//=========================================================================================
// Auth
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_type: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(custom(function = "mobile_format", message = "Invalid mobile number"))]
    pub mobile: String,
    #[validate(custom(function = "pan_format", message = "Invalid PAN format"))]
    pub pan: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub director_name: Option<String>,
    pub director_pan: Option<String>,
    pub director_aadhar: Option<String>,
    pub director_din: Option<String>,
}

impl RegisterRequest {
    /// Flat `directorName`/`directorPan`/... fields, used when no `directorDetails` object is sent.
    pub fn flat_director(&self) -> Option<DirectorDto> {
        let any = self.director_name.is_some()
            || self.director_pan.is_some()
            || self.director_aadhar.is_some()
            || self.director_din.is_some();
        any.then(|| DirectorDto {
            name: self.director_name.clone(),
            pan: self.director_pan.clone(),
            aadhar: self.director_aadhar.clone(),
            din: self.director_din.clone(),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub pan: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub user_id: Uuid,
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub pan: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub pan: String,
    pub email: String,
    pub user_type: String,
    pub role: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: SessionUser,
}

impl SessionResponse {
    pub fn new(token: String, user: &User) -> Self {
        Self {
            token,
            user: SessionUser {
                id: user.id,
                pan: user.pan.clone(),
                email: user.email.clone(),
                user_type: user.user_type.to_string(),
                role: user.role.to_string(),
                name: user.display_name(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

//=========================================================================================
// Users
//=========================================================================================

/// A user with credentials, OTP and reset token stripped.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub user_type: String,
    pub email: String,
    pub mobile: String,
    pub pan: String,
    pub role: String,
    pub is_active: bool,
    pub name: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub trade_name: Option<String>,
    pub father_first_name: Option<String>,
    pub father_middle_name: Option<String>,
    pub father_last_name: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gst_number: Option<String>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub date_of_incorporation: Option<NaiveDate>,
    pub director_details: Option<DirectorDto>,
    pub last_login: Option<DateTime<Utc>>,
    pub deactivation_reason: Option<String>,
    /// Only present in administrator views.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_attempts: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        let p = &user.profile;
        Self {
            id: user.id,
            user_type: user.user_type.to_string(),
            email: user.email.clone(),
            mobile: user.mobile.clone(),
            pan: user.pan.clone(),
            role: user.role.to_string(),
            is_active: user.is_active,
            name: user.display_name(),
            first_name: p.first_name.clone(),
            middle_name: p.middle_name.clone(),
            last_name: p.last_name.clone(),
            trade_name: p.trade_name.clone(),
            father_first_name: p.father_first_name.clone(),
            father_middle_name: p.father_middle_name.clone(),
            father_last_name: p.father_last_name.clone(),
            address: p.address.clone(),
            date_of_birth: p.date_of_birth,
            gst_number: p.gst_number.clone(),
            company_name: p.company_name.clone(),
            company_address: p.company_address.clone(),
            date_of_incorporation: p.date_of_incorporation,
            director_details: p.director.as_ref().map(DirectorDto::from),
            last_login: user.last_login,
            deactivation_reason: user.deactivation_reason.clone(),
            login_attempts: None,
            lock_until: None,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl UserView {
    /// Adds the lockout counters administrators may see.
    pub fn for_admin(user: &User) -> Self {
        Self {
            login_attempts: Some(user.login_attempts),
            lock_until: user.lock_until,
            ..Self::from(user)
        }
    }
}

/// `PUT /profile`: the broad self-service edit. `email` and `pan` are ignored if sent.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[validate(custom(function = "mobile_format", message = "Invalid mobile number"))]
    pub mobile: Option<String>,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_type: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(custom(function = "mobile_format", message = "Invalid mobile number"))]
    pub mobile: String,
    #[validate(custom(function = "pan_format", message = "Invalid PAN format"))]
    pub pan: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdateRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: Option<String>,
    #[validate(custom(function = "mobile_format", message = "Invalid mobile number"))]
    pub mobile: Option<String>,
    #[validate(custom(function = "pan_format", message = "Invalid PAN format"))]
    pub pan: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: Option<String>,
    pub user_type: Option<String>,
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusRequest {
    pub is_active: bool,
    pub reason: Option<String>,
}

/// A confirmation message together with the affected user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserMessageResponse {
    pub message: String,
    pub user: UserView,
}

//=========================================================================================
// Documents
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogView {
    pub user_id: Uuid,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&AccessLogEntry> for AccessLogView {
    fn from(entry: &AccessLogEntry) -> Self {
        Self {
            user_id: entry.user_id,
            action: entry.action.to_string(),
            timestamp: entry.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub financial_year: String,
    pub category: String,
    pub document_type: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub file_url: String,
    pub uploaded_by: Uuid,
    pub is_admin_upload: bool,
    pub upload_date: DateTime<Utc>,
    pub access_logs: Vec<AccessLogView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Document> for DocumentView {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id,
            user_id: d.user_id,
            financial_year: d.financial_year.clone(),
            category: d.category.to_string(),
            document_type: d.document_type.clone(),
            description: d.description.clone(),
            file_name: d.file.original_name.clone(),
            file_size: d.file.size,
            mime_type: d.file.mime_type.clone(),
            file_url: document_url(d.id),
            uploaded_by: d.uploaded_by,
            is_admin_upload: d.is_admin_upload,
            upload_date: d.upload_date,
            access_logs: d.access_logs.iter().map(AccessLogView::from).collect(),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentUploadResponse {
    pub message: String,
    pub document: DocumentView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryView {
    pub name: String,
    pub types: Vec<String>,
}

/// The document catalog keyed by category (`income-tax`, `gst`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CatalogView(pub BTreeMap<String, CategoryView>);

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListQuery {
    pub user_id: Option<Uuid>,
    pub category: Option<String>,
    pub financial_year: Option<String>,
}

//=========================================================================================
// Billing
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: Uuid,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub payment_method: String,
    pub remark: Option<String>,
}

impl From<&Payment> for PaymentView {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id,
            amount: p.amount,
            date: p.date,
            payment_method: p.method.clone(),
            remark: p.remark.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillFileView {
    pub file_name: String,
    pub file_url: String,
    pub upload_date: DateTime<Utc>,
}

impl From<&BillAttachment> for BillFileView {
    fn from(a: &BillAttachment) -> Self {
        Self {
            file_name: a.file_name.clone(),
            file_url: file_url(&a.file_key),
            upload_date: a.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillOwnerView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub pan: String,
    pub mobile: String,
}

impl From<&User> for BillOwnerView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.display_name(),
            email: u.email.clone(),
            pan: u.pan.clone(),
            mobile: u.mobile.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user: Option<BillOwnerView>,
    pub particulars: String,
    pub bill_number: String,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: String,
    pub payments: Vec<PaymentView>,
    pub bill_file: Option<BillFileView>,
    pub description: Option<String>,
    pub created_by: Uuid,
    #[schema(value_type = f64)]
    pub outstanding_amount: Decimal,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillView {
    pub fn new(bill: &Bill, owner: Option<&User>, today: NaiveDate) -> Self {
        Self {
            id: bill.id,
            user_id: bill.user_id,
            user: owner.map(BillOwnerView::from),
            particulars: bill.particulars.clone(),
            bill_number: bill.bill_number.clone(),
            amount: bill.amount,
            due_date: bill.due_date,
            status: bill.status.to_string(),
            payments: bill.payments.iter().map(PaymentView::from).collect(),
            bill_file: bill.attachment.as_ref().map(BillFileView::from),
            description: bill.description.clone(),
            created_by: bill.created_by,
            outstanding_amount: bill.outstanding_amount(),
            is_overdue: bill.is_overdue(today),
            created_at: bill.created_at,
            updated_at: bill.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillListQuery {
    pub user_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[schema(value_type = f64)]
    pub amount: Decimal,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; defaults to now.
    pub date: Option<String>,
    pub payment_method: String,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdateRequest {
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
    pub date: Option<String>,
    pub payment_method: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingView {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[schema(value_type = f64)]
    pub outstanding: Decimal,
}

impl From<&OutstandingBalance> for OutstandingView {
    fn from(o: &OutstandingBalance) -> Self {
        Self {
            user_id: o.user_id,
            name: o.name.clone(),
            email: o.email.clone(),
            outstanding: o.outstanding,
        }
    }
}

//=========================================================================================
// Admin
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_users: i64,
    pub active_users: i64,
    pub total_documents: i64,
    pub total_bills: i64,
    pub pending_bills: i64,
}

impl From<PortalStats> for StatsView {
    fn from(s: PortalStats) -> Self {
        Self {
            total_users: s.total_users,
            active_users: s.active_users,
            total_documents: s.total_documents,
            total_bills: s.total_bills,
            pending_bills: s.pending_bills,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    /// `active` or `inactive`; anything else means both.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPageView {
    pub users: Vec<UserView>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDetailView {
    pub user: UserView,
    pub documents: Vec<DocumentView>,
    pub billing: Vec<BillView>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogQueryParams {
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (the whole day is included).
    pub end_date: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogLineView {
    pub document_id: Uuid,
    pub document_name: String,
    pub document_type: String,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub user_pan: Option<String>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&AccessLogLine> for AccessLogLineView {
    fn from(line: &AccessLogLine) -> Self {
        let record = &line.record;
        Self {
            document_id: record.document_id,
            document_name: record.file_name.clone(),
            document_type: record.document_type.clone(),
            user_id: record.entry.user_id,
            user_name: line.user.as_ref().map(User::display_name),
            user_pan: line.user.as_ref().map(|u| u.pan.clone()),
            action: record.entry.action.to_string(),
            timestamp: record.entry.timestamp,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateOverdueRequest {
    pub days_overdue: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeactivateOverdueResponse {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAccessView {
    pub total_views: u64,
    pub total_downloads: u64,
    pub last_access: Option<DateTime<Utc>>,
}

impl From<&DocumentAccessSummary> for DocumentAccessView {
    fn from(s: &DocumentAccessSummary) -> Self {
        Self {
            total_views: s.total_views,
            total_downloads: s.total_downloads,
            last_access: s.last_access,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummaryView {
    pub total_bills: u64,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    #[schema(value_type = f64)]
    pub paid_amount: Decimal,
}

impl From<&BillingSummary> for BillingSummaryView {
    fn from(s: &BillingSummary) -> Self {
        Self {
            total_bills: s.total_bills,
            total_amount: s.total_amount,
            paid_amount: s.paid_amount,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityView {
    pub last_login: Option<DateTime<Utc>>,
    pub document_access: DocumentAccessView,
    pub billing_summary: BillingSummaryView,
}

impl From<&UserActivity> for UserActivityView {
    fn from(a: &UserActivity) -> Self {
        Self {
            last_login: a.last_login,
            document_access: DocumentAccessView::from(&a.document_access),
            billing_summary: BillingSummaryView::from(&a.billing_summary),
        }
    }
}
