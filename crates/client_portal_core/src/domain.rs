//! crates/client_portal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the client portal.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant::new($kind, other)),
                }
            }
        }
    };
}

//=========================================================================================
// Identity
//=========================================================================================

/// Individuals (including HUFs) versus companies, LLPs and partnerships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Individual,
    Company,
}

string_enum!(UserType, "user type", {
    Individual => "individual",
    Company => "company",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

string_enum!(Role, "role", {
    User => "user",
    Admin => "admin",
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorDetails {
    pub name: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<String>,
    pub din: Option<String>,
}

/// Taxpayer profile fields. Which ones are populated depends on the `UserType`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
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
    pub director: Option<DirectorDetails>,
}

/// Profile fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
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
    pub director: Option<DirectorDetails>,
}

impl ProfilePatch {
    pub fn apply_to(self, profile: &mut Profile) {
        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        set(&mut profile.first_name, self.first_name);
        set(&mut profile.middle_name, self.middle_name);
        set(&mut profile.last_name, self.last_name);
        set(&mut profile.trade_name, self.trade_name);
        set(&mut profile.father_first_name, self.father_first_name);
        set(&mut profile.father_middle_name, self.father_middle_name);
        set(&mut profile.father_last_name, self.father_last_name);
        set(&mut profile.address, self.address);
        set(&mut profile.date_of_birth, self.date_of_birth);
        set(&mut profile.gst_number, self.gst_number);
        set(&mut profile.company_name, self.company_name);
        set(&mut profile.company_address, self.company_address);
        set(&mut profile.date_of_incorporation, self.date_of_incorporation);
        set(&mut profile.director, self.director);
    }
}

/// A one-time passcode waiting to be verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Otp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Only the SHA-256 of the emailed reset token is ever stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// A stored user record, including credentials. Never serialized as-is.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub user_type: UserType,
    pub email: String,
    pub mobile: String,
    pub pan: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub profile: Profile,
    pub otp: Option<Otp>,
    pub login_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub reset_token: Option<ResetToken>,
    pub last_login: Option<DateTime<Utc>>,
    pub deactivation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Person name for individuals, company name for companies.
    pub fn display_name(&self) -> String {
        display_name_of(
            self.user_type,
            self.profile.first_name.as_deref(),
            self.profile.last_name.as_deref(),
            self.profile.company_name.as_deref(),
        )
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.map(|until| until > now).unwrap_or(false)
    }
}

/// The name shown for a user: first and last name, or the company name.
pub fn display_name_of(
    user_type: UserType,
    first_name: Option<&str>,
    last_name: Option<&str>,
    company_name: Option<&str>,
) -> String {
    match user_type {
        UserType::Individual => [first_name, last_name]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        UserType::Company => company_name.unwrap_or_default().trim().to_string(),
    }
}

/// The data needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_type: UserType,
    pub email: String,
    pub mobile: String,
    pub pan: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
}

/// Filters for the administrative user listing.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub offset: i64,
    pub limit: i64,
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

//=========================================================================================
// Documents
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentCategory {
    IncomeTax,
    Gst,
}

string_enum!(DocumentCategory, "document category", {
    IncomeTax => "income-tax",
    Gst => "gst",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    View,
    Download,
}

string_enum!(AccessAction, "access action", {
    View => "view",
    Download => "download",
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub user_id: Uuid,
    pub action: AccessAction,
    pub timestamp: DateTime<Utc>,
}

/// Where an uploaded file's bytes live, plus what the uploader told us about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Opaque storage key handed out by the `FileStorage` port.
    pub key: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub financial_year: String,
    pub category: DocumentCategory,
    pub document_type: String,
    pub description: Option<String>,
    pub file: StoredFile,
    pub uploaded_by: Uuid,
    pub is_admin_upload: bool,
    pub upload_date: DateTime<Utc>,
    pub access_logs: Vec<AccessLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: Uuid,
    pub financial_year: String,
    pub category: DocumentCategory,
    pub document_type: String,
    pub description: Option<String>,
    pub file: StoredFile,
    pub uploaded_by: Uuid,
    pub is_admin_upload: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub user_id: Option<Uuid>,
    pub category: Option<DocumentCategory>,
    pub financial_year: Option<String>,
}

/// A single access-log entry flattened together with the document it belongs to.
#[derive(Debug, Clone)]
pub struct AccessLogRecord {
    pub document_id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    pub document_type: String,
    pub entry: AccessLogEntry,
}

#[derive(Debug, Clone, Default)]
pub struct AccessLogQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
}

//=========================================================================================
// Billing
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

string_enum!(BillStatus, "bill status", {
    Unpaid => "Unpaid",
    PartiallyPaid => "Partially Paid",
    Paid => "Paid",
});

#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub method: String,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillAttachment {
    pub file_name: String,
    pub file_key: String,
    pub uploaded_at: DateTime<Utc>,
}

/// An invoice issued to one user. Payments are kept in insertion order.
#[derive(Debug, Clone)]
pub struct Bill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub particulars: String,
    pub bill_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub payments: Vec<Payment>,
    pub attachment: Option<BillAttachment>,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBill {
    pub user_id: Uuid,
    pub particulars: String,
    pub bill_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub attachment: Option<BillAttachment>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub date: Option<DateTime<Utc>>,
    pub method: String,
    pub remark: Option<String>,
}

/// Partial overwrite of a single payment record.
#[derive(Debug, Clone, Default)]
pub struct PaymentPatch {
    pub amount: Option<Decimal>,
    pub date: Option<DateTime<Utc>>,
    pub method: Option<String>,
    pub remark: Option<String>,
}

/// Partial overwrite of a bill's top-level fields. The attachment is handled separately.
#[derive(Debug, Clone, Default)]
pub struct BillPatch {
    pub user_id: Option<Uuid>,
    pub particulars: Option<String>,
    pub bill_number: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BillQuery {
    pub user_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

/// Per-user total of unpaid amounts across every bill they own.
#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingBalance {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub outstanding: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_status_uses_display_labels() {
        assert_eq!(BillStatus::PartiallyPaid.as_str(), "Partially Paid");
        assert_eq!("Partially Paid".parse::<BillStatus>(), Ok(BillStatus::PartiallyPaid));
        assert!("partially paid".parse::<BillStatus>().is_err());
    }

    #[test]
    fn profile_patch_keeps_fields_it_does_not_mention() {
        let mut profile = Profile {
            first_name: Some("Asha".into()),
            address: Some("Old Street".into()),
            ..Profile::default()
        };
        ProfilePatch {
            address: Some("New Street".into()),
            ..ProfilePatch::default()
        }
        .apply_to(&mut profile);
        assert_eq!(profile.first_name.as_deref(), Some("Asha"));
        assert_eq!(profile.address.as_deref(), Some("New Street"));
    }

    #[test]
    fn company_display_name_ignores_person_fields() {
        assert_eq!(
            display_name_of(UserType::Company, Some("A"), Some("B"), Some("Acme LLP")),
            "Acme LLP"
        );
        assert_eq!(
            display_name_of(UserType::Individual, Some("Asha"), None, None),
            "Asha"
        );
    }

    #[test]
    fn category_parses_hyphenated_form() {
        assert_eq!("income-tax".parse::<DocumentCategory>(), Ok(DocumentCategory::IncomeTax));
        let err = "vat".parse::<DocumentCategory>().unwrap_err();
        assert_eq!(err.kind, "document category");
    }
}
