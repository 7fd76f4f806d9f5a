//! crates/client_portal_core/src/ports.rs
//!
//! What the portal needs from the outside world: a record store, a place for
//! uploaded bytes and a way to send mail. Adapters in the api service fill these in.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AccessLogEntry, AccessLogQuery, AccessLogRecord, Bill, BillQuery, BillStatus, Document,
    DocumentQuery, NewBill, NewDocument, NewUser, OutstandingBalance, Page, StoredFile, User,
    UserQuery,
};

//=========================================================================================
// Port Errors
//=========================================================================================

/// How an adapter reports failure, independent of Postgres, disk or the mail relay.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("{0} not found")]
    NotFound(String),
    /// A unique constraint was violated; carries the name of the clashing field.
    #[error("Conflict on {0}")]
    Conflict(String),
    #[error("{0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

pub type PortResult<T> = Result<T, PortError>;

/// Chunks of a stored file, read lazily.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, PortError>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for users, documents and bills.
///
/// Every write is atomic per record; nothing spans records.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    /// True when any existing user already holds one of the identity fields.
    async fn identity_taken(&self, email: &str, mobile: &str, pan: &str) -> PortResult<bool>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_pan(&self, pan: &str) -> PortResult<User>;

    /// Finds the user holding an unexpired reset token with the given hash.
    async fn get_user_by_reset_token(&self, token_hash: &str) -> PortResult<User>;

    /// Overwrites every mutable field of the stored user.
    async fn save_user(&self, user: &User) -> PortResult<User>;

    async fn list_users(&self, query: UserQuery) -> PortResult<Page<User>>;

    async fn count_users(&self, active: Option<bool>) -> PortResult<i64>;

    /// Sets the active flag on every listed user, returning how many were changed.
    async fn set_users_active(&self, user_ids: &[Uuid], active: bool) -> PortResult<u64>;

    async fn admin_exists(&self) -> PortResult<bool>;

    // --- Documents ---
    async fn create_document(&self, document: NewDocument) -> PortResult<Document>;

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document>;

    /// Matching documents, newest first.
    async fn list_documents(&self, query: DocumentQuery) -> PortResult<Vec<Document>>;

    async fn append_access_log(&self, document_id: Uuid, entry: AccessLogEntry) -> PortResult<()>;

    async fn list_access_logs(&self, query: AccessLogQuery) -> PortResult<Vec<AccessLogRecord>>;

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()>;

    async fn count_documents(&self) -> PortResult<i64>;

    // --- Bills ---
    async fn create_bill(&self, bill: NewBill) -> PortResult<Bill>;

    async fn get_bill(&self, bill_id: Uuid) -> PortResult<Bill>;

    /// Matching bills, newest first.
    async fn list_bills(&self, query: BillQuery) -> PortResult<Vec<Bill>>;

    /// Overwrites the bill's fields and replaces its payment list.
    async fn save_bill(&self, bill: &Bill) -> PortResult<Bill>;

    async fn delete_bill(&self, bill_id: Uuid) -> PortResult<()>;

    async fn count_bills(&self, status: Option<BillStatus>) -> PortResult<i64>;

    /// Bills not yet `Paid` whose due date is strictly before `due_before`, earliest first.
    async fn overdue_bills(&self, due_before: NaiveDate) -> PortResult<Vec<Bill>>;

    async fn outstanding_by_user(&self) -> PortResult<Vec<OutstandingBalance>>;
}

/// Binary storage for uploaded documents and bill attachments.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores `data` under a freshly generated key inside `area`.
    async fn save(&self, area: &str, original_name: &str, mime_type: &str, data: Bytes)
        -> PortResult<StoredFile>;

    async fn open(&self, key: &str) -> PortResult<ByteStream>;

    /// Removes the file if present. A missing file is not an error.
    async fn remove(&self, key: &str) -> PortResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait EmailService: Send + Sync {
    /// Delivers one message or reports why it could not be delivered.
    async fn send(&self, message: EmailMessage) -> PortResult<()>;
}
