//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of the `DatabaseService` and `FileStorage` ports.
//! Selected with `DATABASE_URL=memory://` and used by the integration tests.
//! Nothing survives a restart.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use client_portal_core::domain::{
    AccessLogEntry, AccessLogQuery, AccessLogRecord, Bill, BillQuery, BillStatus, Document,
    DocumentQuery, NewBill, NewDocument, NewUser, OutstandingBalance, Page, Role, StoredFile,
    User, UserQuery,
};
use client_portal_core::files::stored_extension;
use client_portal_core::ports::{
    ByteStream, DatabaseService, FileStorage, PortError, PortResult,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Records are kept in insertion order; "newest first" listings walk them backwards.
#[derive(Default)]
struct Tables {
    users: Vec<User>,
    documents: Vec<Document>,
    bills: Vec<Bill>,
}

impl Tables {
    fn user_conflict(&self, candidate: &User) -> Option<&'static str> {
        self.users.iter().filter(|u| u.id != candidate.id).find_map(|u| {
            if u.email == candidate.email {
                Some("email")
            } else if u.mobile == candidate.mobile {
                Some("mobile")
            } else if u.pan == candidate.pan {
                Some("pan")
            } else {
                None
            }
        })
    }

    fn bill_number_taken(&self, bill_number: &str, except: Option<Uuid>) -> bool {
        self.bills
            .iter()
            .any(|b| b.bill_number == bill_number && Some(b.id) != except)
    }
}

#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(user: &User, needle: &str) -> bool {
    let profile = &user.profile;
    [
        Some(user.pan.as_str()),
        Some(user.email.as_str()),
        profile.first_name.as_deref(),
        profile.last_name.as_deref(),
        profile.company_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| value.to_lowercase().contains(needle))
}

#[async_trait]
impl DatabaseService for MemoryDatabase {
    // --- Users ---

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            user_type: user.user_type,
            email: user.email,
            mobile: user.mobile,
            pan: user.pan,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            profile: user.profile,
            otp: None,
            login_attempts: 0,
            lock_until: None,
            reset_token: None,
            last_login: None,
            deactivation_reason: None,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.write().await;
        if let Some(field) = tables.user_conflict(&record) {
            return Err(PortError::Conflict(field.to_string()));
        }
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn identity_taken(&self, email: &str, mobile: &str, pan: &str) -> PortResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .any(|u| u.email == email || u.mobile == mobile || u.pan == pan))
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {}", user_id)))
    }

    async fn get_user_by_pan(&self, pan: &str) -> PortResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .iter()
            .find(|u| u.pan == pan)
            .cloned()
            .ok_or_else(|| PortError::NotFound("User".to_string()))
    }

    async fn get_user_by_reset_token(&self, token_hash: &str) -> PortResult<User> {
        let now = Utc::now();
        let tables = self.tables.read().await;
        tables
            .users
            .iter()
            .find(|u| {
                u.reset_token
                    .as_ref()
                    .is_some_and(|t| t.token_hash == token_hash && t.expires_at > now)
            })
            .cloned()
            .ok_or_else(|| PortError::NotFound("Reset token".to_string()))
    }

    async fn save_user(&self, user: &User) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(field) = tables.user_conflict(user) {
            return Err(PortError::Conflict(field.to_string()));
        }
        let slot = tables
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| PortError::NotFound(format!("User {}", user.id)))?;
        *slot = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(slot.clone())
    }

    async fn list_users(&self, query: UserQuery) -> PortResult<Page<User>> {
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let tables = self.tables.read().await;
        let matching: Vec<&User> = tables
            .users
            .iter()
            .rev()
            .filter(|u| query.active.is_none_or(|active| u.is_active == active))
            .filter(|u| needle.as_deref().is_none_or(|n| matches_search(u, n)))
            .collect();
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn count_users(&self, active: Option<bool>) -> PortResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| active.is_none_or(|a| u.is_active == a))
            .count() as i64)
    }

    async fn set_users_active(&self, user_ids: &[Uuid], active: bool) -> PortResult<u64> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for user in tables.users.iter_mut().filter(|u| user_ids.contains(&u.id)) {
            user.is_active = active;
            user.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn admin_exists(&self) -> PortResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().any(|u| u.role == Role::Admin))
    }

    // --- Documents ---

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let now = Utc::now();
        let record = Document {
            id: Uuid::new_v4(),
            user_id: document.user_id,
            financial_year: document.financial_year,
            category: document.category,
            document_type: document.document_type,
            description: document.description,
            file: document.file,
            uploaded_by: document.uploaded_by,
            is_admin_upload: document.is_admin_upload,
            upload_date: now,
            access_logs: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.documents.push(record.clone());
        Ok(record)
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document> {
        let tables = self.tables.read().await;
        tables
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {}", document_id)))
    }

    async fn list_documents(&self, query: DocumentQuery) -> PortResult<Vec<Document>> {
        let tables = self.tables.read().await;
        Ok(tables
            .documents
            .iter()
            .rev()
            .filter(|d| query.user_id.is_none_or(|id| d.user_id == id))
            .filter(|d| query.category.is_none_or(|c| d.category == c))
            .filter(|d| {
                query
                    .financial_year
                    .as_deref()
                    .is_none_or(|fy| d.financial_year == fy)
            })
            .cloned()
            .collect())
    }

    async fn append_access_log(&self, document_id: Uuid, entry: AccessLogEntry) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let document = tables
            .documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| PortError::NotFound(format!("Document {}", document_id)))?;
        document.access_logs.push(entry);
        Ok(())
    }

    async fn list_access_logs(&self, query: AccessLogQuery) -> PortResult<Vec<AccessLogRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<AccessLogRecord> = tables
            .documents
            .iter()
            .flat_map(|d| {
                d.access_logs.iter().map(move |entry| AccessLogRecord {
                    document_id: d.id,
                    owner_id: d.user_id,
                    file_name: d.file.original_name.clone(),
                    document_type: d.document_type.clone(),
                    entry: entry.clone(),
                })
            })
            .filter(|r| query.from.is_none_or(|from| r.entry.timestamp >= from))
            .filter(|r| query.to.is_none_or(|to| r.entry.timestamp <= to))
            .filter(|r| query.user_id.is_none_or(|id| r.entry.user_id == id))
            .collect();
        records.sort_by(|a, b| b.entry.timestamp.cmp(&a.entry.timestamp));
        Ok(records)
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.documents.len();
        tables.documents.retain(|d| d.id != document_id);
        if tables.documents.len() == before {
            return Err(PortError::NotFound(format!("Document {}", document_id)));
        }
        Ok(())
    }

    async fn count_documents(&self) -> PortResult<i64> {
        Ok(self.tables.read().await.documents.len() as i64)
    }

    // --- Bills ---

    async fn create_bill(&self, bill: NewBill) -> PortResult<Bill> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        if tables.bill_number_taken(&bill.bill_number, None) {
            return Err(PortError::Conflict("bill_number".to_string()));
        }
        let record = Bill {
            id: Uuid::new_v4(),
            user_id: bill.user_id,
            particulars: bill.particulars,
            bill_number: bill.bill_number,
            amount: bill.amount,
            due_date: bill.due_date,
            status: BillStatus::Unpaid,
            payments: Vec::new(),
            attachment: bill.attachment,
            description: bill.description,
            created_by: bill.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.bills.push(record.clone());
        Ok(record)
    }

    async fn get_bill(&self, bill_id: Uuid) -> PortResult<Bill> {
        let tables = self.tables.read().await;
        tables
            .bills
            .iter()
            .find(|b| b.id == bill_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Bill {}", bill_id)))
    }

    async fn list_bills(&self, query: BillQuery) -> PortResult<Vec<Bill>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bills
            .iter()
            .rev()
            .filter(|b| query.user_id.is_none_or(|id| b.user_id == id))
            .filter(|b| query.created_from.is_none_or(|from| b.created_at >= from))
            .filter(|b| query.created_to.is_none_or(|to| b.created_at <= to))
            .cloned()
            .collect())
    }

    async fn save_bill(&self, bill: &Bill) -> PortResult<Bill> {
        let mut tables = self.tables.write().await;
        if tables.bill_number_taken(&bill.bill_number, Some(bill.id)) {
            return Err(PortError::Conflict("bill_number".to_string()));
        }
        let slot = tables
            .bills
            .iter_mut()
            .find(|b| b.id == bill.id)
            .ok_or_else(|| PortError::NotFound(format!("Bill {}", bill.id)))?;
        *slot = Bill {
            updated_at: Utc::now(),
            ..bill.clone()
        };
        Ok(slot.clone())
    }

    async fn delete_bill(&self, bill_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.bills.len();
        tables.bills.retain(|b| b.id != bill_id);
        if tables.bills.len() == before {
            return Err(PortError::NotFound(format!("Bill {}", bill_id)));
        }
        Ok(())
    }

    async fn count_bills(&self, status: Option<BillStatus>) -> PortResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .bills
            .iter()
            .filter(|b| status.is_none_or(|s| b.status == s))
            .count() as i64)
    }

    async fn overdue_bills(&self, due_before: NaiveDate) -> PortResult<Vec<Bill>> {
        let tables = self.tables.read().await;
        let mut bills: Vec<Bill> = tables
            .bills
            .iter()
            .filter(|b| b.status != BillStatus::Paid && b.due_date < due_before)
            .cloned()
            .collect();
        bills.sort_by_key(|b| b.due_date);
        Ok(bills)
    }

    async fn outstanding_by_user(&self) -> PortResult<Vec<OutstandingBalance>> {
        let tables = self.tables.read().await;
        let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
        for bill in &tables.bills {
            *totals.entry(bill.user_id).or_default() += bill.outstanding_amount();
        }
        let mut balances: Vec<OutstandingBalance> = tables
            .users
            .iter()
            .filter_map(|u| {
                totals.get(&u.id).map(|outstanding| OutstandingBalance {
                    user_id: u.id,
                    name: u.display_name(),
                    email: u.email.clone(),
                    outstanding: *outstanding,
                })
            })
            .collect();
        balances.sort_by(|a, b| b.outstanding.cmp(&a.outstanding));
        Ok(balances)
    }
}

//=========================================================================================
// In-Memory File Storage
//=========================================================================================

#[derive(Default)]
pub struct MemoryFileStorage {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.files.read().await.contains_key(key)
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn save(
        &self,
        area: &str,
        original_name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> PortResult<StoredFile> {
        let ext = stored_extension(mime_type)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let key = format!("{}/{}{}", area, Uuid::new_v4(), ext);
        let size = data.len() as i64;
        self.files.write().await.insert(key.clone(), data);
        Ok(StoredFile {
            key,
            original_name: original_name.to_string(),
            size,
            mime_type: mime_type.to_string(),
        })
    }

    async fn open(&self, key: &str) -> PortResult<ByteStream> {
        let data = self
            .files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::NotFound("File".to_string()))?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.files.write().await.remove(key);
        Ok(())
    }
}
