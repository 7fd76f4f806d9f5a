//! services/api/src/adapters/db.rs
//!
//! Postgres-backed `DatabaseService`. Users, documents and bills live in their own
//! tables; access-log entries and payments are child rows loaded alongside them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use client_portal_core::domain::{
    display_name_of, AccessLogEntry, AccessLogQuery, AccessLogRecord, Bill, BillAttachment,
    BillQuery, BillStatus, DirectorDetails, Document, DocumentQuery, NewBill, NewDocument,
    NewUser, Otp, OutstandingBalance, Page, Payment, Profile, ResetToken, StoredFile, User,
    UserQuery, UserType,
};
use client_portal_core::ports::{DatabaseService, PortError, PortResult};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Adapter
//=========================================================================================

#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies `migrations/` in order; safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps `RowNotFound` to `NotFound(what)` and everything else to `Unexpected`.
fn not_found(what: impl Display) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        _ => unexpected(e),
    }
}

/// Turns unique-constraint violations into `Conflict` naming the clashing column.
fn conflict_or_unexpected(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let field = db_err
                .constraint()
                .map(|c| {
                    c.trim_start_matches("users_")
                        .trim_start_matches("bills_")
                        .trim_end_matches("_key")
                        .to_string()
                })
                .unwrap_or_else(|| "unique field".to_string());
            return PortError::Conflict(field);
        }
    }
    unexpected(e)
}

fn parse_column<T>(value: &str) -> PortResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| PortError::Unexpected(format!("corrupt row: {e}")))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    user_type: String,
    email: String,
    mobile: String,
    pan: String,
    password_hash: String,
    role: String,
    is_active: bool,
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    trade_name: Option<String>,
    father_first_name: Option<String>,
    father_middle_name: Option<String>,
    father_last_name: Option<String>,
    address: Option<String>,
    date_of_birth: Option<NaiveDate>,
    gst_number: Option<String>,
    company_name: Option<String>,
    company_address: Option<String>,
    date_of_incorporation: Option<NaiveDate>,
    director_name: Option<String>,
    director_pan: Option<String>,
    director_aadhar: Option<String>,
    director_din: Option<String>,
    otp_code: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
    login_attempts: i32,
    lock_until: Option<DateTime<Utc>>,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    deactivation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let director = if self.director_name.is_some()
            || self.director_pan.is_some()
            || self.director_aadhar.is_some()
            || self.director_din.is_some()
        {
            Some(DirectorDetails {
                name: self.director_name,
                pan: self.director_pan,
                aadhar: self.director_aadhar,
                din: self.director_din,
            })
        } else {
            None
        };
        let otp = match (self.otp_code, self.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some(Otp { code, expires_at }),
            _ => None,
        };
        let reset_token = match (self.reset_token_hash, self.reset_token_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(ResetToken {
                token_hash,
                expires_at,
            }),
            _ => None,
        };
        Ok(User {
            id: self.id,
            user_type: parse_column(&self.user_type)?,
            email: self.email,
            mobile: self.mobile,
            pan: self.pan,
            password_hash: self.password_hash,
            role: parse_column(&self.role)?,
            is_active: self.is_active,
            profile: Profile {
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
                director,
            },
            otp,
            login_attempts: self.login_attempts,
            lock_until: self.lock_until,
            reset_token,
            last_login: self.last_login,
            deactivation_reason: self.deactivation_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    financial_year: String,
    category: String,
    document_type: String,
    description: Option<String>,
    file_key: String,
    file_name: String,
    file_size: i64,
    mime_type: String,
    uploaded_by: Uuid,
    is_admin_upload: bool,
    upload_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    fn to_domain(self, access_logs: Vec<AccessLogEntry>) -> PortResult<Document> {
        Ok(Document {
            id: self.id,
            user_id: self.user_id,
            financial_year: self.financial_year,
            category: parse_column(&self.category)?,
            document_type: self.document_type,
            description: self.description,
            file: StoredFile {
                key: self.file_key,
                original_name: self.file_name,
                size: self.file_size,
                mime_type: self.mime_type,
            },
            uploaded_by: self.uploaded_by,
            is_admin_upload: self.is_admin_upload,
            upload_date: self.upload_date,
            access_logs,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AccessLogRow {
    document_id: Uuid,
    user_id: Uuid,
    action: String,
    accessed_at: DateTime<Utc>,
}

impl AccessLogRow {
    fn to_domain(&self) -> PortResult<AccessLogEntry> {
        Ok(AccessLogEntry {
            user_id: self.user_id,
            action: parse_column(&self.action)?,
            timestamp: self.accessed_at,
        })
    }
}

#[derive(FromRow)]
struct AccessLogJoinRow {
    document_id: Uuid,
    owner_id: Uuid,
    file_name: String,
    document_type: String,
    user_id: Uuid,
    action: String,
    accessed_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct BillRecord {
    id: Uuid,
    user_id: Uuid,
    particulars: String,
    bill_number: String,
    amount: Decimal,
    due_date: NaiveDate,
    status: String,
    attachment_name: Option<String>,
    attachment_key: Option<String>,
    attachment_uploaded_at: Option<DateTime<Utc>>,
    description: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BillRecord {
    fn to_domain(self, payments: Vec<Payment>) -> PortResult<Bill> {
        let attachment = match (
            self.attachment_name,
            self.attachment_key,
            self.attachment_uploaded_at,
        ) {
            (Some(file_name), Some(file_key), Some(uploaded_at)) => Some(BillAttachment {
                file_name,
                file_key,
                uploaded_at,
            }),
            _ => None,
        };
        Ok(Bill {
            id: self.id,
            user_id: self.user_id,
            particulars: self.particulars,
            bill_number: self.bill_number,
            amount: self.amount,
            due_date: self.due_date,
            status: parse_column(&self.status)?,
            payments,
            attachment,
            description: self.description,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRecord {
    id: Uuid,
    bill_id: Uuid,
    amount: Decimal,
    paid_at: DateTime<Utc>,
    method: String,
    remark: Option<String>,
}

impl PaymentRecord {
    fn to_domain(self) -> Payment {
        Payment {
            id: self.id,
            amount: self.amount,
            date: self.paid_at,
            method: self.method,
            remark: self.remark,
        }
    }
}

#[derive(FromRow)]
struct OutstandingRecord {
    user_id: Uuid,
    user_type: String,
    first_name: Option<String>,
    last_name: Option<String>,
    company_name: Option<String>,
    email: String,
    outstanding: Decimal,
}

//=========================================================================================
// Query Helpers
//=========================================================================================

const USER_SEARCH_COLUMNS: [&str; 5] = ["pan", "email", "first_name", "last_name", "company_name"];

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    qb.push(" WHERE TRUE");
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!(
            "%{}%",
            search
                .trim()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        qb.push(" AND (");
        for (i, column) in USER_SEARCH_COLUMNS.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }
    if let Some(active) = query.active {
        qb.push(" AND is_active = ").push_bind(active);
    }
}

impl DbAdapter {
    async fn access_logs_for(&self, ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<AccessLogEntry>>> {
        let rows = sqlx::query_as::<_, AccessLogRow>(
            "SELECT document_id, user_id, action, accessed_at FROM document_access_logs \
             WHERE document_id = ANY($1) ORDER BY id ASC",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<Uuid, Vec<AccessLogEntry>> = HashMap::new();
        for row in rows {
            let entry = row.to_domain()?;
            grouped.entry(row.document_id).or_default().push(entry);
        }
        Ok(grouped)
    }

    async fn documents_with_logs(&self, records: Vec<DocumentRecord>) -> PortResult<Vec<Document>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut logs = self.access_logs_for(&ids).await?;
        records
            .into_iter()
            .map(|r| {
                let entries = logs.remove(&r.id).unwrap_or_default();
                r.to_domain(entries)
            })
            .collect()
    }

    async fn payments_for(&self, ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<Payment>>> {
        let rows = sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, bill_id, amount, paid_at, method, remark FROM bill_payments \
             WHERE bill_id = ANY($1) ORDER BY position ASC",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<Uuid, Vec<Payment>> = HashMap::new();
        for row in rows {
            grouped.entry(row.bill_id).or_default().push(row.to_domain());
        }
        Ok(grouped)
    }

    async fn bills_with_payments(&self, records: Vec<BillRecord>) -> PortResult<Vec<Bill>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut payments = self.payments_for(&ids).await?;
        records
            .into_iter()
            .map(|r| {
                let list = payments.remove(&r.id).unwrap_or_default();
                r.to_domain(list)
            })
            .collect()
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Users ---

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let director = user.profile.director.clone().unwrap_or_default();
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (
                id, user_type, email, mobile, pan, password_hash, role, is_active,
                first_name, middle_name, last_name, trade_name,
                father_first_name, father_middle_name, father_last_name,
                address, date_of_birth, gst_number,
                company_name, company_address, date_of_incorporation,
                director_name, director_pan, director_aadhar, director_din
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, TRUE,
                $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24
            ) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user.user_type.as_str())
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(&user.pan)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.profile.first_name)
        .bind(&user.profile.middle_name)
        .bind(&user.profile.last_name)
        .bind(&user.profile.trade_name)
        .bind(&user.profile.father_first_name)
        .bind(&user.profile.father_middle_name)
        .bind(&user.profile.father_last_name)
        .bind(&user.profile.address)
        .bind(user.profile.date_of_birth)
        .bind(&user.profile.gst_number)
        .bind(&user.profile.company_name)
        .bind(&user.profile.company_address)
        .bind(user.profile.date_of_incorporation)
        .bind(&director.name)
        .bind(&director.pan)
        .bind(&director.aadhar)
        .bind(&director.din)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?;
        record.to_domain()
    }

    async fn identity_taken(&self, email: &str, mobile: &str, pan: &str) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 OR mobile = $2 OR pan = $3)",
        )
        .bind(email)
        .bind(mobile)
        .bind(pan)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("User {}", user_id)))?
            .to_domain()
    }

    async fn get_user_by_pan(&self, pan: &str) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE pan = $1")
            .bind(pan)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("User"))?
            .to_domain()
    }

    async fn get_user_by_reset_token(&self, token_hash: &str) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT * FROM users WHERE reset_token_hash = $1 AND reset_token_expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Reset token"))?
        .to_domain()
    }

    async fn save_user(&self, user: &User) -> PortResult<User> {
        let director = user.profile.director.clone().unwrap_or_default();
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET
                user_type = $2, email = $3, mobile = $4, pan = $5, password_hash = $6,
                role = $7, is_active = $8,
                first_name = $9, middle_name = $10, last_name = $11, trade_name = $12,
                father_first_name = $13, father_middle_name = $14, father_last_name = $15,
                address = $16, date_of_birth = $17, gst_number = $18,
                company_name = $19, company_address = $20, date_of_incorporation = $21,
                director_name = $22, director_pan = $23, director_aadhar = $24, director_din = $25,
                otp_code = $26, otp_expires_at = $27, login_attempts = $28, lock_until = $29,
                reset_token_hash = $30, reset_token_expires_at = $31, last_login = $32,
                deactivation_reason = $33, updated_at = NOW()
            WHERE id = $1
            RETURNING *",
        )
        .bind(user.id)
        .bind(user.user_type.as_str())
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(&user.pan)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&user.profile.first_name)
        .bind(&user.profile.middle_name)
        .bind(&user.profile.last_name)
        .bind(&user.profile.trade_name)
        .bind(&user.profile.father_first_name)
        .bind(&user.profile.father_middle_name)
        .bind(&user.profile.father_last_name)
        .bind(&user.profile.address)
        .bind(user.profile.date_of_birth)
        .bind(&user.profile.gst_number)
        .bind(&user.profile.company_name)
        .bind(&user.profile.company_address)
        .bind(user.profile.date_of_incorporation)
        .bind(&director.name)
        .bind(&director.pan)
        .bind(&director.aadhar)
        .bind(&director.din)
        .bind(user.otp.as_ref().map(|o| o.code.clone()))
        .bind(user.otp.as_ref().map(|o| o.expires_at))
        .bind(user.login_attempts)
        .bind(user.lock_until)
        .bind(user.reset_token.as_ref().map(|t| t.token_hash.clone()))
        .bind(user.reset_token.as_ref().map(|t| t.expires_at))
        .bind(user.last_login)
        .bind(&user.deactivation_reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {}", user.id)),
            other => conflict_or_unexpected(other),
        })?;
        record.to_domain()
    }

    async fn list_users(&self, query: UserQuery) -> PortResult<Page<User>> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count_qb, &query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM users");
        push_user_filters(&mut qb, &query);
        qb.push(" ORDER BY created_at DESC OFFSET ")
            .push_bind(query.offset)
            .push(" LIMIT ")
            .push_bind(query.limit);
        let records = qb
            .build_query_as::<UserRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let items = records
            .into_iter()
            .map(UserRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(Page { items, total })
    }

    async fn count_users(&self, active: Option<bool>) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE ($1::BOOLEAN IS NULL OR is_active = $1)",
        )
        .bind(active)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn set_users_active(&self, user_ids: &[Uuid], active: bool) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(user_ids.to_vec())
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn admin_exists(&self) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    // --- Documents ---

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "INSERT INTO documents (
                id, user_id, financial_year, category, document_type, description,
                file_key, file_name, file_size, mime_type, uploaded_by, is_admin_upload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(document.user_id)
        .bind(&document.financial_year)
        .bind(document.category.as_str())
        .bind(&document.document_type)
        .bind(&document.description)
        .bind(&document.file.key)
        .bind(&document.file.original_name)
        .bind(document.file.size)
        .bind(&document.file.mime_type)
        .bind(document.uploaded_by)
        .bind(document.is_admin_upload)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?;
        record.to_domain(Vec::new())
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>("SELECT * FROM documents WHERE id = $1")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Document {}", document_id)))?;
        let mut documents = self.documents_with_logs(vec![record]).await?;
        documents
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Document {}", document_id)))
    }

    async fn list_documents(&self, query: DocumentQuery) -> PortResult<Vec<Document>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM documents WHERE TRUE");
        if let Some(user_id) = query.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(category) = query.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(year) = query.financial_year {
            qb.push(" AND financial_year = ").push_bind(year);
        }
        qb.push(" ORDER BY created_at DESC");
        let records = qb
            .build_query_as::<DocumentRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        self.documents_with_logs(records).await
    }

    async fn append_access_log(&self, document_id: Uuid, entry: AccessLogEntry) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO document_access_logs (document_id, user_id, action, accessed_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(document_id)
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_access_logs(&self, query: AccessLogQuery) -> PortResult<Vec<AccessLogRecord>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT l.document_id, d.user_id AS owner_id, d.file_name, d.document_type, \
             l.user_id, l.action, l.accessed_at \
             FROM document_access_logs l JOIN documents d ON d.id = l.document_id WHERE TRUE",
        );
        if let Some(from) = query.from {
            qb.push(" AND l.accessed_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND l.accessed_at <= ").push_bind(to);
        }
        if let Some(user_id) = query.user_id {
            qb.push(" AND l.user_id = ").push_bind(user_id);
        }
        qb.push(" ORDER BY l.accessed_at DESC");
        let rows = qb
            .build_query_as::<AccessLogJoinRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        rows.into_iter()
            .map(|row| {
                Ok(AccessLogRecord {
                    document_id: row.document_id,
                    owner_id: row.owner_id,
                    file_name: row.file_name,
                    document_type: row.document_type,
                    entry: AccessLogEntry {
                        user_id: row.user_id,
                        action: parse_column(&row.action)?,
                        timestamp: row.accessed_at,
                    },
                })
            })
            .collect()
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Document {}", document_id)));
        }
        Ok(())
    }

    async fn count_documents(&self) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    // --- Bills ---

    async fn create_bill(&self, bill: NewBill) -> PortResult<Bill> {
        let attachment = bill.attachment.as_ref();
        let record = sqlx::query_as::<_, BillRecord>(
            "INSERT INTO bills (
                id, user_id, particulars, bill_number, amount, due_date, status,
                attachment_name, attachment_key, attachment_uploaded_at, description, created_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(bill.user_id)
        .bind(&bill.particulars)
        .bind(&bill.bill_number)
        .bind(bill.amount)
        .bind(bill.due_date)
        .bind(BillStatus::Unpaid.as_str())
        .bind(attachment.map(|a| a.file_name.clone()))
        .bind(attachment.map(|a| a.file_key.clone()))
        .bind(attachment.map(|a| a.uploaded_at))
        .bind(&bill.description)
        .bind(bill.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?;
        record.to_domain(Vec::new())
    }

    async fn get_bill(&self, bill_id: Uuid) -> PortResult<Bill> {
        let record = sqlx::query_as::<_, BillRecord>("SELECT * FROM bills WHERE id = $1")
            .bind(bill_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Bill {}", bill_id)))?;
        let mut bills = self.bills_with_payments(vec![record]).await?;
        bills
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Bill {}", bill_id)))
    }

    async fn list_bills(&self, query: BillQuery) -> PortResult<Vec<Bill>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM bills WHERE TRUE");
        if let Some(user_id) = query.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(from) = query.created_from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = query.created_to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC");
        let records = qb
            .build_query_as::<BillRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        self.bills_with_payments(records).await
    }

    async fn save_bill(&self, bill: &Bill) -> PortResult<Bill> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let attachment = bill.attachment.as_ref();

        let updated = sqlx::query(
            "UPDATE bills SET
                user_id = $2, particulars = $3, bill_number = $4, amount = $5, due_date = $6,
                status = $7, attachment_name = $8, attachment_key = $9,
                attachment_uploaded_at = $10, description = $11, updated_at = NOW()
            WHERE id = $1",
        )
        .bind(bill.id)
        .bind(bill.user_id)
        .bind(&bill.particulars)
        .bind(&bill.bill_number)
        .bind(bill.amount)
        .bind(bill.due_date)
        .bind(bill.status.as_str())
        .bind(attachment.map(|a| a.file_name.clone()))
        .bind(attachment.map(|a| a.file_key.clone()))
        .bind(attachment.map(|a| a.uploaded_at))
        .bind(&bill.description)
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_unexpected)?;
        if updated.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Bill {}", bill.id)));
        }

        sqlx::query("DELETE FROM bill_payments WHERE bill_id = $1")
            .bind(bill.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for (position, payment) in bill.payments.iter().enumerate() {
            sqlx::query(
                "INSERT INTO bill_payments (id, bill_id, position, amount, paid_at, method, remark) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(payment.id)
            .bind(bill.id)
            .bind(position as i32)
            .bind(payment.amount)
            .bind(payment.date)
            .bind(&payment.method)
            .bind(&payment.remark)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        self.get_bill(bill.id).await
    }

    async fn delete_bill(&self, bill_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM bills WHERE id = $1")
            .bind(bill_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Bill {}", bill_id)));
        }
        Ok(())
    }

    async fn count_bills(&self, status: Option<BillStatus>) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bills WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn overdue_bills(&self, due_before: NaiveDate) -> PortResult<Vec<Bill>> {
        let records = sqlx::query_as::<_, BillRecord>(
            "SELECT * FROM bills WHERE status <> 'Paid' AND due_date < $1 ORDER BY due_date ASC",
        )
        .bind(due_before)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        self.bills_with_payments(records).await
    }

    async fn outstanding_by_user(&self) -> PortResult<Vec<OutstandingBalance>> {
        let records = sqlx::query_as::<_, OutstandingRecord>(
            "SELECT b.user_id, u.user_type, u.first_name, u.last_name, u.company_name, u.email,
                    SUM(b.amount - COALESCE(p.paid, 0)) AS outstanding
             FROM bills b
             JOIN users u ON u.id = b.user_id
             LEFT JOIN (
                 SELECT bill_id, SUM(amount) AS paid FROM bill_payments GROUP BY bill_id
             ) p ON p.bill_id = b.id
             GROUP BY b.user_id, u.user_type, u.first_name, u.last_name, u.company_name, u.email
             ORDER BY outstanding DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records
            .into_iter()
            .map(|r| {
                let user_type: UserType = parse_column(&r.user_type)?;
                Ok(OutstandingBalance {
                    user_id: r.user_id,
                    name: display_name_of(
                        user_type,
                        r.first_name.as_deref(),
                        r.last_name.as_deref(),
                        r.company_name.as_deref(),
                    ),
                    email: r.email,
                    outstanding: r.outstanding,
                })
            })
            .collect()
    }
}
