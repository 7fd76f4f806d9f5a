//! services/api/src/services/admin.rs
//!
//! Read-mostly administrative views: counters, user search, audit log,
//! overdue tracking and per-user activity.

use chrono::{DateTime, Days, NaiveDate, Utc};
use client_portal_core::domain::{
    AccessAction, AccessLogQuery, AccessLogRecord, Bill, BillQuery, BillStatus, Document,
    DocumentQuery, Page, User, UserQuery,
};
use client_portal_core::error::{DomainError, DomainResult};
use client_portal_core::ports::{DatabaseService, PortError};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_documents: i64,
    pub total_bills: i64,
    /// Bills still fully `Unpaid`.
    pub pending_bills: i64,
}

#[derive(Debug, Clone)]
pub struct UserDetail {
    pub user: User,
    pub documents: Vec<Document>,
    pub bills: Vec<Bill>,
}

/// An access-log entry with the accessing user resolved.
#[derive(Debug, Clone)]
pub struct AccessLogLine {
    pub record: AccessLogRecord,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentAccessSummary {
    pub total_views: u64,
    pub total_downloads: u64,
    pub last_access: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillingSummary {
    pub total_bills: u64,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct UserActivity {
    pub last_login: Option<DateTime<Utc>>,
    pub document_access: DocumentAccessSummary,
    pub billing_summary: BillingSummary,
}

pub struct AdminService {
    db: Arc<dyn DatabaseService>,
}

impl AdminService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn stats(&self) -> DomainResult<PortalStats> {
        Ok(PortalStats {
            total_users: self.db.count_users(None).await?,
            active_users: self.db.count_users(Some(true)).await?,
            total_documents: self.db.count_documents().await?,
            total_bills: self.db.count_bills(None).await?,
            pending_bills: self.db.count_bills(Some(BillStatus::Unpaid)).await?,
        })
    }

    /// One page of users, newest first. `page` counts from 1.
    pub async fn users(
        &self,
        page: i64,
        limit: i64,
        search: Option<String>,
        active: Option<bool>,
    ) -> DomainResult<Page<User>> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        Ok(self
            .db
            .list_users(UserQuery {
                search,
                active,
                offset: (page - 1).saturating_mul(limit),
                limit,
            })
            .await?)
    }

    pub async fn user_detail(&self, user_id: Uuid) -> DomainResult<UserDetail> {
        let user = self.find_user(user_id).await?;
        let documents = self
            .db
            .list_documents(DocumentQuery {
                user_id: Some(user.id),
                ..DocumentQuery::default()
            })
            .await?;
        let bills = self
            .db
            .list_bills(BillQuery {
                user_id: Some(user.id),
                ..BillQuery::default()
            })
            .await?;
        Ok(UserDetail {
            user,
            documents,
            bills,
        })
    }

    /// Every access-log entry in range, newest first, with the accessing user attached.
    pub async fn access_logs(&self, query: AccessLogQuery) -> DomainResult<Vec<AccessLogLine>> {
        let records = self.db.list_access_logs(query).await?;
        let users = self
            .users_by_id(records.iter().map(|r| r.entry.user_id))
            .await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let user = users.get(&record.entry.user_id).cloned();
                AccessLogLine { record, user }
            })
            .collect())
    }

    /// Unpaid or partially paid bills past their due date, earliest due first.
    pub async fn overdue_bills(&self, today: NaiveDate) -> DomainResult<Vec<Bill>> {
        Ok(self.db.overdue_bills(today).await?)
    }

    /// Deactivates every owner of a non-paid bill due more than `days_overdue`
    /// days ago. Returns how many distinct owners were found.
    pub async fn deactivate_overdue(&self, days_overdue: i64, today: NaiveDate) -> DomainResult<u64> {
        let cutoff = u64::try_from(days_overdue)
            .ok()
            .and_then(|days| today.checked_sub_days(Days::new(days)))
            .ok_or_else(|| {
                DomainError::invalid(
                    "daysOverdue",
                    "daysOverdue must be a non-negative number of days in range",
                )
            })?;
        let owners: Vec<Uuid> = self
            .db
            .overdue_bills(cutoff)
            .await?
            .into_iter()
            .map(|b| b.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !owners.is_empty() {
            self.db.set_users_active(&owners, false).await?;
        }
        info!("Deactivated {} users with bills overdue since {}", owners.len(), cutoff);
        Ok(owners.len() as u64)
    }

    pub async fn activity(&self, user_id: Uuid) -> DomainResult<UserActivity> {
        let user = self.find_user(user_id).await?;
        let documents = self
            .db
            .list_documents(DocumentQuery {
                user_id: Some(user.id),
                ..DocumentQuery::default()
            })
            .await?;
        let bills = self
            .db
            .list_bills(BillQuery {
                user_id: Some(user.id),
                ..BillQuery::default()
            })
            .await?;

        let mut access = DocumentAccessSummary::default();
        for entry in documents.iter().flat_map(|d| d.access_logs.iter()) {
            match entry.action {
                AccessAction::View => access.total_views += 1,
                AccessAction::Download => access.total_downloads += 1,
            }
            access.last_access = access.last_access.max(Some(entry.timestamp));
        }

        let billing = BillingSummary {
            total_bills: bills.len() as u64,
            total_amount: bills.iter().map(|b| b.amount).sum(),
            paid_amount: bills.iter().map(Bill::total_paid).sum(),
        };

        Ok(UserActivity {
            last_login: user.last_login,
            document_access: access,
            billing_summary: billing,
        })
    }

    async fn find_user(&self, user_id: Uuid) -> DomainResult<User> {
        match self.db.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(PortError::NotFound(_)) => Err(DomainError::NotFound("User")),
            Err(e) => Err(e.into()),
        }
    }

    async fn users_by_id(&self, ids: impl Iterator<Item = Uuid>) -> DomainResult<HashMap<Uuid, User>> {
        let mut users = HashMap::new();
        for id in ids.collect::<BTreeSet<_>>() {
            match self.db.get_user(id).await {
                Ok(user) => {
                    users.insert(id, user);
                }
                Err(PortError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(users)
    }
}
