//! services/api/src/services/billing.rs
//!
//! The bill ledger: bills, their payments and PDF attachments, plus the
//! per-user outstanding summary and the CSV statement.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use client_portal_core::billing::{check_bill_amount, check_bill_number};
use client_portal_core::domain::{
    Bill, BillAttachment, BillPatch, BillQuery, NewBill, NewPayment, OutstandingBalance,
    PaymentPatch, User,
};
use client_portal_core::error::{DomainError, DomainResult};
use client_portal_core::files::check_bill_attachment;
use client_portal_core::ports::{ByteStream, DatabaseService, FileStorage, PortError};
use client_portal_core::Principal;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::documents::UploadedFile;

/// Storage area for bill PDFs.
pub const BILL_AREA: &str = "bills";

#[derive(Debug, Clone)]
pub struct BillDraft {
    pub user_id: Uuid,
    pub particulars: String,
    pub bill_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub attachment: Option<UploadedFile>,
}

/// Listing filter. Dates are whole days; `to_date` includes all of that day.
#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub user_id: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

fn bill_not_found(e: PortError) -> DomainError {
    match e {
        PortError::NotFound(_) => DomainError::NotFound("Bill"),
        other => other.into(),
    }
}

fn bill_write_error(e: PortError) -> DomainError {
    match e {
        PortError::Conflict(_) => DomainError::DuplicateBillNumber,
        other => bill_not_found(other),
    }
}

pub struct BillingService {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn FileStorage>,
}

impl BillingService {
    pub fn new(db: Arc<dyn DatabaseService>, storage: Arc<dyn FileStorage>) -> Self {
        Self { db, storage }
    }

    //-------------------------------------------------------------------------------------
    // Reads
    //-------------------------------------------------------------------------------------

    /// Newest first. Non-admins are always limited to their own bills.
    pub async fn list(&self, requester: &Principal, filter: BillFilter) -> DomainResult<Vec<Bill>> {
        let query = BillQuery {
            user_id: requester.owner_scope(filter.user_id),
            created_from: filter
                .from_date
                .map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            created_to: filter.to_date.and_then(end_of_day),
        };
        Ok(self.db.list_bills(query).await?)
    }

    /// Bills owned by someone else are reported as missing to non-admins.
    pub async fn get(&self, requester: &Principal, bill_id: Uuid) -> DomainResult<Bill> {
        let bill = self.db.get_bill(bill_id).await.map_err(bill_not_found)?;
        if !requester.can_read(bill.user_id) {
            return Err(DomainError::NotFound("Bill"));
        }
        Ok(bill)
    }

    pub async fn open_attachment(
        &self,
        requester: &Principal,
        bill_id: Uuid,
    ) -> DomainResult<(BillAttachment, ByteStream)> {
        let bill = self.get(requester, bill_id).await?;
        let attachment = bill.attachment.ok_or(DomainError::NotFound("Bill"))?;
        let stream = self.storage.open(&attachment.file_key).await?;
        Ok((attachment, stream))
    }

    /// Loads the owners of `bills`, keyed by id. Missing owners are skipped.
    pub async fn owners(&self, bills: &[Bill]) -> DomainResult<HashMap<Uuid, User>> {
        let mut owners = HashMap::new();
        for bill in bills {
            if owners.contains_key(&bill.user_id) {
                continue;
            }
            match self.db.get_user(bill.user_id).await {
                Ok(user) => {
                    owners.insert(user.id, user);
                }
                Err(PortError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(owners)
    }

    pub async fn outstanding_by_user(&self) -> DomainResult<Vec<OutstandingBalance>> {
        Ok(self.db.outstanding_by_user().await?)
    }

    //-------------------------------------------------------------------------------------
    // Writes
    //-------------------------------------------------------------------------------------

    pub async fn create(&self, creator: &Principal, draft: BillDraft, now: DateTime<Utc>) -> DomainResult<Bill> {
        let particulars = draft.particulars.trim().to_string();
        if particulars.is_empty() {
            return Err(DomainError::MissingParticulars);
        }
        check_bill_number(&draft.bill_number)?;
        check_bill_amount(draft.amount)?;
        self.ensure_user(draft.user_id).await?;

        let attachment = match draft.attachment {
            Some(file) => Some(self.store_attachment(file, now).await?),
            None => None,
        };

        let created = self
            .db
            .create_bill(NewBill {
                user_id: draft.user_id,
                particulars,
                bill_number: draft.bill_number.trim().to_string(),
                amount: draft.amount,
                due_date: draft.due_date,
                description: draft.description.filter(|d| !d.trim().is_empty()),
                attachment: attachment.clone(),
                created_by: creator.user_id,
            })
            .await;

        match created {
            Ok(bill) => {
                info!("Bill {} ({}) created for user {}", bill.id, bill.bill_number, bill.user_id);
                Ok(bill)
            }
            Err(e) => {
                if let Some(orphan) = attachment {
                    self.discard_file(&orphan.file_key).await;
                }
                Err(bill_write_error(e))
            }
        }
    }

    /// Field overwrites; a new attachment replaces (and deletes) the old one.
    pub async fn update(
        &self,
        bill_id: Uuid,
        patch: BillPatch,
        attachment: Option<UploadedFile>,
        now: DateTime<Utc>,
    ) -> DomainResult<Bill> {
        let mut bill = self.db.get_bill(bill_id).await.map_err(bill_not_found)?;
        if let Some(user_id) = patch.user_id {
            self.ensure_user(user_id).await?;
        }
        bill.apply_patch(patch)?;

        let has_new_file = attachment.is_some();
        let replaced = match attachment {
            Some(file) => {
                let fresh = self.store_attachment(file, now).await?;
                bill.attachment.replace(fresh)
            }
            None => None,
        };

        let saved = match self.db.save_bill(&bill).await {
            Ok(saved) => saved,
            Err(e) => {
                if let Some(fresh) = bill.attachment.as_ref().filter(|_| has_new_file) {
                    self.discard_file(&fresh.file_key).await;
                }
                return Err(bill_write_error(e));
            }
        };
        if let Some(old) = replaced {
            self.discard_file(&old.file_key).await;
        }
        info!("Bill {} updated", saved.id);
        Ok(saved)
    }

    pub async fn add_payment(&self, bill_id: Uuid, payment: NewPayment, now: DateTime<Utc>) -> DomainResult<Bill> {
        let mut bill = self.db.get_bill(bill_id).await.map_err(bill_not_found)?;
        let payment_id = bill.add_payment(payment, now)?;
        let bill = self.db.save_bill(&bill).await.map_err(bill_write_error)?;
        info!("Payment {} recorded on bill {} ({})", payment_id, bill.id, bill.status);
        Ok(bill)
    }

    pub async fn update_payment(
        &self,
        bill_id: Uuid,
        payment_id: Uuid,
        patch: PaymentPatch,
    ) -> DomainResult<Bill> {
        let mut bill = self.db.get_bill(bill_id).await.map_err(bill_not_found)?;
        bill.update_payment(payment_id, patch)?;
        let bill = self.db.save_bill(&bill).await.map_err(bill_write_error)?;
        info!("Payment {} on bill {} updated ({})", payment_id, bill.id, bill.status);
        Ok(bill)
    }

    pub async fn delete_payment(&self, bill_id: Uuid, payment_id: Uuid) -> DomainResult<Bill> {
        let mut bill = self.db.get_bill(bill_id).await.map_err(bill_not_found)?;
        bill.remove_payment(payment_id)?;
        let bill = self.db.save_bill(&bill).await.map_err(bill_write_error)?;
        info!("Payment {} removed from bill {} ({})", payment_id, bill.id, bill.status);
        Ok(bill)
    }

    /// Removes the attached PDF first, then the bill.
    pub async fn delete(&self, bill_id: Uuid) -> DomainResult<()> {
        let bill = self.db.get_bill(bill_id).await.map_err(bill_not_found)?;
        if let Some(attachment) = &bill.attachment {
            self.storage.remove(&attachment.file_key).await?;
        }
        self.db.delete_bill(bill.id).await.map_err(bill_not_found)?;
        info!("Bill {} deleted", bill.id);
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Statement export
    //-------------------------------------------------------------------------------------

    /// The requester's visible bills as CSV, newest first.
    pub async fn export_csv(&self, requester: &Principal, filter: BillFilter) -> DomainResult<String> {
        let bills = self.list(requester, filter).await?;
        Ok(render_csv(&bills))
    }

    //-------------------------------------------------------------------------------------
    // Helpers
    //-------------------------------------------------------------------------------------

    async fn ensure_user(&self, user_id: Uuid) -> DomainResult<()> {
        match self.db.get_user(user_id).await {
            Ok(_) => Ok(()),
            Err(PortError::NotFound(_)) => Err(DomainError::NotFound("User")),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_attachment(&self, file: UploadedFile, now: DateTime<Utc>) -> DomainResult<BillAttachment> {
        check_bill_attachment(&file.mime_type, file.data.len())?;
        let stored = self
            .storage
            .save(BILL_AREA, &file.file_name, &file.mime_type, file.data)
            .await?;
        Ok(BillAttachment {
            file_name: stored.original_name,
            file_key: stored.key,
            uploaded_at: now,
        })
    }

    async fn discard_file(&self, key: &str) {
        if let Err(e) = self.storage.remove(key).await {
            warn!("Could not remove bill file {}: {}", key, e);
        }
    }
}

/// 23:59:59.999 on `date`, in UTC.
fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999).map(|t| t.and_utc())
}

const CSV_HEADER: &str = "Bill Number,Particulars,Amount,Paid,Outstanding,Status,Due Date";

/// Quotes separators, and defuses text a spreadsheet would run as a formula.
fn csv_field(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

pub fn render_csv(bills: &[Bill]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push_str("\r\n");
    for bill in bills {
        let row = [
            csv_field(&bill.bill_number),
            csv_field(&bill.particulars),
            bill.amount.round_dp(2).to_string(),
            bill.total_paid().round_dp(2).to_string(),
            bill.outstanding_amount().round_dp(2).to_string(),
            csv_field(bill.status.as_str()),
            bill.due_date.format("%Y-%m-%d").to_string(),
        ];
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_portal_core::domain::{BillStatus, Payment};

    fn bill(particulars: &str, amount: &str, paid: &[&str]) -> Bill {
        let now = Utc::now();
        Bill {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            particulars: particulars.to_string(),
            bill_number: "INV-7".to_string(),
            amount: amount.parse().unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            status: BillStatus::Unpaid,
            payments: paid
                .iter()
                .map(|p| Payment {
                    id: Uuid::new_v4(),
                    amount: p.parse().unwrap(),
                    date: now,
                    method: "UPI".to_string(),
                    remark: None,
                })
                .collect(),
            attachment: None,
            description: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn csv_rows_carry_paid_and_outstanding() {
        let mut b = bill("Audit fees", "1000", &["400"]);
        b.refresh_status();
        let csv = render_csv(&[b]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "INV-7,Audit fees,1000,400,600,Partially Paid,2025-03-31"
        );
    }

    #[test]
    fn csv_formulas_are_written_as_text() {
        let csv = render_csv(&[bill("=HYPERLINK(\"http://x\")", "10", &[])]);
        let row = csv.split("\r\n").nth(1).unwrap();
        assert!(row.contains(",\"'=HYPERLINK(\"\"http://x\"\")\","), "{row}");

        let csv = render_csv(&[bill("@SUM(A1)", "10", &[]), bill("-2+3", "10", &[])]);
        assert!(csv.contains(",'@SUM(A1),"));
        assert!(csv.contains(",'-2+3,"));
    }

    #[test]
    fn csv_quotes_fields_with_separators() {
        let csv = render_csv(&[bill("GST filing, \"Q1\"", "10.5", &[])]);
        assert!(csv.contains("\"GST filing, \"\"Q1\"\"\""));
        assert!(csv.contains(",10.5,0,10.5,Unpaid,"));
    }

    #[test]
    fn end_of_day_is_inclusive() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let end = end_of_day(date).unwrap();
        assert_eq!(end.to_rfc3339(), "2025-01-15T23:59:59.999999999+00:00");
        let next_day = NaiveDate::from_ymd_opt(2025, 1, 16).unwrap().and_time(NaiveTime::MIN);
        assert_eq!(end + chrono::Duration::nanoseconds(1), next_day.and_utc());
    }
}
