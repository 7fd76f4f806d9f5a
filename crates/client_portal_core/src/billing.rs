//! crates/client_portal_core/src/billing.rs
//!
//! The bill/payment ledger rules: derived outstanding amounts and the status
//! that follows from them.
//!
//! Every mutation of the payment list or the billed amount goes through
//! `Bill::refresh_status`, so a stored bill's status always agrees with its
//! payments.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Bill, BillPatch, BillStatus, NewPayment, Payment, PaymentPatch};
use crate::error::{DomainError, DomainResult};

/// `Paid` once payments cover the amount, `Partially Paid` while some but not
/// all of it is covered, otherwise `Unpaid`.
pub fn derive_status(amount: Decimal, total_paid: Decimal) -> BillStatus {
    if total_paid >= amount {
        BillStatus::Paid
    } else if total_paid > Decimal::ZERO {
        BillStatus::PartiallyPaid
    } else {
        BillStatus::Unpaid
    }
}

impl Bill {
    pub fn total_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Amount minus everything paid so far. Negative when overpaid.
    pub fn outstanding_amount(&self) -> Decimal {
        self.amount - self.total_paid()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today && self.status != BillStatus::Paid
    }

    pub fn refresh_status(&mut self) {
        self.status = derive_status(self.amount, self.total_paid());
    }

    pub fn payment(&self, payment_id: Uuid) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    /// Appends a payment and returns its generated id.
    pub fn add_payment(&mut self, payment: NewPayment, now: DateTime<Utc>) -> DomainResult<Uuid> {
        check_payment_amount(payment.amount)?;
        if payment.method.trim().is_empty() {
            return Err(DomainError::invalid("paymentMethod", "Payment method is required"));
        }
        let id = Uuid::new_v4();
        self.payments.push(Payment {
            id,
            amount: payment.amount,
            date: payment.date.unwrap_or(now),
            method: payment.method.trim().to_string(),
            remark: payment.remark,
        });
        self.refresh_status();
        Ok(id)
    }

    pub fn update_payment(&mut self, payment_id: Uuid, patch: PaymentPatch) -> DomainResult<()> {
        if let Some(amount) = patch.amount {
            check_payment_amount(amount)?;
        }
        let payment = self
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or(DomainError::NotFound("Payment"))?;

        if let Some(amount) = patch.amount {
            payment.amount = amount;
        }
        if let Some(date) = patch.date {
            payment.date = date;
        }
        if let Some(method) = patch.method {
            payment.method = method;
        }
        if let Some(remark) = patch.remark {
            payment.remark = Some(remark);
        }
        self.refresh_status();
        Ok(())
    }

    pub fn remove_payment(&mut self, payment_id: Uuid) -> DomainResult<Payment> {
        let index = self
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or(DomainError::NotFound("Payment"))?;
        let removed = self.payments.remove(index);
        self.refresh_status();
        Ok(removed)
    }

    /// Overwrites the fields present in `patch`.
    pub fn apply_patch(&mut self, patch: BillPatch) -> DomainResult<()> {
        if let Some(particulars) = patch.particulars {
            if particulars.trim().is_empty() {
                return Err(DomainError::MissingParticulars);
            }
            self.particulars = particulars;
        }
        if let Some(amount) = patch.amount {
            check_bill_amount(amount)?;
            self.amount = amount;
        }
        if let Some(bill_number) = patch.bill_number {
            check_bill_number(&bill_number)?;
            self.bill_number = bill_number.trim().to_string();
        }
        if let Some(user_id) = patch.user_id {
            self.user_id = user_id;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        self.refresh_status();
        Ok(())
    }
}

pub fn check_bill_amount(amount: Decimal) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::invalid("amount", "Amount must be greater than zero"));
    }
    Ok(())
}

pub fn check_bill_number(bill_number: &str) -> DomainResult<()> {
    if bill_number.trim().is_empty() {
        return Err(DomainError::invalid("billNumber", "Bill number is required"));
    }
    Ok(())
}

fn check_payment_amount(amount: Decimal) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::invalid(
            "amount",
            "Payment amount must be greater than zero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn bill(amount: Decimal) -> Bill {
        let now = Utc::now();
        Bill {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            particulars: "Audit fees".into(),
            bill_number: "INV-001".into(),
            amount,
            due_date: now.date_naive() + chrono::Duration::days(30),
            status: BillStatus::Unpaid,
            payments: Vec::new(),
            attachment: None,
            description: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(amount: Decimal) -> NewPayment {
        NewPayment {
            amount,
            date: None,
            method: "UPI".into(),
            remark: None,
        }
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(derive_status(dec("1000"), dec("0")), BillStatus::Unpaid);
        assert_eq!(derive_status(dec("1000"), dec("0.01")), BillStatus::PartiallyPaid);
        assert_eq!(derive_status(dec("1000"), dec("999.99")), BillStatus::PartiallyPaid);
        assert_eq!(derive_status(dec("1000"), dec("1000")), BillStatus::Paid);
        assert_eq!(derive_status(dec("1000"), dec("1200")), BillStatus::Paid);
    }

    #[test]
    fn outstanding_with_no_payments_is_the_amount() {
        let b = bill(dec("750.50"));
        assert_eq!(b.outstanding_amount(), dec("750.50"));
        assert_eq!(b.total_paid(), Decimal::ZERO);
    }

    #[test]
    fn partial_then_full_payment() {
        let mut b = bill(dec("1000"));
        b.add_payment(payment(dec("400")), Utc::now()).unwrap();
        assert_eq!(b.status, BillStatus::PartiallyPaid);
        assert_eq!(b.outstanding_amount(), dec("600"));

        b.add_payment(payment(dec("600")), Utc::now()).unwrap();
        assert_eq!(b.status, BillStatus::Paid);
        assert_eq!(b.outstanding_amount(), Decimal::ZERO);
    }

    #[test]
    fn removing_a_payment_demotes_status() {
        let mut b = bill(dec("1000"));
        let first = b.add_payment(payment(dec("400")), Utc::now()).unwrap();
        b.add_payment(payment(dec("600")), Utc::now()).unwrap();
        assert_eq!(b.status, BillStatus::Paid);

        b.remove_payment(first).unwrap();
        assert_eq!(b.status, BillStatus::PartiallyPaid);
        assert_eq!(b.outstanding_amount(), dec("400"));
    }

    #[test]
    fn editing_a_payment_rederives_status() {
        let mut b = bill(dec("500"));
        let id = b.add_payment(payment(dec("100")), Utc::now()).unwrap();
        b.update_payment(
            id,
            PaymentPatch {
                amount: Some(dec("500")),
                remark: Some("settled".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(b.status, BillStatus::Paid);
        assert_eq!(b.payment(id).unwrap().remark.as_deref(), Some("settled"));
    }

    #[test]
    fn raising_the_amount_reopens_a_paid_bill() {
        let mut b = bill(dec("100"));
        b.add_payment(payment(dec("100")), Utc::now()).unwrap();
        b.apply_patch(BillPatch {
            amount: Some(dec("150")),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(b.status, BillStatus::PartiallyPaid);
    }

    #[test]
    fn unknown_payment_is_not_found() {
        let mut b = bill(dec("100"));
        let err = b.remove_payment(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound("Payment")));
    }

    #[test]
    fn rejects_non_positive_payments_and_blank_particulars() {
        let mut b = bill(dec("100"));
        assert!(b.add_payment(payment(dec("0")), Utc::now()).is_err());
        assert!(b.payments.is_empty());
        let err = b
            .apply_patch(BillPatch {
                particulars: Some("   ".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::MissingParticulars));
    }

    #[test]
    fn overdue_only_when_unpaid_and_past_due() {
        let mut b = bill(dec("100"));
        let after_due = b.due_date + chrono::Duration::days(1);
        assert!(b.is_overdue(after_due));
        assert!(!b.is_overdue(b.due_date));
        b.add_payment(payment(dec("100")), Utc::now()).unwrap();
        assert!(!b.is_overdue(after_due));
    }
}
