//! Payment and check write operations.
//!
//! Recording a check payment also materializes a linked [`CustomerCheck`]
//! with status pending and a due date equal to the payment date. The two
//! writes are issued as one operation with a typed partial-failure outcome:
//! if the check write fails after the payment landed, the caller receives
//! [`LedgerError::CheckWriteFailed`] naming the orphan payment (at-least-once
//! semantics, no rollback). A verifying re-read covers the read-after-write
//! gap: `check_confirmed == false` marks the window where the backing store
//! has not yet surfaced the new check.

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{CheckStatus, CustomerCheck, Payment, PaymentMethod};
use crate::store::{collections, fetch_one, RecordStore};

/// Notes placed on a materialized check when the payment carries none.
pub const DEFAULT_CHECK_NOTES: &str = "Check received with payment";

// ---------------------------------------------------------------------------
// Create payment
// ---------------------------------------------------------------------------

/// Input for [`create_payment`].
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub customer_id: String,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub amount: f64,
    pub notes: String,
    pub check_number: Option<String>,
    pub check_bank: Option<String>,
}

/// Outcome of a successful [`create_payment`].
#[derive(Debug, Clone)]
pub struct PaymentCreated {
    pub payment: Payment,
    /// The materialized check, for check payments only.
    pub check: Option<CustomerCheck>,
    /// False when the verifying re-read could not yet see the new check;
    /// the caller should treat the check as awaiting confirmation and
    /// re-fetch the bundle.
    pub check_confirmed: bool,
}

/// Validate and persist a payment; for check payments, additionally persist
/// the linked pending check.
///
/// Validation happens before any write: the amount must be positive, and a
/// check payment must carry a non-blank check number and bank.
pub fn create_payment(
    store: &dyn RecordStore,
    input: NewPayment,
) -> Result<PaymentCreated, LedgerError> {
    if input.amount <= 0.0 {
        return Err(LedgerError::Validation("amount must be positive".into()));
    }
    let check_fields = if input.method == PaymentMethod::Check {
        let number = input
            .check_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                LedgerError::Validation("check payment requires a check number".into())
            })?;
        let bank = input
            .check_bank
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LedgerError::Validation("check payment requires a bank".into()))?;
        Some((number.to_string(), bank.to_string()))
    } else {
        None
    };

    let now = Utc::now().to_rfc3339();
    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        customer_id: input.customer_id.clone(),
        date: input.date,
        method: input.method,
        amount: input.amount,
        notes: input.notes.clone(),
        check_number: check_fields.as_ref().map(|(n, _)| n.clone()),
        check_bank: check_fields.as_ref().map(|(_, b)| b.clone()),
        created_at: now.clone(),
    };

    store
        .insert(collections::PAYMENTS, to_doc(&payment))
        .map_err(LedgerError::Store)?;

    let Some((number, bank)) = check_fields else {
        info!(payment_id = %payment.id, amount = payment.amount, "Cash payment recorded");
        return Ok(PaymentCreated {
            payment,
            check: None,
            check_confirmed: true,
        });
    };

    let check = CustomerCheck {
        id: Uuid::new_v4().to_string(),
        customer_id: input.customer_id,
        check_number: number,
        bank,
        amount: input.amount,
        due_date: input.date,
        status: CheckStatus::Pending,
        notes: if input.notes.trim().is_empty() {
            DEFAULT_CHECK_NOTES.to_string()
        } else {
            input.notes
        },
        created_at: now,
    };

    if let Err(source) = store.insert(collections::CUSTOMER_CHECKS, to_doc(&check)) {
        // The payment already landed; surface the orphan explicitly.
        warn!(payment_id = %payment.id, error = %source, "linked check write failed after payment write");
        return Err(LedgerError::CheckWriteFailed {
            payment_id: payment.id,
            source,
        });
    }

    // Verifying re-read: the backing store may not reflect a just-written
    // record on the next read. Absent or erroring reads leave the check in
    // an awaiting-confirmation state rather than scheduling blind re-fetches.
    let check_confirmed = match store.get(collections::CUSTOMER_CHECKS, &check.id) {
        Ok(Some(_)) => true,
        Ok(None) => {
            warn!(check_id = %check.id, "new check not visible yet, awaiting confirmation");
            false
        }
        Err(e) => {
            warn!(check_id = %check.id, error = %e, "check verification read failed");
            false
        }
    };

    info!(
        payment_id = %payment.id,
        check_id = %check.id,
        amount = payment.amount,
        check_confirmed,
        "Check payment recorded with linked pending check"
    );

    Ok(PaymentCreated {
        payment,
        check: Some(check),
        check_confirmed,
    })
}

// ---------------------------------------------------------------------------
// Create check directly
// ---------------------------------------------------------------------------

/// Input for [`create_check`] (a check recorded outside any payment).
#[derive(Debug, Clone)]
pub struct NewCheck {
    pub customer_id: String,
    pub check_number: String,
    pub bank: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub notes: String,
}

/// Record a customer check directly, status pending.
pub fn create_check(
    store: &dyn RecordStore,
    input: NewCheck,
) -> Result<CustomerCheck, LedgerError> {
    if input.amount <= 0.0 {
        return Err(LedgerError::Validation("amount must be positive".into()));
    }
    if input.check_number.trim().is_empty() {
        return Err(LedgerError::Validation("check number is required".into()));
    }
    if input.bank.trim().is_empty() {
        return Err(LedgerError::Validation("bank is required".into()));
    }

    let check = CustomerCheck {
        id: Uuid::new_v4().to_string(),
        customer_id: input.customer_id,
        check_number: input.check_number.trim().to_string(),
        bank: input.bank.trim().to_string(),
        amount: input.amount,
        due_date: input.due_date,
        status: CheckStatus::Pending,
        notes: input.notes,
        created_at: Utc::now().to_rfc3339(),
    };
    store
        .insert(collections::CUSTOMER_CHECKS, to_doc(&check))
        .map_err(LedgerError::Store)?;

    info!(check_id = %check.id, amount = check.amount, "Customer check recorded");
    Ok(check)
}

// ---------------------------------------------------------------------------
// Check status transitions
// ---------------------------------------------------------------------------

/// Mark a pending check collected.
pub fn collect_check(
    store: &dyn RecordStore,
    check_id: &str,
) -> Result<CustomerCheck, LedgerError> {
    transition_check(store, check_id, CheckStatus::Collected)
}

/// Mark a pending check returned.
pub fn return_check(store: &dyn RecordStore, check_id: &str) -> Result<CustomerCheck, LedgerError> {
    transition_check(store, check_id, CheckStatus::Returned)
}

/// Pending is the only state with outgoing transitions; collected and
/// returned are terminal and reject further changes.
fn transition_check(
    store: &dyn RecordStore,
    check_id: &str,
    to: CheckStatus,
) -> Result<CustomerCheck, LedgerError> {
    let mut check: CustomerCheck = fetch_one(store, collections::CUSTOMER_CHECKS, check_id)?;

    if check.status.is_terminal() {
        return Err(LedgerError::InvalidCheckTransition {
            check_id: check_id.to_string(),
            current: status_label(check.status).to_string(),
            requested: status_label(to).to_string(),
        });
    }

    check.status = to;
    store
        .update(collections::CUSTOMER_CHECKS, check_id, to_doc(&check))
        .map_err(LedgerError::Store)?;

    info!(check_id, status = status_label(to), "Check status updated");
    Ok(check)
}

fn status_label(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pending => "pending",
        CheckStatus::Collected => "collected",
        CheckStatus::Returned => "returned",
    }
}

fn to_doc<T: serde::Serialize>(record: &T) -> serde_json::Value {
    // Models always serialize; a failure here would be a programming error.
    serde_json::to_value(record).unwrap_or(serde_json::Value::Null)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, SortDir};
    use serde_json::Value;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn new_cash(amount: f64) -> NewPayment {
        NewPayment {
            customer_id: "c1".into(),
            date: d("2024-04-01"),
            method: PaymentMethod::Cash,
            amount,
            notes: String::new(),
            check_number: None,
            check_bank: None,
        }
    }

    fn new_check(amount: f64) -> NewPayment {
        NewPayment {
            method: PaymentMethod::Check,
            check_number: Some("A1".into()),
            check_bank: Some("Alpha".into()),
            ..new_cash(amount)
        }
    }

    /// Store wrapper that fails every insert into one collection.
    struct FailingInserts<'a> {
        inner: &'a MemoryStore,
        fail_collection: &'a str,
    }

    impl RecordStore for FailingInserts<'_> {
        fn insert(&self, collection: &str, doc: Value) -> Result<Value, StoreError> {
            if collection == self.fail_collection {
                return Err(StoreError::Backend("simulated outage".into()));
            }
            self.inner.insert(collection, doc)
        }
        fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(collection, id)
        }
        fn list(
            &self,
            collection: &str,
            filter: Option<(&str, &Value)>,
            sort: Option<(&str, SortDir)>,
        ) -> Result<Vec<Value>, StoreError> {
            self.inner.list(collection, filter, sort)
        }
        fn update(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
            self.inner.update(collection, id, doc)
        }
        fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(collection, id)
        }
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let store = MemoryStore::new();
        assert!(matches!(
            create_payment(&store, new_cash(0.0)),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            create_payment(&store, new_cash(-5.0)),
            Err(LedgerError::Validation(_))
        ));
        // Nothing was written
        assert!(store
            .list(collections::PAYMENTS, None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_check_payment_requires_number_and_bank() {
        let store = MemoryStore::new();
        let mut p = new_check(100.0);
        p.check_number = Some("   ".into());
        assert!(matches!(
            create_payment(&store, p),
            Err(LedgerError::Validation(_))
        ));

        let mut p = new_check(100.0);
        p.check_bank = None;
        assert!(matches!(
            create_payment(&store, p),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_cash_payment_creates_no_check() {
        let store = MemoryStore::new();
        let created = create_payment(&store, new_cash(200.0)).unwrap();
        assert!(created.check.is_none());
        assert!(created.check_confirmed);
        assert!(store
            .list(collections::CUSTOMER_CHECKS, None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_check_payment_materializes_pending_check() {
        let store = MemoryStore::new();
        let created = create_payment(&store, new_check(150.0)).unwrap();

        let check = created.check.expect("check should exist");
        assert_eq!(check.status, CheckStatus::Pending);
        assert_eq!(check.due_date, created.payment.date);
        assert_eq!(check.amount, 150.0);
        assert_eq!(check.check_number, "A1");
        assert_eq!(check.bank, "Alpha");
        assert!(created.check_confirmed);

        let stored = store
            .list(collections::CUSTOMER_CHECKS, None, None)
            .unwrap();
        assert_eq!(stored.len(), 1, "exactly one check materialized");
    }

    #[test]
    fn test_blank_payment_notes_default_on_check() {
        let store = MemoryStore::new();
        let created = create_payment(&store, new_check(100.0)).unwrap();
        assert_eq!(created.check.unwrap().notes, DEFAULT_CHECK_NOTES);

        let mut with_notes = new_check(100.0);
        with_notes.date = d("2024-04-02");
        with_notes.notes = "first installment".into();
        let created = create_payment(&store, with_notes).unwrap();
        assert_eq!(created.check.unwrap().notes, "first installment");
    }

    #[test]
    fn test_partial_write_surfaces_orphan_payment() {
        let inner = MemoryStore::new();
        let store = FailingInserts {
            inner: &inner,
            fail_collection: collections::CUSTOMER_CHECKS,
        };

        let err = create_payment(&store, new_check(100.0)).unwrap_err();
        let payment_id = match err {
            LedgerError::CheckWriteFailed { payment_id, .. } => payment_id,
            other => panic!("expected CheckWriteFailed, got {other:?}"),
        };

        // The orphan payment is really in the store, the check is not
        assert!(inner
            .get(collections::PAYMENTS, &payment_id)
            .unwrap()
            .is_some());
        assert!(inner
            .list(collections::CUSTOMER_CHECKS, None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_create_check_directly() {
        let store = MemoryStore::new();
        let check = create_check(
            &store,
            NewCheck {
                customer_id: "c1".into(),
                check_number: " B7 ".into(),
                bank: "Beta".into(),
                amount: 300.0,
                due_date: d("2024-06-01"),
                notes: String::new(),
            },
        )
        .unwrap();
        assert_eq!(check.status, CheckStatus::Pending);
        assert_eq!(check.check_number, "B7");
    }

    #[test]
    fn test_collect_and_return_transitions() {
        let store = MemoryStore::new();
        let check = create_payment(&store, new_check(100.0))
            .unwrap()
            .check
            .unwrap();
        let collected = collect_check(&store, &check.id).unwrap();
        assert_eq!(collected.status, CheckStatus::Collected);

        let stored: CustomerCheck =
            fetch_one(&store, collections::CUSTOMER_CHECKS, &check.id).unwrap();
        assert_eq!(stored.status, CheckStatus::Collected);
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let store = MemoryStore::new();
        let check = create_payment(&store, new_check(100.0))
            .unwrap()
            .check
            .unwrap();
        collect_check(&store, &check.id).unwrap();

        let err = return_check(&store, &check.id).unwrap_err();
        match err {
            LedgerError::InvalidCheckTransition {
                current, requested, ..
            } => {
                assert_eq!(current, "collected");
                assert_eq!(requested, "returned");
            }
            other => panic!("expected InvalidCheckTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_transition_missing_check_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            collect_check(&store, "ghost"),
            Err(LedgerError::Store(StoreError::NotFound { .. }))
        ));
    }
}
