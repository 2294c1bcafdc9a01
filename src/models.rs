//! Typed entities for the brokerage back-office ledger.
//!
//! Records live in the external record store as JSON documents with a stable
//! `id`; everything here round-trips through serde. Monetary totals on orders
//! and the whole statement are *derived* values — they are recomputed from
//! raw records on every aggregation and never written back.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// A customer order. Its monetary total and item count are derived from the
/// separately-stored [`OrderItem`] records, never stored on the order itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: String,
    /// RFC 3339 creation timestamp, used as the tie-break sort key.
    #[serde(default)]
    pub created_at: String,
}

/// A single line item belonging to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Line total. Documents missing this field read as 0.
    #[serde(default)]
    pub total: f64,
}

/// An order paired with its derived total and item count.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithTotal {
    #[serde(flatten)]
    pub order: Order,
    pub total: f64,
    pub item_count: usize,
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
}

/// A realized payment from a customer.
///
/// Invariant: `method == Check` implies `check_number` and `check_bank` are
/// present and non-empty (enforced at creation, see `payments`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub customer_id: String,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub amount: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub check_number: Option<String>,
    #[serde(default)]
    pub check_bank: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Customer checks
// ---------------------------------------------------------------------------

/// Collection status of a customer check. `Collected` and `Returned` are
/// terminal: no transition leads out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Collected,
    Returned,
}

impl CheckStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckStatus::Collected | CheckStatus::Returned)
    }
}

/// A check held against a customer, either recorded directly or materialized
/// as the side effect of a check [`Payment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerCheck {
    pub id: String,
    pub customer_id: String,
    pub check_number: String,
    pub bank: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub status: CheckStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Derived views (never persisted)
// ---------------------------------------------------------------------------

/// Source type of a statement entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Order,
    Payment,
    Check,
}

/// One row of the chronological account statement. Regenerated in full on
/// every aggregation; `id` is synthetic and prefixed by the source type.
#[derive(Debug, Clone, Serialize)]
pub struct StatementEntry {
    pub id: String,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub description: String,
    pub debit: f64,
    pub credit: f64,
    /// Cumulative debits minus credits *after* this entry.
    pub running_balance: f64,
}

/// Display-only merge of 2+ same-day check payments into one row.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedPayment {
    pub id: String,
    pub customer_id: String,
    pub date: NaiveDate,
    /// Summed amount of the merged payments.
    pub amount: f64,
    /// Check numbers joined with ", ".
    pub check_number: String,
    /// Deduplicated bank names joined with ", ".
    pub check_bank: String,
    pub notes: String,
    pub grouped_count: usize,
    /// The source payments, kept for traceability.
    pub original_payments: Vec<Payment>,
}

/// A row of the payments view: either an untouched payment or a same-day
/// check group. Cash payments are always `Single`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum PaymentRow {
    Single(Payment),
    Grouped(GroupedPayment),
}

impl PaymentRow {
    pub fn date(&self) -> NaiveDate {
        match self {
            PaymentRow::Single(p) => p.date,
            PaymentRow::Grouped(g) => g.date,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            PaymentRow::Single(p) => p.amount,
            PaymentRow::Grouped(g) => g.amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Customer and bundle
// ---------------------------------------------------------------------------

/// The slice of a customer record the ledger screens read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

/// The full set of raw records fetched for one customer at one time.
/// Immutable once fetched; refreshed wholesale, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBundle {
    pub customer: Customer,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub checks: Vec<CustomerCheck>,
    /// All order items for this customer's orders, grouped by `order_id`.
    pub items_by_order: HashMap<String, Vec<OrderItem>>,
}

/// Everything the presentation layer derives from one [`AccountBundle`].
#[derive(Debug, Clone, Serialize)]
pub struct AccountLedger {
    pub orders: Vec<OrderWithTotal>,
    pub payment_rows: Vec<PaymentRow>,
    pub statement: Vec<StatementEntry>,
    pub current_balance: f64,
}

// ===========================================================================
// Tests
// ===========================================================================
