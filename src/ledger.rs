//! Customer account ledger aggregation.
//!
//! Pure functions from raw per-customer records to derived monetary views:
//! per-order totals, grouped payment rows, the chronological statement with
//! running balances, and the current-balance summary. No hidden state and no
//! writes — everything here is recomputed in full from one [`AccountBundle`].
//!
//! Statement ordering: date ascending, then entry kind (orders post before
//! payments, payments before pending checks on the same day), then creation
//! order via stable sort. A same-day order+payment pair therefore never
//! shows a transient negative running balance.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::models::{
    AccountBundle, AccountLedger, CheckStatus, CustomerCheck, EntryKind, GroupedPayment, Order,
    OrderItem, OrderWithTotal, Payment, PaymentMethod, PaymentRow, StatementEntry,
};

/// Notes label placed on merged same-day check rows.
pub const GROUPED_NOTES_LABEL: &str = "Multiple checks received same day";

// ---------------------------------------------------------------------------
// Order totals
// ---------------------------------------------------------------------------

/// Sum of an order's line-item totals. Zero items means zero, not an error.
pub fn order_total(items: &[OrderItem]) -> f64 {
    items.iter().map(|i| i.total).sum()
}

/// Pair each order with its derived total and item count. Orders with no
/// entry in `items_by_order` get total 0 and count 0.
pub fn orders_with_totals(
    orders: &[Order],
    items_by_order: &HashMap<String, Vec<OrderItem>>,
) -> Vec<OrderWithTotal> {
    orders
        .iter()
        .map(|order| {
            let items = items_by_order
                .get(&order.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            OrderWithTotal {
                order: order.clone(),
                total: order_total(items),
                item_count: items.len(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Payment grouping
// ---------------------------------------------------------------------------

/// Merge same-day check payments into single display rows.
///
/// Cash payments always pass through as [`PaymentRow::Single`]; so does any
/// date with exactly one check payment. Dates with 2+ check payments
/// collapse into one [`GroupedPayment`] carrying the summed amount, joined
/// check numbers, deduplicated bank names, and the source payments. Callers
/// re-sort the combined rows; no order is guaranteed here.
pub fn group_payments(payments: &[Payment]) -> Vec<PaymentRow> {
    let mut rows: Vec<PaymentRow> = Vec::new();
    let mut checks_by_date: BTreeMap<chrono::NaiveDate, Vec<Payment>> = BTreeMap::new();

    for payment in payments {
        match payment.method {
            PaymentMethod::Cash => rows.push(PaymentRow::Single(payment.clone())),
            PaymentMethod::Check => checks_by_date
                .entry(payment.date)
                .or_default()
                .push(payment.clone()),
        }
    }

    for (date, group) in checks_by_date {
        if group.len() == 1 {
            rows.push(PaymentRow::Single(group.into_iter().next().unwrap()));
            continue;
        }

        let amount = group.iter().map(|p| p.amount).sum();
        let check_number = group
            .iter()
            .filter_map(|p| p.check_number.as_deref())
            .collect::<Vec<_>>()
            .join(", ");
        let mut banks: Vec<&str> = Vec::new();
        for p in &group {
            if let Some(bank) = p.check_bank.as_deref() {
                if !banks.contains(&bank) {
                    banks.push(bank);
                }
            }
        }
        rows.push(PaymentRow::Grouped(GroupedPayment {
            id: format!("grouped_{date}"),
            customer_id: group[0].customer_id.clone(),
            date,
            amount,
            check_number,
            check_bank: banks.join(", "),
            notes: GROUPED_NOTES_LABEL.to_string(),
            grouped_count: group.len(),
            original_payments: group,
        }));
    }

    rows
}

// ---------------------------------------------------------------------------
// Statement
// ---------------------------------------------------------------------------

/// Sort rank within one calendar day: orders, then payments, then checks.
fn kind_rank(kind: EntryKind) -> u8 {
    match kind {
        EntryKind::Order => 0,
        EntryKind::Payment => 1,
        EntryKind::Check => 2,
    }
}

/// Build the chronological statement with running balances.
///
/// One debit entry per order, one credit entry per payment, and one
/// informational (0/0) entry per *pending* check. Collected and returned
/// checks produce no row: their value was already counted when the check
/// payment was recorded. Each entry stores the accumulator value after
/// processing it.
pub fn build_statement(
    orders: &[OrderWithTotal],
    payments: &[Payment],
    checks: &[CustomerCheck],
) -> Vec<StatementEntry> {
    let mut entries: Vec<StatementEntry> = Vec::new();

    for o in orders {
        entries.push(StatementEntry {
            id: format!("order_{}", o.order.id),
            date: o.order.date,
            kind: EntryKind::Order,
            description: format!("Order: {}", o.order.title),
            debit: o.total,
            credit: 0.0,
            running_balance: 0.0,
        });
    }

    for p in payments {
        let description = match (&p.method, p.check_number.as_deref()) {
            (PaymentMethod::Check, Some(number)) => format!("Check payment #{number}"),
            (PaymentMethod::Check, None) => "Check payment".to_string(),
            (PaymentMethod::Cash, _) => "Cash payment".to_string(),
        };
        entries.push(StatementEntry {
            id: format!("payment_{}", p.id),
            date: p.date,
            kind: EntryKind::Payment,
            description,
            debit: 0.0,
            credit: p.amount,
            running_balance: 0.0,
        });
    }

    for c in checks.iter().filter(|c| c.status == CheckStatus::Pending) {
        entries.push(StatementEntry {
            id: format!("check_{}", c.id),
            date: c.due_date,
            kind: EntryKind::Check,
            description: format!("Pending check #{} ({})", c.check_number, c.bank),
            debit: 0.0,
            credit: 0.0,
            running_balance: 0.0,
        });
    }

    // Stable sort keeps creation order as the final tie-break.
    entries.sort_by_key(|e| (e.date, kind_rank(e.kind)));

    let mut balance = 0.0;
    for entry in &mut entries {
        balance += entry.debit - entry.credit;
        entry.running_balance = balance;
    }

    entries
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// Current balance: sum of order totals minus sum of payment amounts.
/// Positive means the customer owes the business. Pending or returned checks
/// never move this number — a check payment is counted when recorded,
/// independent of its collection outcome.
pub fn current_balance(orders: &[OrderWithTotal], payments: &[Payment]) -> f64 {
    let owed: f64 = orders.iter().map(|o| o.total).sum();
    let paid: f64 = payments.iter().map(|p| p.amount).sum();
    owed - paid
}

/// Derive every ledger view from one immutable bundle.
pub fn derive_ledger(bundle: &AccountBundle) -> AccountLedger {
    let orders = orders_with_totals(&bundle.orders, &bundle.items_by_order);

    let mut payment_rows = group_payments(&bundle.payments);
    payment_rows.sort_by(|a, b| b.date().cmp(&a.date()));

    let statement = build_statement(&orders, &bundle.payments, &bundle.checks);
    let balance = current_balance(&orders, &bundle.payments);

    debug!(
        customer_id = %bundle.customer.id,
        orders = orders.len(),
        entries = statement.len(),
        balance,
        "ledger derived"
    );

    AccountLedger {
        orders,
        payment_rows,
        statement,
        current_balance: balance,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn order(id: &str, date: &str, title: &str) -> Order {
        Order {
            id: id.into(),
            customer_id: "c1".into(),
            title: title.into(),
            date: d(date),
            status: crate::models::OrderStatus::InProgress,
            notes: String::new(),
            created_at: String::new(),
        }
    }

    fn item(id: &str, order_id: &str, total: f64) -> OrderItem {
        OrderItem {
            id: id.into(),
            order_id: order_id.into(),
            total,
        }
    }

    fn cash(id: &str, date: &str, amount: f64) -> Payment {
        Payment {
            id: id.into(),
            customer_id: "c1".into(),
            date: d(date),
            method: PaymentMethod::Cash,
            amount,
            notes: String::new(),
            check_number: None,
            check_bank: None,
            created_at: String::new(),
        }
    }

    fn check_payment(id: &str, date: &str, amount: f64, number: &str, bank: &str) -> Payment {
        Payment {
            method: PaymentMethod::Check,
            check_number: Some(number.into()),
            check_bank: Some(bank.into()),
            ..cash(id, date, amount)
        }
    }

    fn pending_check(id: &str, due: &str, amount: f64) -> CustomerCheck {
        CustomerCheck {
            id: id.into(),
            customer_id: "c1".into(),
            check_number: format!("N-{id}"),
            bank: "Alpha".into(),
            amount,
            due_date: d(due),
            status: CheckStatus::Pending,
            notes: String::new(),
            created_at: String::new(),
        }
    }

    // -- order totals -------------------------------------------------------

    #[test]
    fn test_order_total_sums_items() {
        let items = vec![item("i1", "o1", 100.0), item("i2", "o1", 250.5)];
        assert_eq!(order_total(&items), 350.5);
    }

    #[test]
    fn test_order_total_zero_items() {
        assert_eq!(order_total(&[]), 0.0);
    }

    #[test]
    fn test_orders_with_totals_missing_items_entry() {
        let orders = vec![order("o1", "2024-01-10", "Plot 7")];
        let with = orders_with_totals(&orders, &HashMap::new());
        assert_eq!(with[0].total, 0.0);
        assert_eq!(with[0].item_count, 0);
    }

    // -- grouping -----------------------------------------------------------

    #[test]
    fn test_cash_payments_never_grouped() {
        let payments = vec![
            cash("p1", "2024-02-01", 100.0),
            cash("p2", "2024-02-01", 200.0),
        ];
        let rows = group_payments(&payments);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| matches!(r, PaymentRow::Single(_))));
    }

    #[test]
    fn test_singleton_check_date_passes_through() {
        let payments = vec![check_payment("p1", "2024-02-01", 100.0, "A1", "X")];
        let rows = group_payments(&payments);
        assert_eq!(rows.len(), 1);
        match &rows[0] {
            PaymentRow::Single(p) => assert_eq!(p.id, "p1"),
            other => panic!("expected Single, got {other:?}"),
        }
    }

    #[test]
    fn test_same_day_checks_grouped() {
        let payments = vec![
            check_payment("p1", "2024-02-01", 100.0, "A1", "X"),
            check_payment("p2", "2024-02-01", 150.0, "A2", "X"),
        ];
        let rows = group_payments(&payments);
        assert_eq!(rows.len(), 1);
        match &rows[0] {
            PaymentRow::Grouped(g) => {
                assert_eq!(g.amount, 250.0);
                assert_eq!(g.check_number, "A1, A2");
                assert_eq!(g.check_bank, "X");
                assert_eq!(g.grouped_count, 2);
                assert_eq!(g.notes, GROUPED_NOTES_LABEL);
                assert_eq!(g.original_payments.len(), 2);
            }
            other => panic!("expected Grouped, got {other:?}"),
        }
    }

    #[test]
    fn test_grouping_preserves_amount_sums_per_date() {
        let payments = vec![
            check_payment("p1", "2024-02-01", 100.0, "A1", "X"),
            check_payment("p2", "2024-02-01", 150.0, "A2", "Y"),
            check_payment("p3", "2024-02-02", 75.0, "B1", "X"),
            cash("p4", "2024-02-01", 30.0),
        ];
        let rows = group_payments(&payments);
        let total_in: f64 = payments.iter().map(|p| p.amount).sum();
        let total_out: f64 = rows.iter().map(PaymentRow::amount).sum();
        assert_eq!(total_in, total_out);
    }

    #[test]
    fn test_grouped_banks_deduplicated_in_order() {
        let payments = vec![
            check_payment("p1", "2024-02-01", 10.0, "A1", "Alpha"),
            check_payment("p2", "2024-02-01", 20.0, "A2", "Beta"),
            check_payment("p3", "2024-02-01", 30.0, "A3", "Alpha"),
        ];
        let rows = group_payments(&payments);
        match &rows[0] {
            PaymentRow::Grouped(g) => assert_eq!(g.check_bank, "Alpha, Beta"),
            other => panic!("expected Grouped, got {other:?}"),
        }
    }

    // -- statement ----------------------------------------------------------

    #[test]
    fn test_statement_scenario_one() {
        // One order totaling 500 and one cash payment of 200 leaves 300 owed
        let orders = orders_with_totals(
            &[order("o1", "2024-01-10", "Apartment 3B")],
            &HashMap::from([(
                "o1".to_string(),
                vec![item("i1", "o1", 300.0), item("i2", "o1", 200.0)],
            )]),
        );
        let payments = vec![cash("p1", "2024-01-20", 200.0)];

        let statement = build_statement(&orders, &payments, &[]);
        assert_eq!(statement.len(), 2);
        assert_eq!(statement[0].running_balance, 500.0);
        assert_eq!(statement[1].running_balance, 300.0);
        assert_eq!(current_balance(&orders, &payments), 300.0);
    }

    #[test]
    fn test_statement_sorted_and_recurrence_holds() {
        let orders = orders_with_totals(
            &[
                order("o1", "2024-01-10", "A"),
                order("o2", "2024-03-01", "B"),
            ],
            &HashMap::from([
                ("o1".to_string(), vec![item("i1", "o1", 400.0)]),
                ("o2".to_string(), vec![item("i2", "o2", 600.0)]),
            ]),
        );
        let payments = vec![
            cash("p1", "2024-02-01", 150.0),
            check_payment("p2", "2024-03-05", 250.0, "A1", "X"),
        ];
        let checks = vec![pending_check("k1", "2024-02-15", 99.0)];

        let statement = build_statement(&orders, &payments, &checks);
        assert_eq!(statement.len(), 5);

        let mut prev_date = statement[0].date;
        let mut prev_balance = 0.0;
        for entry in &statement {
            assert!(entry.date >= prev_date, "dates must be non-decreasing");
            assert_eq!(entry.running_balance, prev_balance + entry.debit - entry.credit);
            prev_date = entry.date;
            prev_balance = entry.running_balance;
        }
    }

    #[test]
    fn test_same_day_order_posts_before_payment() {
        let orders = orders_with_totals(
            &[order("o1", "2024-01-10", "A")],
            &HashMap::from([("o1".to_string(), vec![item("i1", "o1", 100.0)])]),
        );
        let payments = vec![cash("p1", "2024-01-10", 100.0)];
        let statement = build_statement(&orders, &payments, &[]);
        assert_eq!(statement[0].kind, EntryKind::Order);
        assert_eq!(statement[0].running_balance, 100.0);
        assert_eq!(statement[1].running_balance, 0.0);
    }

    #[test]
    fn test_pending_check_row_is_informational() {
        let checks = vec![pending_check("k1", "2024-02-15", 500.0)];
        let statement = build_statement(&[], &[], &checks);
        assert_eq!(statement.len(), 1);
        assert_eq!(statement[0].debit, 0.0);
        assert_eq!(statement[0].credit, 0.0);
        assert_eq!(statement[0].running_balance, 0.0);
        assert!(statement[0].description.contains("Pending check"));
    }

    #[test]
    fn test_collected_and_returned_checks_have_no_row() {
        let mut collected = pending_check("k1", "2024-02-15", 100.0);
        collected.status = CheckStatus::Collected;
        let mut returned = pending_check("k2", "2024-02-16", 200.0);
        returned.status = CheckStatus::Returned;

        let statement = build_statement(&[], &[], &[collected, returned]);
        assert!(statement.is_empty());
    }

    #[test]
    fn test_current_balance_matches_final_running_balance() {
        let orders = orders_with_totals(
            &[
                order("o1", "2024-01-10", "A"),
                order("o2", "2024-02-01", "B"),
            ],
            &HashMap::from([
                ("o1".to_string(), vec![item("i1", "o1", 1000.0)]),
                ("o2".to_string(), vec![item("i2", "o2", 500.0)]),
            ]),
        );
        let payments = vec![
            cash("p1", "2024-01-15", 400.0),
            check_payment("p2", "2024-02-10", 350.0, "A1", "X"),
        ];
        let checks = vec![pending_check("k1", "2024-03-01", 123.0)];

        let statement = build_statement(&orders, &payments, &checks);
        let last = statement.last().unwrap();
        assert_eq!(last.running_balance, current_balance(&orders, &payments));
    }

    #[test]
    fn test_derive_ledger_end_to_end() {
        let bundle = AccountBundle {
            customer: crate::models::Customer {
                id: "c1".into(),
                name: "Avery".into(),
                phone: String::new(),
                notes: String::new(),
            },
            orders: vec![order("o1", "2024-01-10", "Plot 7")],
            payments: vec![cash("p1", "2024-01-20", 200.0)],
            checks: vec![],
            items_by_order: HashMap::from([(
                "o1".to_string(),
                vec![item("i1", "o1", 500.0)],
            )]),
        };
        let ledger = derive_ledger(&bundle);
        assert_eq!(ledger.orders[0].total, 500.0);
        assert_eq!(ledger.payment_rows.len(), 1);
        assert_eq!(ledger.statement.len(), 2);
        assert_eq!(ledger.current_balance, 300.0);
    }
}
