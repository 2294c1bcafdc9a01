//! Filter / sort / paginate pipelines for the four ledger tabs.
//!
//! Each tab (orders, payments, checks, statement) keeps one small state
//! struct mutated only through its action enum, plus a pure `derive` that
//! maps source data to the visible page. Same source + same state always
//! yields the same slice; there is no manual refresh step. Changing a filter
//! or the page size resets to page 1; a page that ends up past the new total
//! shows as an empty-but-valid slice, never an error.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{
    CheckStatus, CustomerCheck, EntryKind, OrderStatus, OrderWithTotal, PaymentMethod, PaymentRow,
    StatementEntry,
};

/// Default page size for every tab.
pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Pagination metadata exposed alongside each visible slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: usize,
    pub items_per_page: usize,
    pub total_pages: usize,
}

/// One visible page of a filtered list.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

/// Uniform page slicing: `slice = list[(page-1)*size .. page*size]`,
/// `total_pages = ceil(len / size)` (0 for an empty list). A page past the
/// end yields an empty slice with valid metadata.
pub fn paginate<T: Clone>(list: &[T], current_page: usize, items_per_page: usize) -> Paged<T> {
    let size = items_per_page.max(1);
    let page = current_page.max(1);
    let total_pages = list.len().div_ceil(size);
    let start = (page - 1).saturating_mul(size);
    let items = if start >= list.len() {
        Vec::new()
    } else {
        list[start..(start + size).min(list.len())].to_vec()
    };
    Paged {
        items,
        meta: PageMeta {
            current_page: page,
            items_per_page: size,
            total_pages,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared filter pieces
// ---------------------------------------------------------------------------

/// Inclusive calendar-date range; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Sort direction for the orders tab (the only user-toggleable sort).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSort {
    Ascending,
    Descending,
}

// ---------------------------------------------------------------------------
// Orders view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum OrdersAction {
    /// `None` means "all".
    SetStatus(Option<OrderStatus>),
    SetDateRange(DateRange),
    ToggleSort,
    SetPage(usize),
    SetItemsPerPage(usize),
}

#[derive(Debug, Clone)]
pub struct OrdersView {
    pub status: Option<OrderStatus>,
    pub range: DateRange,
    pub sort: DateSort,
    pub current_page: usize,
    pub items_per_page: usize,
}

impl Default for OrdersView {
    fn default() -> Self {
        Self {
            status: None,
            range: DateRange::default(),
            sort: DateSort::Descending,
            current_page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

impl OrdersView {
    pub fn apply(&mut self, action: OrdersAction) {
        match action {
            OrdersAction::SetStatus(status) => {
                self.status = status;
                self.current_page = 1;
            }
            OrdersAction::SetDateRange(range) => {
                self.range = range;
                self.current_page = 1;
            }
            OrdersAction::ToggleSort => {
                self.sort = match self.sort {
                    DateSort::Ascending => DateSort::Descending,
                    DateSort::Descending => DateSort::Ascending,
                };
            }
            OrdersAction::SetPage(page) => self.current_page = page.max(1),
            OrdersAction::SetItemsPerPage(size) => {
                self.items_per_page = size.max(1);
                self.current_page = 1;
            }
        }
    }

    pub fn derive(&self, source: &[OrderWithTotal]) -> Paged<OrderWithTotal> {
        let mut filtered: Vec<OrderWithTotal> = source
            .iter()
            .filter(|o| self.status.map_or(true, |s| o.order.status == s))
            .filter(|o| self.range.contains(o.order.date))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| match self.sort {
            DateSort::Ascending => a.order.date.cmp(&b.order.date),
            DateSort::Descending => b.order.date.cmp(&a.order.date),
        });
        paginate(&filtered, self.current_page, self.items_per_page)
    }
}

// ---------------------------------------------------------------------------
// Payments view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum PaymentsAction {
    SetMethod(Option<PaymentMethod>),
    SetDateRange(DateRange),
    SetPage(usize),
    SetItemsPerPage(usize),
}

/// Payments keep their fetch order (creation time descending); grouped rows
/// count as check payments for the method filter.
#[derive(Debug, Clone)]
pub struct PaymentsView {
    pub method: Option<PaymentMethod>,
    pub range: DateRange,
    pub current_page: usize,
    pub items_per_page: usize,
}

impl Default for PaymentsView {
    fn default() -> Self {
        Self {
            method: None,
            range: DateRange::default(),
            current_page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

fn row_method(row: &PaymentRow) -> PaymentMethod {
    match row {
        PaymentRow::Single(p) => p.method,
        PaymentRow::Grouped(_) => PaymentMethod::Check,
    }
}

impl PaymentsView {
    pub fn apply(&mut self, action: PaymentsAction) {
        match action {
            PaymentsAction::SetMethod(method) => {
                self.method = method;
                self.current_page = 1;
            }
            PaymentsAction::SetDateRange(range) => {
                self.range = range;
                self.current_page = 1;
            }
            PaymentsAction::SetPage(page) => self.current_page = page.max(1),
            PaymentsAction::SetItemsPerPage(size) => {
                self.items_per_page = size.max(1);
                self.current_page = 1;
            }
        }
    }

    pub fn derive(&self, source: &[PaymentRow]) -> Paged<PaymentRow> {
        let filtered: Vec<PaymentRow> = source
            .iter()
            .filter(|row| self.method.map_or(true, |m| row_method(row) == m))
            .filter(|row| self.range.contains(row.date()))
            .cloned()
            .collect();
        paginate(&filtered, self.current_page, self.items_per_page)
    }
}

// ---------------------------------------------------------------------------
// Checks view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ChecksAction {
    SetStatus(Option<CheckStatus>),
    SetDateRange(DateRange),
    SetPage(usize),
    SetItemsPerPage(usize),
}

/// Checks filter on `due_date` and keep their fetch order.
#[derive(Debug, Clone)]
pub struct ChecksView {
    pub status: Option<CheckStatus>,
    pub range: DateRange,
    pub current_page: usize,
    pub items_per_page: usize,
}

impl Default for ChecksView {
    fn default() -> Self {
        Self {
            status: None,
            range: DateRange::default(),
            current_page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

impl ChecksView {
    pub fn apply(&mut self, action: ChecksAction) {
        match action {
            ChecksAction::SetStatus(status) => {
                self.status = status;
                self.current_page = 1;
            }
            ChecksAction::SetDateRange(range) => {
                self.range = range;
                self.current_page = 1;
            }
            ChecksAction::SetPage(page) => self.current_page = page.max(1),
            ChecksAction::SetItemsPerPage(size) => {
                self.items_per_page = size.max(1);
                self.current_page = 1;
            }
        }
    }

    pub fn derive(&self, source: &[CustomerCheck]) -> Paged<CustomerCheck> {
        let filtered: Vec<CustomerCheck> = source
            .iter()
            .filter(|c| self.status.map_or(true, |s| c.status == s))
            .filter(|c| self.range.contains(c.due_date))
            .cloned()
            .collect();
        paginate(&filtered, self.current_page, self.items_per_page)
    }
}

// ---------------------------------------------------------------------------
// Statement view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum StatementAction {
    SetKind(Option<EntryKind>),
    SetDateRange(DateRange),
    SetPage(usize),
    SetItemsPerPage(usize),
}

/// The statement keeps the chronological-ascending order the aggregation
/// produced; that order carries the running balance, so the view never
/// re-sorts it.
#[derive(Debug, Clone)]
pub struct StatementView {
    pub kind: Option<EntryKind>,
    pub range: DateRange,
    pub current_page: usize,
    pub items_per_page: usize,
}

impl Default for StatementView {
    fn default() -> Self {
        Self {
            kind: None,
            range: DateRange::default(),
            current_page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

impl StatementView {
    pub fn apply(&mut self, action: StatementAction) {
        match action {
            StatementAction::SetKind(kind) => {
                self.kind = kind;
                self.current_page = 1;
            }
            StatementAction::SetDateRange(range) => {
                self.range = range;
                self.current_page = 1;
            }
            StatementAction::SetPage(page) => self.current_page = page.max(1),
            StatementAction::SetItemsPerPage(size) => {
                self.items_per_page = size.max(1);
                self.current_page = 1;
            }
        }
    }

    pub fn derive(&self, source: &[StatementEntry]) -> Paged<StatementEntry> {
        let filtered: Vec<StatementEntry> = source
            .iter()
            .filter(|e| self.kind.map_or(true, |k| e.kind == k))
            .filter(|e| self.range.contains(e.date))
            .cloned()
            .collect();
        paginate(&filtered, self.current_page, self.items_per_page)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
