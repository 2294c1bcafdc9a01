//! Brokerage back-office core.
//!
//! Library behind the listings/customers UI shell: the customer account
//! ledger (per-order totals, grouped check payments, chronological statement
//! with running balances, current balance), the expiring local cache that
//! memoizes per-customer bundles, and the filter/sort/paginate pipelines for
//! the four ledger tabs. The shell owns rendering, navigation, and the
//! concrete record-store backend; this crate owns the invariants.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod bundle;
pub mod cache;
pub mod error;
pub mod ledger;
pub mod models;
pub mod payments;
pub mod store;
pub mod views;

pub use bundle::{fetch_account_bundle, invalidate_account};
pub use cache::Cache;
pub use error::{LedgerError, StoreError};
pub use ledger::derive_ledger;
pub use models::{AccountBundle, AccountLedger};
pub use payments::{collect_check, create_check, create_payment, return_check};
pub use store::{MemoryStore, RecordStore};

/// Install the global tracing subscriber for the hosting shell.
///
/// Filter via `RUST_LOG`, defaulting to `info`. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
