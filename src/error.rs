//! Error taxonomy for the back-office core.
//!
//! Every fallible path returns a typed error, so callers can tell "nothing
//! to show" (`NotFound`) apart from "fetch failed" (`Backend`/`Malformed`);
//! only the cache layer keeps swallow-and-log semantics (it is an
//! optimization, never a source of truth).

use thiserror::Error;

/// Failures from the external record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested document does not exist.
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The backend was unreachable or rejected the operation.
    #[error("record store backend: {0}")]
    Backend(String),

    /// A document exists but does not deserialize into the expected shape.
    #[error("malformed record in {collection}: {source}")]
    Malformed {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures from ledger write operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input rejected before any write was attempted.
    #[error("validation: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The payment write succeeded but the linked check write failed.
    /// The store now holds an orphan payment; no rollback is attempted.
    #[error("payment {payment_id} recorded but linked check write failed: {source}")]
    CheckWriteFailed {
        payment_id: String,
        #[source]
        source: StoreError,
    },

    /// Attempted transition out of a terminal check status.
    #[error("check {check_id} is {current}, cannot mark it {requested}")]
    InvalidCheckTransition {
        check_id: String,
        current: String,
        requested: String,
    },
}
