//! Record store seam.
//!
//! The back office keeps its collections (customers, orders, order items,
//! payments, checks) in a remote document database reached through this
//! trait: collection-based CRUD over JSON documents with a stable `id`,
//! query-by-equality-filter, and sort-by-field. The core never talks to a
//! concrete backend directly; the shell wires one in. [`MemoryStore`] is the
//! insertion-ordered reference backend used by tests and local development.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;

/// Collection names used by the ledger core.
pub mod collections {
    pub const CUSTOMERS: &str = "customers";
    pub const ORDERS: &str = "orders";
    pub const ORDER_ITEMS: &str = "order_items";
    pub const PAYMENTS: &str = "payments";
    pub const CUSTOMER_CHECKS: &str = "customer_checks";
}

/// Sort direction for [`RecordStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Collection-based CRUD over id-bearing JSON documents.
pub trait RecordStore {
    /// Insert a document. A missing or empty `id` field gets a fresh UUID.
    /// Returns the document as stored.
    fn insert(&self, collection: &str, doc: Value) -> Result<Value, StoreError>;

    /// Fetch one document by id, `None` when absent.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// List documents, optionally filtered by field equality and sorted by a
    /// field. Without a sort the backend's insertion order is preserved.
    fn list(
        &self,
        collection: &str,
        filter: Option<(&str, &Value)>,
        sort: Option<(&str, SortDir)>,
    ) -> Result<Vec<Value>, StoreError>;

    /// Replace a document by id. `NotFound` when absent.
    fn update(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Delete a document by id. `NotFound` when absent.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Typed fetch helpers
// ---------------------------------------------------------------------------

/// Fetch one document and deserialize it, with a typed `NotFound`.
pub fn fetch_one<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
    id: &str,
) -> Result<T, StoreError> {
    let doc = store
        .get(collection, id)?
        .ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
    serde_json::from_value(doc).map_err(|source| StoreError::Malformed {
        collection: collection.to_string(),
        source,
    })
}

/// List documents matching `field == value` and deserialize each.
pub fn fetch_where<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
    field: &str,
    value: &Value,
    sort: Option<(&str, SortDir)>,
) -> Result<Vec<T>, StoreError> {
    let docs = store.list(collection, Some((field, value)), sort)?;
    docs.into_iter()
        .map(|doc| {
            serde_json::from_value(doc).map_err(|source| StoreError::Malformed {
                collection: collection.to_string(),
                source,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Insertion-ordered in-memory record store.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Field comparison for sorting: numbers numerically, everything else as
/// its string form. Missing fields sort first.
fn compare_field(a: &Value, b: &Value, field: &str) -> Ordering {
    let (fa, fb) = (a.get(field), b.get(field));
    match (fa, fb) {
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(nx), Some(ny)) => nx.partial_cmp(&ny).unwrap_or(Ordering::Equal),
            _ => x.to_string().cmp(&y.to_string()),
        },
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, collection: &str, mut doc: Value) -> Result<Value, StoreError> {
        if !doc.is_object() {
            return Err(StoreError::Backend("document must be an object".into()));
        }
        if doc_id(&doc).is_none() {
            doc["id"] = Value::String(Uuid::new_v4().to_string());
        }
        let mut guard = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| doc_id(d) == Some(id)).cloned()))
    }

    fn list(
        &self,
        collection: &str,
        filter: Option<(&str, &Value)>,
        sort: Option<(&str, SortDir)>,
    ) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let mut docs: Vec<Value> = guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| match filter {
                        Some((field, value)) => d.get(field) == Some(value),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some((field, dir)) = sort {
            docs.sort_by(|a, b| {
                let ord = compare_field(a, b, field);
                match dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                }
            });
        }
        Ok(docs)
    }

    fn update(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let docs = guard
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        match docs.iter_mut().find(|d| doc_id(d) == Some(id)) {
            Some(slot) => {
                *slot = doc;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let docs = guard
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let before = docs.len();
        docs.retain(|d| doc_id(d) != Some(id));
        if docs.len() == before {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
