//! Account bundle fetch with cache read-through.
//!
//! One bundle = every raw record the ledger needs for one customer. Order
//! items are loaded with a single batched read and grouped client-side by
//! `order_id` instead of one awaited query per order. The cache serves
//! stale-but-fast bundles inside the TTL window; `force_refresh` bypasses
//! the cache read but still writes the fresh bundle back afterwards.

use std::collections::HashMap;

use serde_json::json;
use tracing::{debug, info};

use crate::cache::{bundle_key, Cache};
use crate::error::StoreError;
use crate::models::{AccountBundle, Customer, CustomerCheck, Order, OrderItem, Payment};
use crate::store::{collections, fetch_one, fetch_where, RecordStore, SortDir};

const BUNDLE_KEY_BASE: &str = "account_bundle";

/// Cache key for one customer's bundle.
pub fn account_cache_key(customer_id: &str) -> String {
    bundle_key(BUNDLE_KEY_BASE, customer_id)
}

/// Fetch a customer's full bundle, serving the cached copy when fresh.
///
/// The cache is best-effort: a hit short-circuits the store entirely, a miss
/// (absent, expired, corrupt) falls through to a full fetch. Store failures
/// propagate typed; the caller keeps its prior state on error.
pub fn fetch_account_bundle(
    store: &dyn RecordStore,
    cache: &Cache,
    customer_id: &str,
    force_refresh: bool,
) -> Result<AccountBundle, StoreError> {
    let key = account_cache_key(customer_id);

    if !force_refresh {
        if let Some(bundle) = cache.get::<AccountBundle>(&key) {
            debug!(customer_id, "account bundle served from cache");
            return Ok(bundle);
        }
    }

    let customer: Customer = fetch_one(store, collections::CUSTOMERS, customer_id)?;
    let by_customer = json!(customer_id);

    let orders: Vec<Order> = fetch_where(
        store,
        collections::ORDERS,
        "customer_id",
        &by_customer,
        Some(("date", SortDir::Desc)),
    )?;
    let payments: Vec<Payment> = fetch_where(
        store,
        collections::PAYMENTS,
        "customer_id",
        &by_customer,
        Some(("created_at", SortDir::Desc)),
    )?;
    let checks: Vec<CustomerCheck> = fetch_where(
        store,
        collections::CUSTOMER_CHECKS,
        "customer_id",
        &by_customer,
        Some(("created_at", SortDir::Desc)),
    )?;

    let items_by_order = fetch_items_grouped(store, &orders)?;

    let bundle = AccountBundle {
        customer,
        orders,
        payments,
        checks,
        items_by_order,
    };

    cache.set(&key, &bundle);
    info!(
        customer_id,
        orders = bundle.orders.len(),
        payments = bundle.payments.len(),
        checks = bundle.checks.len(),
        force_refresh,
        "account bundle fetched"
    );
    Ok(bundle)
}

/// One batched read of the items collection, grouped client-side. Replaces
/// the per-order sequential fetch whose latency grew with the order count.
fn fetch_items_grouped(
    store: &dyn RecordStore,
    orders: &[Order],
) -> Result<HashMap<String, Vec<OrderItem>>, StoreError> {
    let all_items: Vec<OrderItem> = store
        .list(collections::ORDER_ITEMS, None, None)?
        .into_iter()
        .map(|doc| {
            serde_json::from_value(doc).map_err(|source| StoreError::Malformed {
                collection: collections::ORDER_ITEMS.to_string(),
                source,
            })
        })
        .collect::<Result<_, _>>()?;

    let mut grouped: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for item in all_items {
        if orders.iter().any(|o| o.id == item.order_id) {
            grouped.entry(item.order_id.clone()).or_default().push(item);
        }
    }
    Ok(grouped)
}

/// Drop the cached bundle for one customer. Called after any write that
/// touches the customer's records so the next read re-derives from source.
pub fn invalidate_account(cache: &Cache, customer_id: &str) {
    cache.remove(&account_cache_key(customer_id));
}

// ===========================================================================
// Tests
// ===========================================================================
