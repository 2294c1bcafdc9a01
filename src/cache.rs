//! Expiring key-value cache over a local SQLite store.
//!
//! Memoizes expensive aggregate fetches (per-customer account bundles) under
//! a fixed namespace prefix with a TTL envelope `{payload, stored_at,
//! expires_at}`. The cache is an optimization only: writes are best-effort
//! and never fail the caller, corrupt or expired entries read as misses, and
//! every code path must behave identically (eventually) whether or not the
//! cache is populated.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Namespace prefix for every cache key.
pub const CACHE_NAMESPACE: &str = "construction_app_";

/// Default time-to-live: 24 hours.
pub const DEFAULT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Build a per-entity cache key, e.g. `bundle_key("account", "c1")`.
/// Deterministic so per-customer bundles never collide across customers.
pub fn bundle_key(base: &str, entity_id: &str) -> String {
    format!("{base}_{entity_id}")
}

/// Local persistent cache store.
pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        configure(&conn)?;
        info!("Cache store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory cache, used by tests and as a throwaway default.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    /// Store `data` under `key` with the default 24h TTL. Best-effort: any
    /// serialization or storage failure is logged and swallowed.
    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        self.set_with_ttl(key, data, DEFAULT_TTL_MS);
    }

    /// Store `data` under `key` with an explicit TTL in milliseconds.
    pub fn set_with_ttl<T: Serialize>(&self, key: &str, data: &T, ttl_ms: i64) {
        self.set_at(key, data, ttl_ms, now_ms());
    }

    pub(crate) fn set_at<T: Serialize>(&self, key: &str, data: &T, ttl_ms: i64, now_ms: i64) {
        let payload = match serde_json::to_string(data) {
            Ok(p) => p,
            Err(e) => {
                warn!(key, error = %e, "cache: serialize failed, entry not written");
                return;
            }
        };
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let result = conn.execute(
            "INSERT INTO kv_cache (key, payload, stored_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                stored_at = excluded.stored_at,
                expires_at = excluded.expires_at",
            params![namespaced(key), payload, now_ms, now_ms + ttl_ms],
        );
        if let Err(e) = result {
            warn!(key, error = %e, "cache: write failed, entry not written");
        }
    }

    /// Fetch `key`, or `None` when absent, expired (evicted as a side
    /// effect), or unreadable. Deserialization errors are cache misses.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, now_ms())
    }

    pub(crate) fn get_at<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
        let payload = self.raw_payload(key, now_ms)?;
        match serde_json::from_str(&payload) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "cache: corrupt entry, treating as miss");
                None
            }
        }
    }

    /// Drop one entry.
    pub fn remove(&self, key: &str) {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = conn.execute(
            "DELETE FROM kv_cache WHERE key = ?1",
            params![namespaced(key)],
        ) {
            warn!(key, error = %e, "cache: remove failed");
        }
    }

    /// Evict every namespaced entry.
    pub fn clear_all(&self) {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        match conn.execute(
            "DELETE FROM kv_cache WHERE key LIKE ?1",
            params![format!("{CACHE_NAMESPACE}%")],
        ) {
            Ok(n) => info!(evicted = n, "cache: cleared"),
            Err(e) => warn!(error = %e, "cache: clear failed"),
        }
    }

    /// `true` when `get` would return a value.
    pub fn has(&self, key: &str) -> bool {
        self.raw_payload(key, now_ms()).is_some()
    }

    /// How long ago the entry was stored, `None` when absent or expired.
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.age_at(key, now_ms())
    }

    pub(crate) fn age_at(&self, key: &str, now_ms: i64) -> Option<Duration> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row: Option<(i64, i64)> = conn
            .query_row(
                "SELECT stored_at, expires_at FROM kv_cache WHERE key = ?1",
                params![namespaced(key)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap_or_default();
        let (stored_at, expires_at) = row?;
        if now_ms > expires_at {
            return None;
        }
        Some(Duration::from_millis((now_ms - stored_at).max(0) as u64))
    }

    // -----------------------------------------------------------------------
    // Array helpers
    // -----------------------------------------------------------------------
    //
    // Read-modify-write over a cached list of records-with-id. All three are
    // no-ops when nothing is cached yet (they never fetch-then-write), and
    // they preserve the entry's original stored_at/expires_at so editing a
    // cached list does not extend its lifetime.

    /// Replace the array element whose `id` matches `item["id"]`.
    pub fn update_array_item(&self, key: &str, item: &Value) {
        let Some(id) = item.get("id").and_then(Value::as_str) else {
            warn!(key, "cache: update_array_item called without an id");
            return;
        };
        self.modify_array(key, |arr| {
            for slot in arr.iter_mut() {
                if slot.get("id").and_then(Value::as_str) == Some(id) {
                    *slot = item.clone();
                }
            }
        });
    }

    /// Append an element to the cached array.
    pub fn add_array_item(&self, key: &str, item: &Value) {
        self.modify_array(key, |arr| arr.push(item.clone()));
    }

    /// Remove the array element with the given `id`.
    pub fn remove_array_item(&self, key: &str, id: &str) {
        self.modify_array(key, |arr| {
            arr.retain(|slot| slot.get("id").and_then(Value::as_str) != Some(id));
        });
    }

    fn modify_array<F: FnOnce(&mut Vec<Value>)>(&self, key: &str, apply: F) {
        let now = now_ms();
        let Some(payload) = self.raw_payload(key, now) else {
            return; // nothing cached yet
        };
        let mut arr: Vec<Value> = match serde_json::from_str(&payload) {
            Ok(a) => a,
            Err(e) => {
                warn!(key, error = %e, "cache: array entry corrupt, leaving untouched");
                return;
            }
        };
        apply(&mut arr);
        let new_payload = match serde_json::to_string(&arr) {
            Ok(p) => p,
            Err(e) => {
                warn!(key, error = %e, "cache: array re-serialize failed");
                return;
            }
        };
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = conn.execute(
            "UPDATE kv_cache SET payload = ?1 WHERE key = ?2",
            params![new_payload, namespaced(key)],
        ) {
            warn!(key, error = %e, "cache: array write failed");
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Raw payload for a live entry; evicts and misses when expired.
    fn raw_payload(&self, key: &str, now_ms: i64) -> Option<String> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT payload, expires_at FROM kv_cache WHERE key = ?1",
                params![namespaced(key)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap_or_else(|e| {
                warn!(key, error = %e, "cache: read failed, treating as miss");
                None
            });
        let (payload, expires_at) = row?;
        if now_ms > expires_at {
            let _ = conn.execute(
                "DELETE FROM kv_cache WHERE key = ?1",
                params![namespaced(key)],
            );
            return None;
        }
        Some(payload)
    }
}

fn namespaced(key: &str) -> String {
    format!("{CACHE_NAMESPACE}{key}")
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn configure(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         CREATE TABLE IF NOT EXISTS kv_cache (
            key        TEXT PRIMARY KEY,
            payload    TEXT NOT NULL,
            stored_at  INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
         );",
    )
}

// ===========================================================================
// Tests
// ===========================================================================
