//! Seen-key tracking for duplicate rejection
//!
//! Two layers: a process-local, size-bounded TTL cache as a fast-path
//! filter, and the `seen_keys` table as the authoritative store. The store
//! insert uses `INSERT OR IGNORE`, so the check-then-act race between
//! concurrent workers for the same key resolves on the database's atomic
//! conditional write, never on an in-process lock.

use chrono::{DateTime, Duration, Utc};
use pulse_common::{time, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Process-local bounded TTL cache over recently seen keys
///
/// An optimization in front of the store, not the source of truth: a miss
/// here still goes to the database, and a hit only short-circuits a lookup
/// that would have found the key anyway.
pub struct SeenCache {
    inner: Mutex<SeenCacheInner>,
    capacity: usize,
    ttl: Duration,
}

struct SeenCacheInner {
    entries: HashMap<String, DateTime<Utc>>,
    order: VecDeque<String>,
}

impl SeenCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(SeenCacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    /// Whether the key was recorded within its TTL
    pub fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.entries.get(key) {
            Some(expires_at) => *expires_at > time::now(),
            None => false,
        }
    }

    /// Record a key, evicting expired and oldest entries past capacity
    pub fn insert(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = time::now();

        // Evict from the front: expired first, then oldest over capacity
        while let Some(front) = inner.order.front().cloned() {
            let expired = inner
                .entries
                .get(&front)
                .map(|exp| *exp <= now)
                .unwrap_or(true);
            if expired || inner.entries.len() >= self.capacity {
                inner.order.pop_front();
                inner.entries.remove(&front);
            } else {
                break;
            }
        }

        inner.entries.insert(key.to_string(), now + self.ttl);
        inner.order.push_back(key.to_string());
    }
}

/// Atomically record a key in the store; false means it was already present
///
/// Runs inside the caller's transaction so a duplicate verdict rolls back
/// any sibling key already inserted for the same envelope.
pub async fn try_mark_seen(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
    tenant_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO seen_keys (key, tenant_id, expires_at) VALUES (?, ?, ?)",
    )
    .bind(key)
    .bind(tenant_id)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete expired seen-keys; returns the number removed
///
/// The sliding window only needs to cover the freshness window: anything
/// older is already rejected as stale before the duplicate check runs.
pub async fn sweep_expired(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM seen_keys WHERE expires_at <= ?")
        .bind(time::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
