//! In-memory key/value store with per-entry expiration.
//!
//! Expired entries are dropped lazily when their key is next looked up.
//! There is no background sweep: the store holds one entry per tracked
//! package, so it cannot grow without bound.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A stored value and the instant it stops being visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { value, expires_at }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe TTL store.
///
/// The lock is only held for map access, never across I/O.
#[derive(Debug, Default)]
pub struct TtlStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<String> {
        self.live_entry(key).map(|entry| entry.value)
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry::new(value.into(), ttl);
        self.lock().insert(key.into(), entry);
    }

    /// Remaining lifetime of the live entry for `key`.
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        self.live_entry(key)
            .and_then(|entry| (entry.expires_at - Utc::now()).to_std().ok())
    }

    /// Drop the entry for `key`. Returns whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.lock()
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(Utc::now()))
    }

    /// Number of entries currently held, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(Utc::now()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
