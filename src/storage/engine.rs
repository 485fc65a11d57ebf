//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the core store for TallyKV: a `HashMap` of keys to
//! typed scalar entries, guarded by a single reader-writer lock.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: Every operation takes the lock for its full duration, so
//!    each call is linearizable with respect to every other call.
//! 2. **Lazy Expiry**: Expired entries are treated as absent by every read and
//!    write, and evicted when touched.
//! 3. **Active Expiry**: `cleanup_expired` lets the background sweeper reclaim
//!    entries that are never touched again.
//! 4. **parking_lot**: The lock cannot be poisoned, so a panicking connection
//!    task never wedges the store for everyone else.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                StorageEngine                 │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ RwLock<HashMap<String, Entry>>         │  │
//! │  │   GET / EXISTS / TTL   -> shared       │  │
//! │  │   SET / DEL / INCR ... -> exclusive    │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

use crate::storage::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Errors returned by store mutations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Increment applied to a string value
    #[error("ERR value is not a number")]
    NotANumber,

    /// Increment produced a non-finite float
    #[error("ERR increment would overflow")]
    IncrementOverflow,
}

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The actual value stored
    pub value: Value,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates a new entry with TTL.
    ///
    /// A TTL too large to represent as a deadline leaves the entry without
    /// expiry.
    pub fn with_ttl(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: deadline_after(ttl),
        }
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// Deadline `ttl` from now, or `None` when it overflows the clock.
fn deadline_after(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

/// Operation counters, reported by the server on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    pub incr_ops: u64,
    pub expired: u64,
}

/// The main storage engine for TallyKV.
///
/// Wrap it in an `Arc` and share it across all connection tasks. The map
/// itself is never exposed; callers only see the operations below.
///
/// # Example
///
/// ```
/// use tallykv::storage::{StorageEngine, Value};
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set("count", "5", None);
/// assert_eq!(engine.get("count"), Some(Value::Integer(5)));
///
/// assert_eq!(engine.increment("count", 1.0), Ok(Value::Float(6.0)));
///
/// engine.set("session", "abc123", Some(Duration::from_secs(60)));
/// assert!(engine.exists("session"));
/// ```
pub struct StorageEngine {
    data: RwLock<HashMap<String, Entry>>,

    /// Expiry applied by `set` when the caller passes no TTL
    default_ttl: Option<Duration>,

    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    incr_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("default_ttl", &self.default_ttl)
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an engine whose entries never expire unless given a TTL.
    pub fn new() -> Self {
        Self::with_default_ttl(None)
    }

    /// Creates an engine that applies `default_ttl` to every `set` made
    /// without an explicit TTL.
    pub fn with_default_ttl(default_ttl: Option<Duration>) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            default_ttl,
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            incr_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// The expiry policy applied to `set` calls without a TTL.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Stores `raw` under `key`, coerced per [`Value::coerce`].
    ///
    /// Any previous entry is replaced regardless of its type. With `ttl` of
    /// `None` the configured default expiry (if any) is used.
    pub fn set(&self, key: impl Into<String>, raw: &str, ttl: Option<Duration>) {
        self.set_value(key, Value::coerce(raw), ttl);
    }

    /// Stores an already-typed value under `key`.
    pub fn set_value(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let entry = match ttl.or(self.default_ttl) {
            Some(ttl) => Entry::with_ttl(value, ttl),
            None => Entry::new(value),
        };

        self.data.write().insert(key.into(), entry);
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    /// Expired keys are detected and removed on access.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        // Fast path under the shared lock
        {
            let data = self.data.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: re-check under the exclusive lock, another task may have
        // replaced the entry in between
        let mut data = self.data.write();
        if let Some(entry) = data.get(key) {
            if entry.is_expired() {
                data.remove(key);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                trace!(key = key, "Evicted expired key on read");
                return None;
            }
            return Some(entry.value.clone());
        }

        None
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Deletes a key.
    ///
    /// Returns `true` only if a live entry was removed. An expired entry is
    /// dropped as well but reported as absent.
    pub fn delete(&self, key: &str) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        match self.data.write().remove(key) {
            Some(entry) if entry.is_expired() => {
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Sets or replaces the expiry of an existing key.
    ///
    /// Returns `false` and changes nothing when the key is absent or expired.
    /// A TTL too large to represent clears the expiry instead.
    pub fn set_ttl(&self, key: &str, ttl: Duration) -> bool {
        let mut data = self.data.write();

        if let Some(entry) = data.get_mut(key) {
            if entry.is_expired() {
                data.remove(key);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            entry.expires_at = deadline_after(ttl);
            true
        } else {
            false
        }
    }

    /// Gets the remaining TTL for a key in whole seconds.
    ///
    /// # Returns
    ///
    /// - `Some(seconds)` if the key exists and has an expiry
    /// - `Some(-1)` if the key exists but has no expiry
    /// - `None` if the key doesn't exist
    pub fn ttl(&self, key: &str) -> Option<i64> {
        let data = self.data.read();
        let entry = data.get(key).filter(|e| !e.is_expired())?;

        Some(match entry.expires_at {
            Some(exp) => exp.saturating_duration_since(Instant::now()).as_secs() as i64,
            None => -1,
        })
    }

    /// Adds `delta` to a numeric value, atomically.
    ///
    /// - Absent (or expired) key: created as `Float(delta)` with no expiry.
    /// - Integer or float: the sum is stored as a `Float`, the expiry is kept.
    /// - String: fails with [`StoreError::NotANumber`], entry untouched.
    pub fn increment(&self, key: &str, delta: f64) -> Result<Value, StoreError> {
        self.incr_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.data.write();

        let live = data.get(key).filter(|e| !e.is_expired());
        let (current, expires_at) = match live {
            Some(entry) => match entry.value.as_f64() {
                Some(n) => (n, entry.expires_at),
                None => {
                    trace!(
                        key = key,
                        value_type = entry.value.type_name(),
                        "Increment rejected, value is not numeric"
                    );
                    return Err(StoreError::NotANumber);
                }
            },
            None => (0.0, None),
        };

        let sum = current + delta;
        if !sum.is_finite() {
            return Err(StoreError::IncrementOverflow);
        }

        let value = Value::Float(sum);
        data.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at,
            },
        );

        Ok(value)
    }

    /// Subtracts `delta` from a numeric value. See [`Self::increment`].
    pub fn decrement(&self, key: &str, delta: f64) -> Result<Value, StoreError> {
        self.increment(key, -delta)
    }

    /// Clears all data from the store in one step.
    pub fn flush(&self) {
        self.data.write().clear();
    }

    /// Returns the number of stored entries, including expired ones the
    /// sweeper has not reclaimed yet.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns operation statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            incr_ops: self.incr_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Removes every expired entry.
    ///
    /// Called by the background expiry sweeper. Returns the number of keys
    /// that were removed.
    pub fn cleanup_expired(&self) -> u64 {
        let mut data = self.data.write();
        let before = data.len();

        data.retain(|_, entry| !entry.is_expired());

        let cleaned = (before - data.len()) as u64;
        if cleaned > 0 {
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }
        cleaned
    }
}
