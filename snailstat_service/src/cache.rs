/// Memoisation of computed results with age-based expiry.
///
/// Both the per-result cache (statistical outputs, one hour by default) and
/// the dataset-level cache (raw snapshot, a few minutes) are instances of
/// [`ResultCache`]; they differ only in the max-age they are asked for.
///
/// # Clock injection
/// The cache reads time through a [`Clock`] instead of calling `Utc::now()`
/// directly. Production code uses [`SystemClock`]; tests use
/// [`ManualClock`] so expiry is deterministic without sleeping.
///
/// # Concurrency
/// The entry map sits behind a mutex that is held only for lookup and
/// insert, never while a compute function runs. Two concurrent misses on the
/// same key both compute and the later insert wins.

use crate::logging::{self, Component};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.now) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Default max-age for statistical results.
pub const DEFAULT_RESULT_MAX_AGE_SECS: i64 = 60 * 60;

/// Default max-age for the raw dataset snapshot.
pub const DEFAULT_DATASET_MAX_AGE_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    computed_at: DateTime<Utc>,
}

/// Keyed memo table with time-based expiry.
pub struct ResultCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the cached value for `key` if it is younger than `max_age`,
    /// otherwise runs `compute`, stores its result stamped with the current
    /// time, and returns it.
    ///
    /// Freshness is strictly less than:
    ///   age <  max_age  →  cached value
    ///   age >= max_age  →  recompute
    pub fn get_or_compute<F>(&self, key: &str, max_age: Duration, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get_fresh(key, max_age) {
            return value;
        }
        let value = compute();
        self.insert(key, value.clone(), max_age);
        value
    }

    /// Fallible variant of [`get_or_compute`](Self::get_or_compute). Errors
    /// are passed through and never cached, so the next call retries.
    pub fn try_get_or_compute<F, E>(&self, key: &str, max_age: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get_fresh(key, max_age) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone(), max_age);
        Ok(value)
    }

    /// The cached value for `key`, if present and younger than `max_age`.
    pub fn get_fresh(&self, key: &str, max_age: Duration) -> Option<V> {
        let now = self.clock.now();
        let entries = lock(&self.entries);
        let entry = entries.get(key)?;
        if now - entry.computed_at < max_age {
            logging::debug(Component::Cache, Some(key), "hit");
            Some(entry.value.clone())
        } else {
            logging::debug(Component::Cache, Some(key), "stale");
            None
        }
    }

    /// Stores `value` under `key` and drops every entry already older than
    /// `max_age`, so keys that are never requested again do not pile up.
    fn insert(&self, key: &str, value: V, max_age: Duration) {
        let computed_at = self.clock.now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| computed_at - entry.computed_at < max_age);
        let pruned = before - entries.len();
        if pruned > 0 {
            logging::debug(Component::Cache, Some(key), &format!("pruned {pruned} stale entries"));
        }
        entries.insert(key.to_string(), CacheEntry { value, computed_at });
    }

    /// Age of the entry for `key`, whether or not it is still fresh.
    pub fn age_of(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        lock(&self.entries).get(key).map(|e| now - e.computed_at)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
