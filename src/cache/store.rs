//! Expiring key/value store.
//!
//! Expiration is enforced lazily on read (`get`/`has`) and by the
//! pull-based `cleanup` sweep. The store never schedules work on its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::observability::metrics;

/// Default time-to-live (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Upper bound used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A stored value and the instant it stops being served.
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self { value, expires_at }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// In-memory cache where every entry carries an expiration instant.
///
/// Cloning is cheap and shares the underlying store, so one instance can be
/// handed to every consumer that should see the same entries.
pub struct TtlCache<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    /// Loads started by `get_or_set_shared`, keyed by cache key.
    in_flight: Arc<DashMap<String, Arc<OnceCell<V>>>>,
    default_ttl: Duration,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            in_flight: Arc::clone(&self.in_flight),
            default_ttl: self.default_ttl,
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("in_flight", &self.in_flight.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<V> TtlCache<V> {
    /// Create an empty cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            default_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl())
    }

    /// TTL applied by [`TtlCache::set`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` under `key` with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key`, replacing any existing entry.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(key.into(), CacheEntry::new(value, ttl));
        metrics::record_cache_size(self.entries.len());
    }

    /// Remove `key`, reporting whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        metrics::record_cache_size(self.entries.len());
        removed
    }

    /// Remove every entry regardless of expiration.
    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_cache_size(0);
    }

    /// Remove every entry whose expiration instant has passed.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Cache cleanup");
            metrics::record_cache_evictions(removed);
        }
        metrics::record_cache_size(self.entries.len());
        removed
    }

    /// Number of stored entries.
    ///
    /// Counts entries that are expired but have not yet been read or swept.
    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Return the value for `key` if it has not expired.
    ///
    /// An expired entry is deleted as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                metrics::record_cache_lookup(true);
                return Some(entry.value.clone());
            }
        }

        // A concurrent `set` may have replaced the entry; only drop it if still expired.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            metrics::record_cache_evictions(1);
            metrics::record_cache_size(self.entries.len());
        }
        metrics::record_cache_lookup(false);
        None
    }

    /// Whether an unexpired entry exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Return the cached value, or run `factory`, store its result and return it.
    ///
    /// Concurrent calls for the same missing key each run their own factory
    /// and the last write wins. Use [`TtlCache::get_or_set_shared`] to share
    /// a single load. A factory error is returned unchanged and nothing is
    /// stored.
    pub async fn get_or_set<F, Fut, E>(&self, key: &str, factory: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = factory().await?;
        self.set_with_ttl(key, value.clone(), ttl);
        Ok(value)
    }

    /// Single-flight variant of [`TtlCache::get_or_set`].
    ///
    /// Callers that miss on the same key while a load is running wait for
    /// that load instead of starting their own. If the running load fails,
    /// its caller receives the error and one of the waiters runs its own
    /// factory next; at most one factory runs per key at any time.
    pub async fn get_or_set_shared<F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        ttl: Duration,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let cell = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let result = cell
            .get_or_try_init(|| async move {
                // The load we waited behind may have filled the cache already.
                if let Some(value) = self.get(key) {
                    return Ok::<V, E>(value);
                }
                let value = factory().await?;
                self.set_with_ttl(key, value.clone(), ttl);
                Ok(value)
            })
            .await
            .cloned();

        // After a failure the cell stays registered while a waiter holds it:
        // that waiter runs the next load, and late callers must queue behind it.
        let failed = result.is_err();
        self.in_flight.remove_if(key, |_, current| {
            Arc::ptr_eq(current, &cell) && (!failed || Arc::strong_count(current) == 2)
        });
        result
    }
}
