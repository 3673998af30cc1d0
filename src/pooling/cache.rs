//! Time-expiring cache with background reclamation

use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;
use crate::stability::ShutdownSignal;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Longest TTL honored; longer values are clamped so `now + ttl` cannot overflow
pub const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of stored entries
    pub capacity: usize,
    /// Interval between background sweeps
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set capacity
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set sweep interval
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // Reaching the deadline counts as expired; the sweeper deletes exactly these.
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

struct Sweeper {
    signal: ShutdownSignal,
    handle: JoinHandle<()>,
}

/// In-memory key/value store whose entries expire after a per-entry TTL
///
/// Capacity is a hard limit: `put` of a new key into a full cache fails
/// with [`CacheError::CapacityExceeded`] instead of evicting. Space is
/// reclaimed only by expiry (the sweeper) or by `delete`/`flush`.
///
/// Expiry is checked on every `get`, so a delayed or stopped sweeper never
/// makes a stale value visible.
pub struct TtlCache<K, V> {
    config: CacheConfig,
    entries: parking_lot::RwLock<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    sweeper: parking_lot::Mutex<Option<Sweeper>>,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    /// Create a cache on the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            entries: parking_lot::RwLock::new(HashMap::new()),
            clock,
            sweeper: parking_lot::Mutex::new(None),
        }
    }

    /// Create a cache with default configuration
    pub fn with_default_config() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store `value` under `key` until `ttl` has elapsed
    ///
    /// Overwrites an existing entry for `key`. Fails without touching the
    /// map when `key` is new and the cache already holds `capacity` entries.
    pub fn put(&self, key: K, value: V, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = self.clock.now() + ttl.min(MAX_TTL);

        let mut entries = self.entries.write();
        if entries.len() >= self.config.capacity && !entries.contains_key(&key) {
            return Err(CacheError::CapacityExceeded {
                capacity: self.config.capacity,
            });
        }

        entries.insert(key, CacheEntry { value, expires_at });
        Ok(())
    }

    /// Get a live value
    ///
    /// Returns `None` for keys never stored and for keys whose TTL has
    /// passed but have not been swept yet.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Get a live value or compute, store and return a new one
    pub fn get_or_put_with<F>(&self, key: K, ttl: Duration, f: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = f();
        self.put(key, value.clone(), ttl)?;
        Ok(value)
    }

    /// Remove an entry; no-op when absent
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key);
    }

    /// Remove every entry
    pub fn flush(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read();

        CacheStats {
            size: entries.len(),
            capacity: self.config.capacity,
            expired: entries.values().filter(|e| e.is_expired(now)).count(),
        }
    }

    /// Remove every entry whose expiry instant has passed
    ///
    /// Candidates are collected under the read lock; each one is re-checked
    /// under the write lock so a key re-`put` in between survives.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();

        let expired: Vec<K> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect()
        };

        if expired.is_empty() {
            return 0;
        }

        let mut entries = self.entries.write();
        let mut removed = 0;
        for key in expired {
            if entries.get(&key).is_some_and(|entry| entry.is_expired(now)) {
                entries.remove(&key);
                removed += 1;
            }
        }

        removed
    }

    /// Check whether the background sweeper is running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    /// Start the background sweeper on the current tokio runtime
    ///
    /// Returns `false` if a sweeper is already running, the configured
    /// interval is zero, or there is no runtime to spawn onto. The task
    /// holds only a weak reference, so it also ends once the last handle to
    /// the cache is dropped.
    pub fn start_sweeper(self: &Arc<Self>) -> bool
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let period = self.config.sweep_interval;
        if period.is_zero() {
            tracing::warn!("Cache sweeper not started: sweep interval is zero");
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Cache sweeper not started: no tokio runtime");
            return false;
        };

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return false;
        }

        let signal = ShutdownSignal::new();
        let handle = runtime.spawn(run_sweeper(
            Arc::downgrade(self),
            period,
            signal.clone(),
        ));

        *sweeper = Some(Sweeper { signal, handle });
        true
    }

    /// Stop the background sweeper and wait for it to exit
    ///
    /// Returns `false` if no sweeper was running. The cache stays usable.
    pub async fn stop_sweeper(&self) -> bool {
        let sweeper = self.sweeper.lock().take();
        let Some(sweeper) = sweeper else {
            return false;
        };

        sweeper.signal.trigger();
        if let Err(e) = sweeper.handle.await {
            tracing::error!("Cache sweeper task ended abnormally: {}", e);
        }

        true
    }
}

async fn run_sweeper<K, V>(cache: Weak<TtlCache<K, V>>, period: Duration, signal: ShutdownSignal)
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tracing::info!("Cache sweeper started (interval: {:?})", period);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = signal.wait() => break,
            _ = interval.tick() => {
                let Some(cache) = cache.upgrade() else {
                    break;
                };

                match std::panic::catch_unwind(AssertUnwindSafe(|| cache.sweep())) {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::debug!("Cache sweep removed {} expired entries", removed);
                    }
                    Err(_) => {
                        tracing::error!("Cache sweep panicked; sweeper continues");
                    }
                }
            }
        }
    }

    tracing::info!("Cache sweeper stopped");
}

impl<K, V> Drop for TtlCache<K, V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.signal.trigger();
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Stored entries, including expired ones not yet swept
    pub size: usize,
    /// Maximum capacity
    pub capacity: usize,
    /// Entries past their expiry that the sweeper has not removed yet
    pub expired: usize,
}

impl CacheStats {
    /// Share of capacity currently in use
    pub fn usage_percentage(&self) -> f64 {
        if self.capacity == 0 {
            return 100.0;
        }
        (self.size as f64 / self.capacity as f64) * 100.0
    }
}
