//! In-memory TTL cache with a supervised sweeper task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tributary_core::constants::CACHE_SWEEP_INTERVAL;

/// Cache entry with an absolute expiry.
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds between background sweeps
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: CACHE_SWEEP_INTERVAL.as_secs(),
        }
    }
}

/// The guarded map. Shared with the sweeper task.
struct Store<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> Store<V> {
    /// First sweep phase: keys that are expired right now.
    fn collect_expired(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Second sweep phase: removes candidates that are still expired.
    ///
    /// A key re-`set` after `collect_expired` carries a fresh expiry and survives.
    fn remove_if_expired(&self, candidates: &[String]) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let mut removed = 0;
        for key in candidates {
            if entries.get(key).is_some_and(|e| e.is_expired_at(now)) {
                entries.remove(key);
                removed += 1;
            }
        }
        removed
    }

    fn sweep(&self) -> usize {
        let candidates = self.collect_expired();
        if candidates.is_empty() {
            return 0;
        }
        self.remove_if_expired(&candidates)
    }
}

enum Sweeper {
    Idle,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// TTL key-value cache.
///
/// Every operation takes the same single lock for the duration of its map
/// operation only; the lock is never held across an `.await`.
pub struct CacheManager<V> {
    store: Arc<Store<V>>,
    sweeper: Mutex<Sweeper>,
    config: CacheConfig,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(Store {
                entries: Mutex::new(HashMap::new()),
            }),
            sweeper: Mutex::new(Sweeper::Idle),
            config,
        }
    }

    /// Returns the value for `key` if present and not yet expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.store.entries.lock();
        match entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts or overwrites `key`, expiring `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.store
            .entries
            .lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Removes `key`. Returns true if it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.store.entries.lock().remove(key).is_some()
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.store.entries.lock().clear();
    }

    /// Runs one two-phase sweep pass now. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        self.store.sweep()
    }

    /// Returns the number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.store.entries.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.store.entries.lock().is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.store.entries.lock();
        let expired = entries.values().filter(|e| e.is_expired_at(now)).count();
        CacheStats {
            total_entries: entries.len(),
            expired_entries: expired,
            valid_entries: entries.len().saturating_sub(expired),
        }
    }

    /// Launches the background sweeper.
    ///
    /// Idempotent: a second call while running does nothing, and a stopped
    /// cache stays stopped. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock();
        match &*sweeper {
            Sweeper::Running { .. } => {
                debug!("Cache sweeper already running");
                return;
            }
            Sweeper::Stopped => {
                warn!("Cache sweeper was stopped; not restarting");
                return;
            }
            Sweeper::Idle => {}
        }

        let cancel = CancellationToken::new();
        let interval = Duration::from_secs(self.config.sweep_interval_seconds.max(1));
        let handle = tokio::spawn(run_sweeper(
            Arc::clone(&self.store),
            interval,
            cancel.clone(),
        ));
        *sweeper = Sweeper::Running { cancel, handle };
    }

    /// Cancels the sweeper and waits for it to exit.
    ///
    /// A pass already in progress completes before the task stops.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.sweeper.lock(), Sweeper::Stopped);
        if let Sweeper::Running { cancel, handle } = previous {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "Cache sweeper task failed");
            }
        }
    }

    /// Returns true while the sweeper task is running.
    pub fn is_running(&self) -> bool {
        matches!(*self.sweeper.lock(), Sweeper::Running { .. })
    }
}

impl<V> CacheManager<V> {
    #[cfg(test)]
    fn collect_expired(&self) -> Vec<String> {
        self.store.collect_expired()
    }

    #[cfg(test)]
    fn remove_if_expired(&self, candidates: &[String]) -> usize {
        self.store.remove_if_expired(candidates)
    }
}

impl<V> Default for CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for CacheManager<V> {
    fn drop(&mut self) {
        if let Sweeper::Running { cancel, .. } = &*self.sweeper.lock() {
            cancel.cancel();
        }
    }
}

async fn run_sweeper<V>(store: Arc<Store<V>>, interval: Duration, cancel: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "Cache sweeper started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        let removed = store.sweep();
        if removed > 0 {
            info!(removed, "Cleaned expired cache entries");
        }
    }
    info!("Cache sweeper stopped");
}

/// Cache statistics.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub valid_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> CacheManager<String> {
        CacheManager::new()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_set_get() {
        let cache = cache();
        cache.set("k", "v".to_string(), Duration::from_secs(1));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_ttl_expiration() {
        let cache = cache();
        cache.set("k", "v".to_string(), Duration::from_secs(1));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(cache.get("k").is_none());
        // lazily removed on read
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_exactly_at_deadline() {
        let cache = cache();
        cache.set("k", "v".to_string(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_cache_miss() {
        let cache = cache();
        assert!(cache.get("nonexistent").is_none());
    }

    #[test]
    fn test_cache_overwrite() {
        let cache = cache();
        cache.set("k", "one".to_string(), Duration::from_secs(60));
        cache.set("k", "two".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k").as_deref(), Some("two"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_delete() {
        let cache = cache();
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_cache_clear() {
        let cache = cache();
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        cache.set("b", "2".to_string(), Duration::from_secs(60));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_stats() {
        let cache = cache();
        cache.set("short", "1".to_string(), Duration::from_secs(1));
        cache.set("long", "2".to_string(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.valid_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = cache();
        cache.set("short", "1".to_string(), Duration::from_secs(1));
        cache.set("long", "2".to_string(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("long").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_spares_key_refreshed_between_phases() {
        let cache = cache();
        cache.set("k", "stale".to_string(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let candidates = cache.collect_expired();
        assert_eq!(candidates, vec!["k".to_string()]);

        // concurrent writer refreshes the key before the delete phase
        cache.set("k", "fresh".to_string(), Duration::from_secs(60));

        assert_eq!(cache.remove_if_expired(&candidates), 0);
        assert_eq!(cache.get("k").as_deref(), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_evicts_without_reads() {
        let cache = Arc::new(CacheManager::with_config(CacheConfig {
            sweep_interval_seconds: 60,
        }));
        cache.set("short", "1".to_string(), Duration::from_secs(10));
        cache.set("long", "2".to_string(), Duration::from_secs(3600));

        cache.start();
        assert!(cache.is_running());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.len(), 1);

        cache.stop().await;
        assert!(!cache.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let cache: CacheManager<String> = CacheManager::new();
        cache.start();
        cache.start();
        assert!(cache.is_running());
        cache.stop().await;
        assert!(!cache.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_sweeper_does_not_resurrect() {
        let cache: CacheManager<String> = CacheManager::new();
        cache.start();
        cache.stop().await;

        cache.start();
        assert!(!cache.is_running());

        // stopping twice is harmless
        cache.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_and_readers() {
        let cache = Arc::new(CacheManager::<usize>::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for j in 0..100 {
                    let key = format!("key-{}", j % 10);
                    cache.set(key.clone(), i * 1000 + j, Duration::from_secs(60));
                    assert!(cache.get(&key).is_some());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len(), 10);
    }
}
