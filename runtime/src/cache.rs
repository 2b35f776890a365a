//! Process-local key/value cache with per-entry expiry and tag invalidation.
//!
//! Expiry is checked lazily on [`TagCache::get`] and [`TagCache::has`]; a
//! background sweeper ([`TagCache::spawn_sweeper`]) evicts entries that are
//! never read again. Tags group entries so a whole family of derived views can
//! be dropped at once with [`TagCache::delete_by_tag`].
//!
//! Every operation is total: the cache never returns an error. The internal
//! map sits behind a short synchronous lock that is never held across an
//! `.await`.

use chrono::{DateTime, TimeDelta, Utc};
use content_pipeline_core::environment::Clock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tag carried by every cached post view
pub const POSTS_TAG: &str = "posts";

/// Tag carried by every cached idea view
pub const IDEAS_TAG: &str = "ideas";

/// Default time-to-live when neither the caller nor the configuration sets one
pub const DEFAULT_TTL_SECONDS: u64 = 300;

/// Per-entry options for [`TagCache::set`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Time-to-live in seconds. `None` uses the cache default.
    pub ttl_seconds: Option<u64>,
    /// Tags for bulk invalidation
    pub tags: Vec<String>,
}

impl CacheOptions {
    /// Options with a single tag and the default TTL.
    #[must_use]
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            ttl_seconds: None,
            tags: vec![tag.into()],
        }
    }

    /// Override the TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Counters describing cache effectiveness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held, expired or not
    pub entries: usize,
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Entries removed because they expired
    pub evictions: u64,
    /// Entries removed by `delete` or `delete_by_tag`
    pub invalidations: u64,
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: DateTime<Utc>,
    tags: HashSet<String>,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

struct Inner {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    default_ttl_seconds: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, entry| {
            let expired = entry.is_expired(now);
            if expired {
                tracing::trace!(
                    key = %key,
                    lived_ms = (now - entry.created_at).num_milliseconds(),
                    "Evicting expired cache entry"
                );
            }
            !expired
        });
        let evicted = before - entries.len();
        drop(entries);

        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }
}

/// Shared tag-aware cache.
///
/// Cloning is cheap; clones share the same entries and counters.
///
/// # Example
///
/// ```
/// use content_pipeline_core::environment::SystemClock;
/// use content_pipeline_runtime::cache::{CacheOptions, TagCache};
/// use std::sync::Arc;
///
/// let cache = TagCache::new(Arc::new(SystemClock));
/// cache.set("post:1", "hello".to_string(), CacheOptions::tagged("posts").with_ttl(10));
/// assert_eq!(cache.get::<String>("post:1").as_deref(), Some("hello"));
///
/// assert_eq!(cache.delete_by_tag("posts"), 1);
/// assert!(!cache.has("post:1"));
/// ```
#[derive(Clone)]
pub struct TagCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for TagCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagCache")
            .field("entries", &self.len())
            .field("default_ttl_seconds", &self.inner.default_ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl TagCache {
    /// Create a cache with the default TTL ([`DEFAULT_TTL_SECONDS`]).
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_default_ttl(clock, DEFAULT_TTL_SECONDS)
    }

    /// Create a cache whose entries live `default_ttl_seconds` unless the
    /// caller overrides it.
    #[must_use]
    pub fn with_default_ttl(clock: Arc<dyn Clock>, default_ttl_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                clock,
                default_ttl_seconds,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
            }),
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set<T>(&self, key: impl Into<String>, value: T, options: CacheOptions)
    where
        T: Send + Sync + 'static,
    {
        let now = self.inner.clock.now();
        let ttl = options.ttl_seconds.unwrap_or(self.inner.default_ttl_seconds);
        let ttl = TimeDelta::try_seconds(i64::try_from(ttl).unwrap_or(i64::MAX))
            .unwrap_or(TimeDelta::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = CacheEntry {
            value: Arc::new(value),
            expires_at,
            tags: options.tags.into_iter().collect(),
            created_at: now,
        };
        self.inner.entries().insert(key.into(), entry);
    }

    /// Fetch the value under `key`.
    ///
    /// An expired entry is evicted and reported as a miss. A value stored
    /// with a different type is also a miss.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries();

        let value = match entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(true) => {
                entries.remove(key);
                self.inner.evictions.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(false) => entries
                .get(key)
                .and_then(|entry| entry.value.downcast_ref::<T>().cloned()),
            None => None,
        };
        drop(entries);

        let counter = if value.is_some() {
            &self.inner.hits
        } else {
            &self.inner.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Returns `true` if an unexpired entry exists under `key`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries();
        match entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(true) => {
                entries.remove(key);
                self.inner.evictions.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(false) => true,
            None => false,
        }
    }

    /// Remove one entry. Returns `true` if something was removed.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.entries().remove(key).is_some();
        if removed {
            self.inner.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove every entry carrying `tag`. Returns how many were removed.
    pub fn delete_by_tag(&self, tag: &str) -> usize {
        let mut entries = self.inner.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.contains(tag));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            self.inner
                .invalidations
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(tag, removed, "Invalidated cache entries by tag");
        }
        removed
    }

    /// Cache-aside read: return the cached value, or run `factory`, cache its
    /// result and return it.
    ///
    /// The lock is released while `factory` runs, so two concurrent callers
    /// can both compute on the same miss; the last writer wins.
    ///
    /// # Errors
    ///
    /// Returns whatever `factory` returns. Errors are not cached.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        options: CacheOptions,
        factory: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key) {
            return Ok(value);
        }

        let value = factory().await?;
        self.set(key, value.clone(), options);
        Ok(value)
    }

    /// Evict every expired entry now. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let evicted = self.inner.sweep();
        if evicted > 0 {
            tracing::debug!(evicted, "Swept expired cache entries");
        }
        evicted
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.entries().clear();
    }

    /// Number of entries held, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            invalidations: self.inner.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Start a background task that sweeps expired entries every `period`.
    ///
    /// The task holds only a weak reference: it stops on its own once every
    /// handle to the cache is dropped, or when [`SweeperHandle::shutdown`] is
    /// called.
    #[must_use = "dropping the handle leaves the sweeper running until the cache is dropped"]
    pub fn spawn_sweeper(&self, period: Duration) -> SweeperHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let cache: Weak<Inner> = Arc::downgrade(&self.inner);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(inner) = cache.upgrade() else {
                            break;
                        };
                        let evicted = inner.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, "Background sweep evicted cache entries");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Cache sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }
}

/// Handle to a running background sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "Cache sweeper task ended abnormally");
        }
    }

    /// Returns `true` once the sweeper task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use content_pipeline_testing::{ManualClock, test_epoch};

    fn cache() -> (TagCache, ManualClock) {
        let clock = ManualClock::new(test_epoch());
        (TagCache::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn round_trip_then_expiry() {
        let (cache, clock) = cache();
        cache.set("k", 42_u32, CacheOptions::default().with_ttl(10));
        assert_eq!(cache.get::<u32>("k"), Some(42));

        clock.advance(TimeDelta::seconds(10));
        assert_eq!(cache.get::<u32>("k"), Some(42), "still valid at the expiry instant");

        clock.advance(TimeDelta::milliseconds(1));
        assert_eq!(cache.get::<u32>("k"), None);
        assert_eq!(cache.len(), 0, "expired entry evicted on read");
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn default_ttl_applies_when_omitted() {
        let clock = ManualClock::new(test_epoch());
        let cache = TagCache::with_default_ttl(Arc::new(clock.clone()), 60);
        cache.set("k", "v".to_string(), CacheOptions::default());

        clock.advance(TimeDelta::seconds(59));
        assert!(cache.has("k"));
        clock.advance(TimeDelta::seconds(2));
        assert!(!cache.has("k"));
    }

    #[test]
    fn delete_by_tag_only_touches_tagged_entries() {
        let (cache, _) = cache();
        cache.set("posts:list", 1_u8, CacheOptions::tagged(POSTS_TAG));
        cache.set("posts:stats", 2_u8, CacheOptions::tagged(POSTS_TAG));
        cache.set("ideas:list", 3_u8, CacheOptions::tagged(IDEAS_TAG));
        cache.set(
            "dashboard",
            4_u8,
            CacheOptions::tagged(POSTS_TAG).with_tag(IDEAS_TAG),
        );

        assert_eq!(cache.delete_by_tag(POSTS_TAG), 3);
        assert!(cache.has("ideas:list"));
        assert!(!cache.has("posts:list"));
        assert!(!cache.has("dashboard"));
        assert_eq!(cache.delete_by_tag("unknown"), 0);
    }

    #[test]
    fn wrong_type_is_a_miss() {
        let (cache, _) = cache();
        cache.set("k", 1_u64, CacheOptions::default());
        assert_eq!(cache.get::<String>("k"), None);
        assert_eq!(cache.get::<u64>("k"), Some(1));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn delete_and_clear() {
        let (cache, _) = cache();
        cache.set("a", 1_u8, CacheOptions::default());
        cache.set("b", 2_u8, CacheOptions::default());
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_evicts_only_expired() {
        let (cache, clock) = cache();
        cache.set("short", 1_u8, CacheOptions::default().with_ttl(1));
        cache.set("long", 2_u8, CacheOptions::default().with_ttl(100));

        clock.advance(TimeDelta::seconds(5));
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("long"));
    }

    #[tokio::test]
    async fn get_or_set_computes_once_and_skips_errors() {
        let (cache, _) = cache();

        let failed: Result<u32, &str> = cache
            .get_or_set("k", CacheOptions::default(), || async { Err("down") })
            .await;
        assert_eq!(failed, Err("down"));
        assert!(!cache.has("k"), "errors are not cached");

        let first: Result<u32, &str> = cache
            .get_or_set("k", CacheOptions::default(), || async { Ok(7) })
            .await;
        let second: Result<u32, &str> = cache
            .get_or_set("k", CacheOptions::default(), || async { Ok(99) })
            .await;
        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
    }

    #[tokio::test]
    async fn background_sweeper_evicts_and_shuts_down() {
        let (cache, clock) = cache();
        cache.set("k", 1_u8, CacheOptions::default().with_ttl(1));
        clock.advance(TimeDelta::seconds(2));

        let sweeper = cache.spawn_sweeper(Duration::from_millis(10));
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while !cache.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(drained.is_ok(), "sweeper never evicted the entry");

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn sweeper_stops_when_cache_is_dropped() {
        let (cache, _) = cache();
        let sweeper = cache.spawn_sweeper(Duration::from_millis(5));
        drop(cache);

        let stopped = tokio::time::timeout(Duration::from_secs(2), async {
            while !sweeper.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(stopped.is_ok());
    }
}
