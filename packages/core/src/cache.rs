//! Keyed TTL cache with in-flight request deduplication.
//!
//! Entries expire lazily: an expired entry is dropped the next time it is
//! read, there is no background sweep. Alongside the entries the cache keeps
//! at most one pending request per key, so callers asking for the same URL
//! while a fetch is already running join that fetch instead of starting
//! another one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::error::AppError;

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_millis(30_000);

/// An in-flight request that any number of callers can await.
pub type SharedRequest<T> = Shared<BoxFuture<'static, Result<T, AppError>>>;

struct CacheEntry<T> {
    data: T,
    timestamp: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.timestamp) > self.ttl
    }
}

struct PendingRequest<T> {
    id: u64,
    request: SharedRequest<T>,
}

type PendingMap<T> = Arc<Mutex<HashMap<String, PendingRequest<T>>>>;

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory response cache keyed by request identity (the URL).
pub struct ResponseCache<T: Clone> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    pending: PendingMap<T>,
    next_request_id: AtomicU64,
    default_ttl: Duration,
}

impl<T> Default for ResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T> ResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: AtomicU64::new(0),
            default_ttl,
        }
    }

    /// Returns the cached value only while it is within its TTL.
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = lock(&self.entries);
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.data.clone())
    }

    pub fn set(&self, key: &str, data: T) {
        self.set_with_ttl(key, data, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: &str, data: T, ttl: Duration) {
        lock(&self.entries).insert(
            key.to_string(),
            CacheEntry {
                data,
                timestamp: Instant::now(),
                ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        lock(&self.entries).remove(key);
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_pending_request(&self, key: &str) -> Option<SharedRequest<T>> {
        lock(&self.pending)
            .get(key)
            .map(|pending| pending.request.clone())
    }

    /// Register `request` as the in-flight fetch for `key`.
    ///
    /// The registration removes itself once the request settles, whether it
    /// succeeded or failed and whether or not anyone awaited it. Must be
    /// called from within a Tokio runtime.
    pub fn set_pending_request(&self, key: &str, request: SharedRequest<T>) {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.pending).insert(
            key.to_string(),
            PendingRequest {
                id,
                request: request.clone(),
            },
        );
        self.watch(key.to_string(), id, request);
    }

    /// Join the in-flight request for `key`, or register the one built by
    /// `make` when there is none. The check and the registration happen under
    /// one lock. The returned flag is `true` when an existing request was
    /// joined.
    pub fn pending_or_register<F>(&self, key: &str, make: F) -> (SharedRequest<T>, bool)
    where
        F: FnOnce() -> SharedRequest<T>,
    {
        let mut pending = lock(&self.pending);
        if let Some(existing) = pending.get(key) {
            return (existing.request.clone(), true);
        }

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = make();
        pending.insert(
            key.to_string(),
            PendingRequest {
                id,
                request: request.clone(),
            },
        );
        drop(pending);

        self.watch(key.to_string(), id, request.clone());
        (request, false)
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    fn watch(&self, key: String, id: u64, request: SharedRequest<T>) {
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            let _ = request.await;
            let mut pending = lock(&pending);
            // A newer request may have replaced ours in the meantime.
            if pending.get(&key).is_some_and(|current| current.id == id) {
                pending.remove(&key);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::sync::oneshot;

    fn gated_request(rx: oneshot::Receiver<Result<u64, AppError>>) -> SharedRequest<u64> {
        async move {
            rx.await
                .unwrap_or_else(|_| Err(AppError::network("sender dropped")))
        }
        .boxed()
        .shared()
    }

    async fn settle<T: Clone + Send + Sync + 'static>(cache: &ResponseCache<T>) {
        for _ in 0..20 {
            if cache.pending_len() == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn get_returns_none_when_cache_is_empty() {
        let cache = ResponseCache::<u64>::new(Duration::from_secs(5));
        assert!(cache.get("a").is_none());
        assert!(!cache.has("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn get_honours_ttl_boundary() {
        let cache = ResponseCache::new(Duration::from_millis(100));
        cache.set("k", 42_u64);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get("k"), Some(42));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn set_resets_timestamp() {
        let cache = ResponseCache::new(Duration::from_millis(100));
        cache.set("k", 1_u64);
        tokio::time::advance(Duration::from_millis(80)).await;
        cache.set("k", 2_u64);
        tokio::time::advance(Duration::from_millis(80)).await;

        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn set_with_ttl_overrides_default() {
        let cache = ResponseCache::new(DEFAULT_TTL);
        cache.set_with_ttl("short", 1_u64, Duration::from_millis(10));
        cache.set("long", 2_u64);
        tokio::time::advance(Duration::from_millis(20)).await;

        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn invalidate_clears_cached_value() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.set("k", 42_u64);
        cache.set("other", 7_u64);
        cache.invalidate("k");

        assert!(cache.get("k").is_none());
        assert_eq!(cache.get("other"), Some(7));
    }

    #[tokio::test]
    async fn pending_request_removes_itself_after_success() {
        let cache = ResponseCache::<u64>::default();
        let (tx, rx) = oneshot::channel();
        cache.set_pending_request("k", gated_request(rx));
        assert!(cache.get_pending_request("k").is_some());

        tx.send(Ok(5)).unwrap();
        settle(&cache).await;

        assert!(cache.get_pending_request("k").is_none());
    }

    #[tokio::test]
    async fn pending_request_removes_itself_after_failure() {
        let cache = ResponseCache::<u64>::default();
        let (tx, rx) = oneshot::channel();
        cache.set_pending_request("k", gated_request(rx));

        tx.send(Err(AppError::network("boom"))).unwrap();
        settle(&cache).await;

        assert_eq!(cache.pending_len(), 0);
    }

    #[tokio::test]
    async fn pending_or_register_joins_existing_request() {
        let cache = ResponseCache::<u64>::default();
        let (tx, rx) = oneshot::channel();
        let (first, joined_first) = cache.pending_or_register("k", || gated_request(rx));
        let (second, joined_second) = cache.pending_or_register("k", || {
            panic!("a second request must not be built while one is in flight")
        });

        assert!(!joined_first);
        assert!(joined_second);

        tx.send(Ok(9)).unwrap();
        assert_eq!(first.await, Ok(9));
        assert_eq!(second.await, Ok(9));
    }

    #[tokio::test]
    async fn stale_watcher_does_not_remove_newer_registration() {
        let cache = ResponseCache::<u64>::default();
        let (old_tx, old_rx) = oneshot::channel();
        let (_new_tx, new_rx) = oneshot::channel();
        cache.set_pending_request("k", gated_request(old_rx));
        cache.set_pending_request("k", gated_request(new_rx));

        old_tx.send(Ok(1)).unwrap();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert_eq!(cache.pending_len(), 1);
    }
}
