//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::storage::{CacheStorage, CachedEntry};
use super::traits::{CacheResult, Cacheable, QueryKey};

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

type SharedFetch<U, E> = Shared<BoxFuture<'static, Result<U, E>>>;

/// In-flight fetches by cache hash. Values are `SharedFetch<U, E>` erased to `Any`.
type InflightMap = Arc<Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>>;

/// Cache layer that manages caching logic and network fetching.
///
/// Entries younger than the stale time are served without calling the
/// fetcher. Older or missing entries block on a refetch. Concurrent requests
/// for the same key share one fetch. Storage failures are logged and never
/// fail a request.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// Serve the stale entry when a refresh fails
  offline_fallback: bool,
  inflight: InflightMap,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: DEFAULT_STALE_TIME,
      offline_fallback: false,
      inflight: Arc::default(),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn with_offline_fallback(mut self, enabled: bool) -> Self {
    self.offline_fallback = enabled;
    self
  }

  /// An entry is stale once its age reaches the stale time.
  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    // A timestamp in the future (clock skew) counts as age zero
    let age = (Utc::now() - cached_at).to_std().unwrap_or_default();
    age >= self.stale_time
  }

  fn read<T: Cacheable>(&self, hash: &str) -> Option<(T, DateTime<Utc>)> {
    match self.storage.get(hash) {
      Ok(Some(entry)) => match serde_json::from_slice(&entry.data) {
        Ok(data) => Some((data, entry.cached_at)),
        Err(e) => {
          tracing::warn!(entry = %entry.description, error = %e, "discarding undecodable cache entry");
          None
        }
      },
      Ok(None) => None,
      Err(e) => {
        tracing::warn!(error = %e, "cache read failed");
        None
      }
    }
  }

  /// Pre-populate an entry with data obtained outside a keyed fetch.
  ///
  /// The seed ages like any fetched entry.
  pub fn seed<T: Cacheable>(&self, key: &impl QueryKey, data: &T) {
    store(
      self.storage.as_ref(),
      &key.cache_hash(),
      key.description(),
      data,
    );
  }

  pub fn invalidate(&self, key: &impl QueryKey) {
    if let Err(e) = self.storage.remove(&key.cache_hash()) {
      tracing::warn!(key = %key.description(), error = %e, "cache invalidation failed");
    }
  }

  pub fn clear(&self) {
    if let Err(e) = self.storage.clear() {
      tracing::warn!(error = %e, "cache clear failed");
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network (joining an in-flight fetch for the same key)
  /// 3. On network failure, return the stale entry if offline fallback is enabled
  /// 4. Update cache with new data
  pub async fn fetch<T, E, F, Fut>(&self, key: &impl QueryKey, fetcher: F) -> Result<CacheResult<T>, E>
  where
    T: Cacheable,
    E: Clone + Send + Sync + fmt::Display + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let hash = key.cache_hash();
    let cached = self.read::<T>(&hash);

    if let Some((data, cached_at)) = &cached {
      if !self.is_stale(*cached_at) {
        tracing::debug!(key = %key.description(), "cache hit");
        return Ok(CacheResult::from_cache(data.clone(), *cached_at));
      }
    }

    tracing::debug!(key = %key.description(), stale = cached.is_some(), "cache miss");

    match self
      .load(hash, key.description(), fetcher, stored_whole)
      .await
    {
      Ok(data) => Ok(CacheResult::from_network(data)),
      Err(e) => match cached {
        Some((data, cached_at)) if self.offline_fallback => {
          tracing::warn!(key = %key.description(), error = %e, "refresh failed, serving stale entry");
          Ok(CacheResult::offline(data, cached_at))
        }
        _ => Err(e),
      },
    }
  }

  /// Fetch a value that may legitimately be absent.
  ///
  /// `None` is returned to the caller but never cached, and it drops any
  /// previously cached value for the key.
  pub async fn fetch_optional<T, E, F, Fut>(
    &self,
    key: &impl QueryKey,
    fetcher: F,
  ) -> Result<CacheResult<Option<T>>, E>
  where
    T: Cacheable,
    E: Clone + Send + Sync + fmt::Display + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
  {
    let hash = key.cache_hash();
    let cached = self.read::<T>(&hash);

    if let Some((data, cached_at)) = &cached {
      if !self.is_stale(*cached_at) {
        tracing::debug!(key = %key.description(), "cache hit");
        return Ok(CacheResult::from_cache(Some(data.clone()), *cached_at));
      }
    }

    match self
      .load(hash, key.description(), fetcher, Option::as_ref)
      .await
    {
      Ok(Some(data)) => Ok(CacheResult::from_network(Some(data))),
      Ok(None) => {
        if cached.is_some() {
          self.invalidate(key);
        }
        Ok(CacheResult::from_network(None))
      }
      Err(e) => match cached {
        Some((data, cached_at)) if self.offline_fallback => {
          tracing::warn!(key = %key.description(), error = %e, "refresh failed, serving stale entry");
          Ok(CacheResult::offline(Some(data), cached_at))
        }
        _ => Err(e),
      },
    }
  }

  /// Run `fetcher` once per key at a time, storing the successful result.
  async fn load<U, T, E, F, Fut>(
    &self,
    hash: String,
    description: String,
    fetcher: F,
    stored: fn(&U) -> Option<&T>,
  ) -> Result<U, E>
  where
    U: Clone + Send + Sync + 'static,
    T: Cacheable,
    E: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<U, E>> + Send + 'static,
  {
    let shared = {
      let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);

      let existing = inflight
        .get(&hash)
        .and_then(|f| f.downcast_ref::<SharedFetch<U, E>>())
        .cloned();

      match existing {
        Some(shared) => {
          tracing::debug!(key = %description, "joining in-flight fetch");
          shared
        }
        None => {
          let fut = fetcher();
          let storage = Arc::clone(&self.storage);
          let inflight_map = Arc::clone(&self.inflight);
          let key = hash.clone();

          let shared: SharedFetch<U, E> = async move {
            let result = fut.await;
            if let Ok(value) = &result {
              if let Some(data) = stored(value) {
                store(storage.as_ref(), &key, description, data);
              }
            }
            inflight_map
              .lock()
              .unwrap_or_else(PoisonError::into_inner)
              .remove(&key);
            result
          }
          .boxed()
          .shared();

          inflight.insert(hash, Box::new(shared.clone()));
          shared
        }
      }
    };

    shared.await
  }
}

fn stored_whole<T>(data: &T) -> Option<&T> {
  Some(data)
}

fn store<T: Cacheable>(storage: &dyn CacheStorage, hash: &str, description: String, data: &T) {
  let bytes = match serde_json::to_vec(data) {
    Ok(bytes) => bytes,
    Err(e) => {
      tracing::warn!(key = %description, error = %e, "failed to serialize cache entry");
      return;
    }
  };

  let entry = CachedEntry {
    description,
    data: bytes,
    cached_at: Utc::now(),
  };

  if let Err(e) = storage.put(hash, entry) {
    tracing::warn!(error = %e, "cache write failed");
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      offline_fallback: self.offline_fallback,
      inflight: Arc::clone(&self.inflight),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage, NoopStorage};
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct TestKey(&'static str);

  impl QueryKey for TestKey {
    fn cache_hash(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      format!("test {}", self.0)
    }
  }

  fn counting(
    calls: &Arc<AtomicUsize>,
    value: u32,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> {
    let calls = Arc::clone(calls);
    move || {
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
      }
      .boxed()
    }
  }

  fn failing(calls: &Arc<AtomicUsize>) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> {
    let calls = Arc::clone(calls);
    move || {
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err("503 Service Unavailable".to_string())
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fresh_entry_served_without_fetch() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache.fetch(&TestKey("a"), counting(&calls, 1)).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache.fetch(&TestKey("a"), counting(&calls, 2)).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_seed_then_stale_refetches_once() {
    let cache = CacheLayer::new(MemoryStorage::new()).with_stale_time(Duration::from_millis(50));
    let calls = Arc::new(AtomicUsize::new(0));

    cache.seed(&TestKey("page1"), &7u32);

    let hit = cache.fetch(&TestKey("page1"), counting(&calls, 8)).await.unwrap();
    assert_eq!(hit.data, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(80)).await;

    let refreshed = cache.fetch(&TestKey("page1"), counting(&calls, 8)).await.unwrap();
    assert_eq!(refreshed.data, 8);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let again = cache.fetch(&TestKey("page1"), counting(&calls, 9)).await.unwrap();
    assert_eq!(again.data, 8);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrent_requests_share_one_fetch() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let slow = |calls: Arc<AtomicUsize>| {
      move || {
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(30)).await;
          Ok::<_, String>(5u32)
        }
        .boxed()
      }
    };

    let (a, b) = tokio::join!(
      cache.fetch(&TestKey("k"), slow(Arc::clone(&calls))),
      cache.fetch(&TestKey("k"), slow(Arc::clone(&calls))),
    );

    assert_eq!(a.unwrap().data, 5);
    assert_eq!(b.unwrap().data, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_errors_are_not_cached() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let err = cache.fetch(&TestKey("k"), failing(&calls)).await.unwrap_err();
    assert!(err.contains("Service Unavailable"));

    let ok = cache.fetch(&TestKey("k"), counting(&calls, 3)).await.unwrap();
    assert_eq!(ok.data, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_stale_entry_not_served_on_error_by_default() {
    let cache = CacheLayer::new(MemoryStorage::new()).with_stale_time(Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));

    cache.seed(&TestKey("k"), &1u32);
    assert!(cache.fetch(&TestKey("k"), failing(&calls)).await.is_err());
  }

  #[tokio::test]
  async fn test_offline_fallback_serves_stale_entry() {
    let cache = CacheLayer::new(MemoryStorage::new())
      .with_stale_time(Duration::ZERO)
      .with_offline_fallback(true);
    let calls = Arc::new(AtomicUsize::new(0));

    cache.seed(&TestKey("k"), &1u32);
    let result = cache.fetch(&TestKey("k"), failing(&calls)).await.unwrap();
    assert_eq!(result.data, 1);
    assert_eq!(result.source, CacheSource::Offline);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    cache.fetch(&TestKey("k"), counting(&calls, 1)).await.unwrap();
    cache.invalidate(&TestKey("k"));
    let result = cache.fetch(&TestKey("k"), counting(&calls, 2)).await.unwrap();

    assert_eq!(result.data, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_optional_none_is_not_cached() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let lookup = |calls: Arc<AtomicUsize>, value: Option<u32>| {
      move || {
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok::<_, String>(value)
        }
        .boxed()
      }
    };

    let missing = cache
      .fetch_optional(&TestKey("slug"), lookup(Arc::clone(&calls), None))
      .await
      .unwrap();
    assert!(missing.data.is_none());

    let found = cache
      .fetch_optional(&TestKey("slug"), lookup(Arc::clone(&calls), Some(4)))
      .await
      .unwrap();
    assert_eq!(found.data, Some(4));

    let hit = cache
      .fetch_optional(&TestKey("slug"), lookup(Arc::clone(&calls), None))
      .await
      .unwrap();
    assert_eq!(hit.data, Some(4));
    assert_eq!(hit.source, CacheSource::CacheFresh);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_undecodable_entry_is_a_miss() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    cache.seed(&TestKey("k"), &"not a number".to_string());
    let result = cache.fetch(&TestKey("k"), counting(&calls, 6)).await.unwrap();
    assert_eq!(result.data, 6);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_noop_storage_always_fetches() {
    let cache = CacheLayer::new(NoopStorage);
    let calls = Arc::new(AtomicUsize::new(0));

    cache.fetch(&TestKey("k"), counting(&calls, 1)).await.unwrap();
    cache.fetch(&TestKey("k"), counting(&calls, 1)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
