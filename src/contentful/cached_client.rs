//! Cached Contentful client that wraps the listing resolver with transparent caching.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use futures::FutureExt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::{CacheLayer, CacheSource, Cacheable, MemoryStorage, NoopStorage, SqliteStorage};
use crate::config::{CacheBackend, Config, Credentials};
use crate::feed::PageFetcher;

use super::cache::ContentQueryKey;
use super::client::ContentfulClient;
use super::error::ContentfulError;
use super::resolver::{ContentResolver, Resource};
use super::types::{ListingRequest, ListingResponse};

/// Contentful client with transparent caching support.
///
/// List pages are cached per `(resource, page, page_size, preview)` and
/// single items per `(resource, slug, preview)`.
#[derive(Clone)]
pub struct CachedContentClient {
  inner: ContentResolver,
  cache: CacheLayer,
  preview: bool,
  /// Oldest stale entry served since the last successful network fetch
  offline_since: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl CachedContentClient {
  /// Create a new cached client with the configured storage backend.
  pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
    let client = ContentfulClient::new(&config.contentful, credentials)?;

    let cache = match config.cache.backend {
      CacheBackend::Memory => CacheLayer::new(MemoryStorage::new()),
      CacheBackend::Sqlite => CacheLayer::new(SqliteStorage::open()?),
      CacheBackend::None => CacheLayer::new(NoopStorage),
    }
    .with_stale_time(config.stale_time())
    .with_offline_fallback(config.cache.offline);

    Ok(Self::with_cache(
      ContentResolver::new(client),
      cache,
      config.preview,
    ))
  }

  pub fn with_cache(inner: ContentResolver, cache: CacheLayer, preview: bool) -> Self {
    Self {
      inner,
      cache,
      preview,
      offline_since: Arc::default(),
    }
  }

  pub fn preview(&self) -> bool {
    self.preview
  }

  /// Same client and cache, reading from the other API.
  pub fn with_preview(&self, preview: bool) -> Self {
    Self {
      preview,
      ..self.clone()
    }
  }

  pub fn space_id(&self) -> &str {
    self.inner.client().space_id()
  }

  /// When the data being served was cached, while the CMS cannot be reached.
  pub fn offline_since(&self) -> Option<DateTime<Utc>> {
    *self.offline_since.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn record_source(&self, source: CacheSource, cached_at: Option<DateTime<Utc>>) {
    let mut offline = self.offline_since.lock().unwrap_or_else(PoisonError::into_inner);
    match source {
      CacheSource::Network => *offline = None,
      CacheSource::Offline => {
        *offline = match (*offline, cached_at) {
          (Some(current), Some(at)) => Some(current.min(at)),
          (current, at) => current.or(at),
        };
      }
      CacheSource::CacheFresh => {}
    }
  }

  /// Get one page of a listing with caching.
  pub async fn list_page<R>(
    &self,
    page: u32,
    page_size: u32,
  ) -> Result<ListingResponse<R>, ContentfulError>
  where
    R: Resource + Cacheable,
  {
    let request = ListingRequest::new(R::TYPE, page, page_size);
    let key = ContentQueryKey::page(&request, self.preview);

    let result = self
      .cache
      .fetch(&key, || {
        let inner = self.inner.clone();
        let preview = self.preview;
        async move { R::fetch_listing(&inner, request.page_size, preview, request.skip()).await }
      })
      .await?;

    self.record_source(result.source, result.cached_at);

    // Full rows make the detail lookup for each item a cache hit
    if R::FULL_LISTING && result.source == CacheSource::Network {
      for item in &result.data.items {
        self.seed_item(item);
      }
    }

    Ok(result.data)
  }

  /// Get a single item by slug with caching. Not-found is `Ok(None)` and is not retried.
  pub async fn get_by_slug<R>(&self, slug: &str) -> Result<Option<R>, ContentfulError>
  where
    R: Resource + Cacheable,
  {
    let key = ContentQueryKey::item(R::TYPE, slug, self.preview);

    let result = self
      .cache
      .fetch_optional(&key, || {
        let inner = self.inner.clone();
        let preview = self.preview;
        let slug = slug.to_string();
        async move { R::fetch_by_slug(&inner, &slug, preview).await }
      })
      .await?;

    self.record_source(result.source, result.cached_at);
    Ok(result.data)
  }

  /// Load an item ahead of navigation.
  pub async fn prefetch_item<R>(&self, slug: &str)
  where
    R: Resource + Cacheable,
  {
    if let Err(e) = self.get_by_slug::<R>(slug).await {
      tracing::debug!(resource = %R::TYPE, slug, error = %e, "prefetch failed");
    }
  }

  /// Store an item obtained from a listing under its slug key.
  pub fn seed_item<R>(&self, item: &R)
  where
    R: Resource + Cacheable,
  {
    self.cache.seed(
      &ContentQueryKey::item(R::TYPE, item.slug(), self.preview),
      item,
    );
  }

  pub fn invalidate_page<R: Resource>(&self, page: u32, page_size: u32) {
    let request = ListingRequest::new(R::TYPE, page, page_size);
    self
      .cache
      .invalidate(&ContentQueryKey::page(&request, self.preview));
  }

  pub fn invalidate_item<R: Resource>(&self, slug: &str) {
    self
      .cache
      .invalidate(&ContentQueryKey::item(R::TYPE, slug, self.preview));
  }

  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  /// Page fetcher for the list consumers, backed by this client's cache.
  pub fn page_fetcher<R>(&self) -> PageFetcher<R>
  where
    R: Resource + Cacheable,
  {
    let client = self.clone();
    Arc::new(move |page, page_size| {
      let client = client.clone();
      async move { client.list_page::<R>(page, page_size).await }.boxed()
    })
  }
}
