//! Infinite scroll: pages are appended as the reader approaches the end.

use std::collections::BTreeMap;

use crate::contentful::{ContentfulError, ListingResponse};

use super::{FeedState, PageFetcher, Requests};

/// Accumulating list of pages.
///
/// Pages are keyed by page number, and `items()` only walks pages contiguous
/// from page 1, so items always appear in page order no matter which
/// response lands first.
pub struct InfiniteFeed<T> {
  requests: Requests<T>,
  pages: BTreeMap<u32, ListingResponse<T>>,
  state: FeedState,
  in_flight: Option<u32>,
  failed_page: Option<u32>,
  error: Option<ContentfulError>,
  prefetch_next: bool,
}

impl<T: Send + 'static> InfiniteFeed<T> {
  pub fn new(page_size: u32, fetcher: PageFetcher<T>) -> Self {
    Self {
      requests: Requests::new(page_size, fetcher),
      pages: BTreeMap::new(),
      state: FeedState::Idle,
      in_flight: None,
      failed_page: None,
      error: None,
      prefetch_next: false,
    }
  }

  /// Warm the page after each one that lands. Only worth it with a cache-backed fetcher.
  pub fn with_prefetch(mut self, enabled: bool) -> Self {
    self.prefetch_next = enabled;
    self
  }

  /// Load the first page if nothing has been requested yet.
  pub fn start(&mut self) {
    if self.state == FeedState::Idle {
      self.request(1);
    }
  }

  /// Request the page after the last loaded one.
  ///
  /// Returns false, without fetching, while a fetch is in flight, after the
  /// last page has loaded, or while errored (see `retry`).
  pub fn fetch_next_page(&mut self) -> bool {
    if self.in_flight.is_some() || self.state.is_error() || self.is_exhausted() {
      return false;
    }
    let next = self.next_page();
    self.request(next);
    true
  }

  /// Re-request the page that failed.
  pub fn retry(&mut self) -> bool {
    match (self.state.is_error(), self.failed_page) {
      (true, Some(page)) if self.in_flight.is_none() => {
        self.request(page);
        true
      }
      _ => false,
    }
  }

  /// Drop everything and start over from page 1.
  ///
  /// Responses still in flight belong to the old generation and are ignored.
  pub fn refresh(&mut self) {
    self.requests.bump();
    self.pages.clear();
    self.in_flight = None;
    self.failed_page = None;
    self.error = None;
    self.state = FeedState::Idle;
    self.start();
  }

  /// Warm a page without adding it to the list.
  pub fn prefetch(&self, page: u32) {
    self.requests.prefetch(page.max(1));
  }

  /// Apply results that arrived since the last tick. Returns true if anything changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    while let Some(message) = self.requests.try_next() {
      changed = true;
      if self.in_flight == Some(message.page) {
        self.in_flight = None;
      }

      match message.result {
        Ok(response) => {
          tracing::debug!(
            page = message.page,
            items = response.items.len(),
            total = response.total,
            "page loaded"
          );
          self.pages.insert(message.page, response);
          self.failed_page = None;
          self.error = None;
          self.state = FeedState::Loaded {
            has_more: !self.is_exhausted(),
          };
          if self.prefetch_next && !self.is_exhausted() {
            self.prefetch(self.next_page());
          }
        }
        Err(e) => {
          tracing::warn!(page = message.page, error = %e, "page fetch failed");
          self.failed_page = Some(message.page);
          self.state = FeedState::Errored(e.to_string());
          self.error = Some(e);
        }
      }
    }

    changed
  }

  fn request(&mut self, page: u32) {
    self.in_flight = Some(page);
    self.state = FeedState::Loading;
    self.requests.request(page);
  }

  fn contiguous(&self) -> impl Iterator<Item = &ListingResponse<T>> {
    (1u32..).map_while(|page| self.pages.get(&page))
  }

  fn next_page(&self) -> u32 {
    let loaded = self.contiguous().count() as u32;
    loaded + 1
  }

  /// All loaded items, in page order.
  pub fn items(&self) -> impl Iterator<Item = &T> {
    self.contiguous().flat_map(|page| page.items.iter())
  }

  pub fn get(&self, index: usize) -> Option<&T> {
    self.items().nth(index)
  }

  pub fn len(&self) -> usize {
    self.contiguous().map(|page| page.items.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Total reported by the most recent contiguous page.
  pub fn total(&self) -> Option<u64> {
    self.contiguous().last().map(|page| page.total)
  }

  pub fn loaded_pages(&self) -> u32 {
    self.contiguous().count() as u32
  }

  /// True once the last page has loaded.
  pub fn is_exhausted(&self) -> bool {
    self.contiguous().last().is_some_and(|page| !page.has_more)
  }

  pub fn state(&self) -> &FeedState {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight.is_some()
  }

  pub fn error(&self) -> Option<&ContentfulError> {
    self.error.as_ref()
  }

  /// Skeleton rows to draw after the loaded items.
  pub fn placeholder_count(&self) -> usize {
    if self.is_loading() {
      self.requests.page_size as usize
    } else {
      0
    }
  }

  pub fn page_size(&self) -> u32 {
    self.requests.page_size
  }
}
