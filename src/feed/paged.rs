//! Page-at-a-time listing with previous/next navigation.

use crate::contentful::{ContentfulError, ListingResponse};

use super::{FeedState, PageFetcher, Requests};

/// One visible page at a time.
///
/// The page cursor only moves once the requested page has arrived; until
/// then the current page stays on screen. A newer navigation supersedes an
/// older one still in flight.
pub struct PagedList<T> {
  requests: Requests<T>,
  current: Option<ListingResponse<T>>,
  page: u32,
  pending: Option<u32>,
  state: FeedState,
  error: Option<ContentfulError>,
  failed_page: Option<u32>,
  prefetch_neighbours: bool,
}

impl<T: Send + 'static> PagedList<T> {
  pub fn new(page_size: u32, fetcher: PageFetcher<T>) -> Self {
    Self {
      requests: Requests::new(page_size, fetcher),
      current: None,
      page: 1,
      pending: None,
      state: FeedState::Idle,
      error: None,
      failed_page: None,
      prefetch_neighbours: false,
    }
  }

  /// Warm the pages either side of each committed page.
  pub fn with_prefetch(mut self, enabled: bool) -> Self {
    self.prefetch_neighbours = enabled;
    self
  }

  pub fn start(&mut self) {
    if self.state == FeedState::Idle {
      self.go_to(1);
    }
  }

  /// Request `page`; the cursor moves when it arrives.
  pub fn go_to(&mut self, page: u32) {
    let page = page.max(1);
    self.requests.bump();
    self.pending = Some(page);
    self.state = FeedState::Loading;
    self.requests.request(page);
  }

  pub fn next(&mut self) -> bool {
    if !self.can_go_next() {
      return false;
    }
    self.go_to(self.page + 1);
    true
  }

  pub fn previous(&mut self) -> bool {
    if !self.can_go_previous() {
      return false;
    }
    self.go_to(self.page - 1);
    true
  }

  pub fn can_go_previous(&self) -> bool {
    self.page > 1
  }

  pub fn can_go_next(&self) -> bool {
    self.current.as_ref().is_some_and(|page| page.has_more)
  }

  /// Re-request the page that failed.
  pub fn retry(&mut self) -> bool {
    match (self.state.is_error(), self.failed_page) {
      (true, Some(page)) => {
        self.go_to(page);
        true
      }
      _ => false,
    }
  }

  /// Reload the current page.
  pub fn refresh(&mut self) {
    self.go_to(self.page);
  }

  /// Apply results that arrived since the last tick. Returns true if anything changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    while let Some(message) = self.requests.try_next() {
      changed = true;
      self.pending = None;

      match message.result {
        Ok(response) => {
          tracing::debug!(
            page = message.page,
            items = response.items.len(),
            total = response.total,
            "page committed"
          );
          self.state = FeedState::Loaded {
            has_more: response.has_more,
          };
          self.page = message.page;
          self.error = None;
          self.failed_page = None;

          if self.prefetch_neighbours {
            if response.has_more {
              self.requests.prefetch(self.page + 1);
            }
            if self.page > 1 {
              self.requests.prefetch(self.page - 1);
            }
          }
          self.current = Some(response);
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

  /// Items of the committed page.
  pub fn items(&self) -> &[T] {
    self
      .current
      .as_ref()
      .map(|page| page.items.as_slice())
      .unwrap_or_default()
  }

  pub fn current(&self) -> Option<&ListingResponse<T>> {
    self.current.as_ref()
  }

  /// 1-based committed page.
  pub fn page(&self) -> u32 {
    self.page
  }

  /// Page being navigated to, if any.
  pub fn pending_page(&self) -> Option<u32> {
    self.pending
  }

  /// A navigation is in flight while an older page is still shown.
  pub fn is_transitioning(&self) -> bool {
    self.pending.is_some() && self.current.is_some()
  }

  pub fn total_pages(&self) -> u64 {
    self.current.as_ref().map_or(0, |page| page.total_pages())
  }

  pub fn total(&self) -> Option<u64> {
    self.current.as_ref().map(|page| page.total)
  }

  pub fn state(&self) -> &FeedState {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    self.pending.is_some()
  }

  pub fn error(&self) -> Option<&ContentfulError> {
    self.error.as_ref()
  }

  /// Skeleton rows while nothing has been committed yet.
  pub fn placeholder_count(&self) -> usize {
    if self.current.is_none() && self.is_loading() {
      self.requests.page_size as usize
    } else {
      0
    }
  }

  pub fn page_size(&self) -> u32 {
    self.requests.page_size
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::test_support::{dataset, flaky, settle, Gates};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn settled(list: &mut PagedList<u64>) {
    settle(list, PagedList::poll, |l| !l.is_loading()).await;
  }

  #[tokio::test]
  async fn test_first_page_and_navigation_bounds() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut list = PagedList::new(3, dataset(7, calls.clone()));

    list.start();
    assert_eq!(list.placeholder_count(), 3);
    settled(&mut list).await;

    assert_eq!(list.page(), 1);
    assert_eq!(list.items(), &[0, 1, 2]);
    assert_eq!(list.total_pages(), 3);
    assert!(!list.can_go_previous());
    assert!(list.can_go_next());
    assert!(!list.previous());

    list.next();
    settled(&mut list).await;
    list.next();
    settled(&mut list).await;

    assert_eq!(list.page(), 3);
    assert_eq!(list.items(), &[6]);
    assert!(list.can_go_previous());
    assert!(!list.can_go_next());
    assert!(!list.next());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_current_page_stays_visible_during_transition() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gates = Gates::default();
    gates.close(2);
    let mut list = PagedList::new(3, gates.fetcher(7, calls.clone()));

    list.start();
    settled(&mut list).await;
    list.next();
    list.poll();

    assert!(list.is_transitioning());
    assert_eq!(list.page(), 1);
    assert_eq!(list.pending_page(), Some(2));
    assert_eq!(list.items(), &[0, 1, 2]);
    assert_eq!(list.placeholder_count(), 0);

    gates.open(2);
    settled(&mut list).await;
    assert_eq!(list.page(), 2);
    assert_eq!(list.items(), &[3, 4, 5]);
  }

  #[tokio::test]
  async fn test_later_navigation_supersedes_slow_one() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gates = Gates::default();
    gates.close(2);
    let mut list = PagedList::new(3, gates.fetcher(7, calls.clone()));

    list.start();
    settled(&mut list).await;
    list.go_to(2);
    list.go_to(3);
    settled(&mut list).await;
    assert_eq!(list.page(), 3);

    gates.open(2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!list.poll());
    assert_eq!(list.page(), 3);
    assert_eq!(list.items(), &[6]);
  }

  #[tokio::test]
  async fn test_error_keeps_page_and_retry_recovers() {
    let fail = Arc::new(AtomicUsize::new(1));
    let mut list = PagedList::new(3, flaky(7, 2, fail.clone()));

    list.start();
    settled(&mut list).await;
    list.next();
    settled(&mut list).await;

    assert_eq!(list.page(), 1);
    assert_eq!(list.items(), &[0, 1, 2]);
    assert_eq!(
      list.state().error(),
      Some("Network response was not ok: 503 Service Unavailable")
    );

    fail.store(0, Ordering::SeqCst);
    assert!(list.retry());
    settled(&mut list).await;

    assert_eq!(list.page(), 2);
    assert!(list.error().is_none());
    assert_eq!(list.state(), &FeedState::Loaded { has_more: true });
  }

  #[tokio::test]
  async fn test_out_of_range_page_is_empty() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut list = PagedList::new(3, dataset(7, calls));

    list.go_to(10);
    settled(&mut list).await;

    assert_eq!(list.page(), 10);
    assert!(list.items().is_empty());
    assert!(!list.can_go_next());
  }

  #[tokio::test]
  async fn test_neighbours_are_prefetched() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut list = PagedList::new(3, dataset(7, calls.clone())).with_prefetch(true);

    list.go_to(2);
    settled(&mut list).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Page 2 plus pages 3 and 1
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }
}
