//! List consumers: infinite and paged state machines over a page fetcher.
//!
//! Both follow the same tick-driven model: a request spawns a task, the task
//! sends its result over a channel, and `poll()` applies it on the next UI
//! tick. Every request is tagged with the list's generation; results from an
//! older generation are dropped, which is how superseded requests are
//! cancelled.
//!
//! ```ignore
//! let mut feed = InfiniteFeed::new(9, client.page_fetcher::<Article>());
//! feed.start();
//!
//! // In event loop tick
//! if feed.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

mod infinite;
mod paged;

pub use infinite::InfiniteFeed;
pub use paged::PagedList;

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::contentful::{ContentfulError, ListingResponse};

/// Fetches one page: `(page, page_size)`, pages are 1-based.
pub type PageFetcher<T> = Arc<
  dyn Fn(u32, u32) -> BoxFuture<'static, Result<ListingResponse<T>, ContentfulError>> + Send + Sync,
>;

/// Per-list state machine: `Idle → Loading → Loaded | Errored`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
  /// Nothing requested yet
  Idle,
  /// A page fetch is in flight
  Loading,
  /// The last fetch succeeded
  Loaded { has_more: bool },
  /// The last fetch failed; retry is manual
  Errored(String),
}

impl FeedState {
  pub fn is_loading(&self) -> bool {
    matches!(self, FeedState::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, FeedState::Errored(_))
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      FeedState::Errored(e) => Some(e),
      _ => None,
    }
  }
}

struct PageMessage<T> {
  generation: u64,
  page: u32,
  result: Result<ListingResponse<T>, ContentfulError>,
}

/// Spawns page fetches and hands back results for the current generation.
struct Requests<T> {
  fetcher: PageFetcher<T>,
  page_size: u32,
  generation: u64,
  tx: mpsc::UnboundedSender<PageMessage<T>>,
  rx: mpsc::UnboundedReceiver<PageMessage<T>>,
}

impl<T: Send + 'static> Requests<T> {
  fn new(page_size: u32, fetcher: PageFetcher<T>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      fetcher,
      page_size: page_size.max(1),
      generation: 0,
      tx,
      rx,
    }
  }

  /// Start a new generation; results of earlier requests will be dropped.
  fn bump(&mut self) {
    self.generation += 1;
  }

  fn request(&self, page: u32) {
    let future = (self.fetcher)(page, self.page_size);
    let tx = self.tx.clone();
    let generation = self.generation;

    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the list may have been dropped
      let _ = tx.send(PageMessage {
        generation,
        page,
        result,
      });
    });
  }

  /// Fetch without reporting back; only useful when the fetcher is cache-backed.
  fn prefetch(&self, page: u32) {
    let future = (self.fetcher)(page, self.page_size);
    tokio::spawn(async move {
      if let Err(e) = future.await {
        tracing::debug!(page, error = %e, "prefetch failed");
      }
    });
  }

  /// Next result for the current generation, if one has arrived.
  fn try_next(&mut self) -> Option<PageMessage<T>> {
    while let Ok(message) = self.rx.try_recv() {
      if message.generation == self.generation {
        return Some(message);
      }
      tracing::debug!(
        page = message.page,
        generation = message.generation,
        "dropping superseded page result"
      );
    }
    None
  }
}

#[cfg(test)]
pub(crate) mod test_support {
  use super::*;
  use futures::FutureExt;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use tokio::sync::oneshot;

  /// A CMS of `total` numbered items.
  pub fn window(total: u64, page: u32, page_size: u32) -> ListingResponse<u64> {
    let skip = u64::from(page - 1) * u64::from(page_size);
    let end = total.min(skip + u64::from(page_size));
    ListingResponse::new((skip..end.max(skip)).collect(), total, skip, page_size)
  }

  pub fn dataset(total: u64, calls: Arc<AtomicUsize>) -> PageFetcher<u64> {
    Arc::new(move |page, page_size| {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { Ok(window(total, page, page_size)) }.boxed()
    })
  }

  /// Fails every request for `failing_page` while `fail` holds a non-zero count.
  pub fn flaky(total: u64, failing_page: u32, fail: Arc<AtomicUsize>) -> PageFetcher<u64> {
    Arc::new(move |page, page_size| {
      let should_fail = page == failing_page && fail.load(Ordering::SeqCst) > 0;
      async move {
        if should_fail {
          Err(ContentfulError::Network {
            status: 503,
            status_text: "Service Unavailable".to_string(),
          })
        } else {
          Ok(window(total, page, page_size))
        }
      }
      .boxed()
    })
  }

  /// Requests for a page wait until its gate is opened.
  #[derive(Clone, Default)]
  pub struct Gates {
    waiting: Arc<Mutex<HashMap<u32, oneshot::Receiver<()>>>>,
    openers: Arc<Mutex<HashMap<u32, oneshot::Sender<()>>>>,
  }

  impl Gates {
    pub fn close(&self, page: u32) {
      let (tx, rx) = oneshot::channel();
      self.waiting.lock().unwrap().insert(page, rx);
      self.openers.lock().unwrap().insert(page, tx);
    }

    pub fn open(&self, page: u32) {
      if let Some(tx) = self.openers.lock().unwrap().remove(&page) {
        let _ = tx.send(());
      }
    }

    pub fn fetcher(&self, total: u64, calls: Arc<AtomicUsize>) -> PageFetcher<u64> {
      let gates = self.clone();
      Arc::new(move |page, page_size| {
        calls.fetch_add(1, Ordering::SeqCst);
        let gate = gates.waiting.lock().unwrap().remove(&page);
        async move {
          if let Some(gate) = gate {
            let _ = gate.await;
          }
          Ok(window(total, page, page_size))
        }
        .boxed()
      })
    }
  }

  /// Poll until `done` holds, failing the test after about a second.
  pub async fn settle<S>(subject: &mut S, poll: fn(&mut S) -> bool, done: impl Fn(&S) -> bool) {
    for _ in 0..200 {
      poll(subject);
      if done(subject) {
        return;
      }
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("list did not settle");
  }
}
