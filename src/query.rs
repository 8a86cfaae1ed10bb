//! Single-item query for detail views.
//!
//! Same tick-driven model as the list consumers: `fetch()` spawns the
//! request and `poll()` picks up the result on the next UI tick.
//!
//! ```ignore
//! let client = client.clone();
//! let mut query = ItemQuery::new(move || {
//!     let client = client.clone();
//!     async move { client.get_by_slug::<Article>("hello-world").await }
//! });
//! query.fetch();
//!
//! match query.state() {
//!     ItemState::Loading => render_spinner(),
//!     ItemState::Found(article) => render_article(article),
//!     ItemState::NotFound => render_not_found(),
//!     ItemState::Failed(e) => render_error(e),
//!     ItemState::Idle => {}
//! }
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use tokio::sync::oneshot;

use crate::contentful::ContentfulError;

type ItemResult<T> = Result<Option<T>, ContentfulError>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, ItemResult<T>> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum ItemState<T> {
  Idle,
  Loading,
  Found(T),
  /// The lookup succeeded but nothing has that slug
  NotFound,
  Failed(ContentfulError),
}

impl<T> ItemState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, ItemState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      ItemState::Found(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ContentfulError> {
    match self {
      ItemState::Failed(e) => Some(e),
      _ => None,
    }
  }
}

pub struct ItemQuery<T> {
  state: ItemState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<oneshot::Receiver<ItemResult<T>>>,
}

impl<T: Send + 'static> ItemQuery<T> {
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ItemResult<T>> + Send + 'static,
  {
    Self {
      state: ItemState::Idle,
      fetcher: Box::new(move || fetcher().boxed()),
      receiver: None,
    }
  }

  pub fn state(&self) -> &ItemState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&ContentfulError> {
    self.state.error()
  }

  /// Start fetching unless a fetch is already running.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Start over; a pending result is dropped with its receiver.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = self.receiver.as_mut() else {
      return false;
    };

    let result = match receiver.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => {
        Err(ContentfulError::fetch("request was cancelled"))
      }
    };

    self.receiver = None;
    self.state = match result {
      Ok(Some(data)) => ItemState::Found(data),
      Ok(None) => ItemState::NotFound,
      Err(e) => ItemState::Failed(e),
    };
    true
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = ItemState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ItemQuery<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ItemQuery")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
