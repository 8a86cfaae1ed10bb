use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::cache::Cacheable;
use crate::config::{ListMode, ListingConfig};
use crate::contentful::{CachedContentClient, ContentfulError, Resource};
use crate::feed::{FeedState, InfiniteFeed, PagedList};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::skeleton_line;
use crate::ui::view::{Shortcut, View, ViewAction};

use super::{ContentDetailView, ContentDisplay};

/// Either list consumer behind one interface for the view
enum Listing<R> {
  Paged(PagedList<R>),
  Infinite(InfiniteFeed<R>),
}

impl<R: Send + 'static> Listing<R> {
  fn poll(&mut self) -> bool {
    match self {
      Listing::Paged(list) => list.poll(),
      Listing::Infinite(feed) => feed.poll(),
    }
  }

  fn len(&self) -> usize {
    match self {
      Listing::Paged(list) => list.items().len(),
      Listing::Infinite(feed) => feed.len(),
    }
  }

  fn is_empty(&self) -> bool {
    match self {
      Listing::Paged(list) => list.items().is_empty(),
      Listing::Infinite(feed) => feed.is_empty(),
    }
  }

  fn get(&self, index: usize) -> Option<&R> {
    match self {
      Listing::Paged(list) => list.items().get(index),
      Listing::Infinite(feed) => feed.get(index),
    }
  }

  fn items(&self) -> Box<dyn Iterator<Item = &R> + '_> {
    match self {
      Listing::Paged(list) => Box::new(list.items().iter()),
      Listing::Infinite(feed) => Box::new(feed.items()),
    }
  }

  fn state(&self) -> &FeedState {
    match self {
      Listing::Paged(list) => list.state(),
      Listing::Infinite(feed) => feed.state(),
    }
  }

  fn error(&self) -> Option<&ContentfulError> {
    match self {
      Listing::Paged(list) => list.error(),
      Listing::Infinite(feed) => feed.error(),
    }
  }

  fn placeholder_count(&self) -> usize {
    match self {
      Listing::Paged(list) => list.placeholder_count(),
      Listing::Infinite(feed) => feed.placeholder_count(),
    }
  }

  fn retry(&mut self) -> bool {
    match self {
      Listing::Paged(list) => list.retry(),
      Listing::Infinite(feed) => feed.retry(),
    }
  }
}

/// Articles or talent profiles, paged or as an infinite list
pub struct ContentListView<R> {
  client: CachedContentClient,
  listing: Listing<R>,
  list_state: ListState,
  /// Rows from the end that count as "visible" for the infinite list
  threshold: usize,
  /// Committed page the selection belongs to (paged mode)
  shown_page: u32,
  /// Last slug prefetched on hover
  hovered: Option<String>,
}

impl<R> ContentListView<R>
where
  R: Resource + Cacheable + ContentDisplay,
{
  pub fn new(client: CachedContentClient, config: &ListingConfig, prefetch: bool) -> Self {
    let fetcher = client.page_fetcher::<R>();

    let listing = match config.mode {
      ListMode::Paged => {
        let mut list = PagedList::new(config.page_size, fetcher).with_prefetch(prefetch);
        list.start();
        Listing::Paged(list)
      }
      ListMode::Infinite => {
        let mut feed = InfiniteFeed::new(config.page_size, fetcher).with_prefetch(prefetch);
        feed.start();
        Listing::Infinite(feed)
      }
    };

    Self {
      client,
      listing,
      list_state: ListState::default(),
      threshold: config.prefetch_threshold,
      shown_page: 1,
      hovered: None,
    }
  }

  fn selected_item(&self) -> Option<&R> {
    self.list_state.selected().and_then(|i| self.listing.get(i))
  }

  fn on_selection_changed(&mut self) {
    self.hover_prefetch();
    self.check_sensor();
  }

  /// Warm the detail page of the selected item.
  fn hover_prefetch(&mut self) {
    let Some(slug) = self.selected_item().map(|item| item.slug().to_string()) else {
      return;
    };
    if self.hovered.as_deref() == Some(slug.as_str()) {
      return;
    }

    let client = self.client.clone();
    let target = slug.clone();
    tokio::spawn(async move { client.prefetch_item::<R>(&target).await });
    self.hovered = Some(slug);
  }

  /// Load the next page once the selection is within `threshold` rows of the end.
  fn check_sensor(&mut self) {
    let len = self.listing.len();
    let Listing::Infinite(feed) = &mut self.listing else {
      return;
    };
    let selected = self.list_state.selected().unwrap_or(0);
    if selected + self.threshold >= len && feed.fetch_next_page() {
      tracing::debug!(resource = %R::TYPE, loaded = len, "loading next page");
    }
  }

  fn refresh(&mut self) {
    match &mut self.listing {
      Listing::Paged(list) => {
        self.client.invalidate_page::<R>(list.page(), list.page_size());
        list.refresh();
      }
      Listing::Infinite(feed) => {
        for page in 1..=feed.loaded_pages() {
          self.client.invalidate_page::<R>(page, feed.page_size());
        }
        feed.refresh();
        self.list_state.select(None);
      }
    }
  }

  fn title(&self) -> String {
    let name = capitalize(R::TYPE.plural());

    let position = match &self.listing {
      Listing::Paged(list) => match list.current() {
        Some(_) => format!(
          "page {}/{}, {} total",
          list.page(),
          list.total_pages().max(1),
          list.total().unwrap_or(0)
        ),
        None => String::new(),
      },
      Listing::Infinite(feed) => match feed.total() {
        Some(total) => format!("{} of {}", feed.len(), total),
        None => String::new(),
      },
    };

    let status = match (&self.listing, self.listing.state()) {
      (Listing::Paged(list), FeedState::Loading) if list.is_transitioning() => list
        .pending_page()
        .map(|page| format!(" loading page {}...", page))
        .unwrap_or_default(),
      (_, FeedState::Loading) => " loading...".to_string(),
      (_, FeedState::Errored(_)) => " error".to_string(),
      _ => String::new(),
    };

    if position.is_empty() {
      format!(" {}{} ", name, status)
    } else {
      format!(" {} ({}){} ", name, position, status)
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.listing.len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Errors are shown under whatever was already loaded
    let (list_area, error_area) = match self.listing.error() {
      Some(_) => {
        let chunks = Layout::default()
          .direction(Direction::Vertical)
          .constraints([Constraint::Min(1), Constraint::Length(3)])
          .split(inner);
        (chunks[0], Some(chunks[1]))
      }
      None => (inner, None),
    };

    let width = list_area.width.saturating_sub(2) as usize;
    let placeholders = self.listing.placeholder_count();

    if self.listing.is_empty() && placeholders == 0 && self.listing.error().is_none() {
      let empty = Paragraph::new(format!("No {} found.", R::TYPE.plural()))
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(empty, list_area);
    } else {
      let mut items: Vec<ListItem> = self
        .listing
        .items()
        .map(|item| ListItem::new(item.list_row(width)))
        .collect();
      items.extend((0..placeholders).map(|row| ListItem::new(skeleton_line(row, width))));

      let list = List::new(items)
        .highlight_style(
          Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

      frame.render_stateful_widget(list, list_area, &mut self.list_state);
    }

    if let (Some(error), Some(error_area)) = (self.listing.error(), error_area) {
      let message = Paragraph::new(vec![
        Line::styled(
          format!("{} error: {}", error.kind(), error),
          Style::default().fg(Color::Red),
        ),
        Line::styled("Press 'r' to retry.", Style::default().fg(Color::DarkGray)),
      ])
      .wrap(Wrap { trim: true });
      frame.render_widget(message, error_area);
    }
  }
}

impl<R> View for ContentListView<R>
where
  R: Resource + Cacheable + ContentDisplay,
{
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
        self.on_selection_changed();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
        self.on_selection_changed();
      }
      KeyCode::Char('l') | KeyCode::Right => {
        if let Listing::Paged(list) = &mut self.listing {
          list.next();
        }
      }
      KeyCode::Char('h') | KeyCode::Left => {
        if let Listing::Paged(list) = &mut self.listing {
          list.previous();
        }
      }
      KeyCode::Char('r') => {
        if !self.listing.retry() {
          self.refresh();
        }
      }
      KeyCode::Enter => {
        if let Some(item) = self.selected_item() {
          return ViewAction::Push(Box::new(ContentDetailView::<R>::new(
            item.slug().to_string(),
            item.heading().to_string(),
            self.client.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    capitalize(R::TYPE.plural())
  }

  fn tick(&mut self) {
    if !self.listing.poll() {
      return;
    }

    if let Listing::Paged(list) = &self.listing {
      if list.page() != self.shown_page {
        self.shown_page = list.page();
        self.list_state.select(Some(0));
        self.hovered = None;
      }
    }

    // A short first page can leave the sensor row on screen already
    self.check_sensor();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    let mut shortcuts = vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("enter", "open").with_priority(20),
      Shortcut::new("r", "refresh").with_priority(40),
      Shortcut::new("q", "quit").with_priority(50),
    ];
    if matches!(self.listing, Listing::Paged(_)) {
      shortcuts.push(Shortcut::new("h/l", "page").with_priority(30));
    }
    shortcuts
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, MemoryStorage};
  use crate::contentful::client::tests::{test_client, GRAPHQL_PATH};
  use crate::contentful::resolver::ContentResolver;
  use crate::contentful::Article;
  use httpmock::prelude::*;
  use ratatui::backend::TestBackend;
  use serde_json::json;
  use std::time::Duration;

  fn paged_config() -> ListingConfig {
    ListingConfig {
      page_size: 3,
      mode: ListMode::Paged,
      prefetch_threshold: 3,
    }
  }

  /// Seven articles; page 1 answers, page 2 is down.
  fn mock_cms(server: &MockServer) {
    let items: Vec<_> = (0..3)
      .map(|n| {
        json!({
          "sys": { "id": format!("id-{n}") },
          "slug": format!("article-{n}"),
          "title": format!("Article {n}")
        })
      })
      .collect();
    server.mock(move |when, then| {
      when
        .method(POST)
        .path(GRAPHQL_PATH)
        .json_body_includes(json!({ "variables": { "skip": 0 } }).to_string());
      then.status(200).json_body(json!({
        "data": { "articleCollection": { "total": 7, "items": items } }
      }));
    });
    server.mock(|when, then| {
      when
        .method(POST)
        .path(GRAPHQL_PATH)
        .json_body_includes(json!({ "variables": { "skip": 3 } }).to_string());
      then.status(503);
    });
  }

  fn list_view(server: &MockServer) -> ContentListView<Article> {
    let resolver = ContentResolver::new(test_client(&server.base_url()));
    let cache = CacheLayer::new(MemoryStorage::new());
    let client = CachedContentClient::with_cache(resolver, cache, false);
    ContentListView::new(client, &paged_config(), false)
  }

  async fn tick_until(view: &mut ContentListView<Article>, done: impl Fn(&FeedState) -> bool) {
    for _ in 0..200 {
      view.tick();
      if done(view.listing.state()) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("listing never settled: {:?}", view.listing.state());
  }

  fn rendered_rows(view: &mut ContentListView<Article>) -> Vec<String> {
    let mut terminal = Terminal::new(TestBackend::new(100, 16)).unwrap();
    terminal
      .draw(|frame| {
        let area = frame.area();
        view.render(frame, area);
      })
      .unwrap();
    let buffer = terminal.backend().buffer();
    buffer
      .content()
      .chunks(buffer.area.width as usize)
      .map(|row| row.iter().map(|cell| cell.symbol()).collect())
      .collect()
  }

  #[tokio::test]
  async fn test_failed_next_page_renders_under_current_rows() {
    let server = MockServer::start();
    mock_cms(&server);
    let mut view = list_view(&server);

    tick_until(&mut view, |state| matches!(state, FeedState::Loaded { .. })).await;
    view.handle_key(KeyEvent::from(KeyCode::Char('l')));
    assert_eq!(view.title(), " Articles (page 1/3, 7 total) loading page 2... ");
    tick_until(&mut view, FeedState::is_error).await;

    let rows = rendered_rows(&mut view);
    for n in 0..3 {
      let title = format!("Article {n}");
      assert!(rows.iter().any(|row| row.contains(&title)), "missing {title}");
    }
    assert!(rows.iter().any(|row| {
      row.contains("network error: Network response was not ok: 503 Service Unavailable")
    }));
    assert!(rows.iter().any(|row| row.contains("Press 'r' to retry.")));
    assert!(rows[0].contains("Articles (page 1/3, 7 total) error"));
  }

  #[tokio::test]
  async fn test_empty_listing_renders_placeholder_text() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(POST).path(GRAPHQL_PATH);
      then.status(200).json_body(json!({
        "data": { "articleCollection": { "total": 0, "items": [] } }
      }));
    });
    let mut view = list_view(&server);

    tick_until(&mut view, |state| matches!(state, FeedState::Loaded { .. })).await;
    let rows = rendered_rows(&mut view);
    assert!(rows.iter().any(|row| row.contains("No articles found.")));
  }

  #[test]
  fn test_capitalize() {
    assert_eq!(capitalize("articles"), "Articles");
    assert_eq!(capitalize(""), "");
  }
}
