use crate::commands::{self, Command, CommandKind};
use crate::config::{CacheBackend, Config};
use crate::contentful::{Article, CachedContentClient, ResourceType, TalentProfile};
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::ContentListView;
use chrono::Local;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

pub struct App {
  /// Navigation stack - the root list is always at index 0
  view_stack: Vec<Box<dyn View>>,
  mode: Mode,
  command_input: String,
  selected_suggestion: usize,
  config: Config,
  client: CachedContentClient,
  resource: ResourceType,
  /// Transient message shown in the footer
  status: Option<String>,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, client: CachedContentClient, resource: ResourceType) -> Self {
    let mut app = Self {
      view_stack: Vec::new(),
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      config,
      client,
      resource,
      status: None,
      should_quit: false,
    };
    app.reset_root();
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.main_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(100));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    Ok(())
  }

  fn tick(&mut self) {
    // Lists under a detail view keep polling so they are current on return
    for view in &mut self.view_stack {
      view.tick();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char(':') {
      self.mode = Mode::Command;
      self.command_input.clear();
      self.selected_suggestion = 0;
      return;
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };

    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        let command = commands::resolve(&self.command_input, self.selected_suggestion);
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;

        match command {
          Some(kind) => self.execute_command(kind),
          None => self.status = Some("Unknown command".to_string()),
        }
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.autocomplete_suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.autocomplete_suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn execute_command(&mut self, command: CommandKind) {
    tracing::debug!(?command, "executing command");
    self.status = None;

    match command {
      CommandKind::Articles => {
        self.resource = ResourceType::Article;
        self.reset_root();
      }
      CommandKind::Talent => {
        self.resource = ResourceType::Talent;
        self.reset_root();
      }
      CommandKind::TogglePreview => {
        self.client = self.client.with_preview(!self.client.preview());
        self.status = Some(if self.client.preview() {
          "Showing drafts (preview API)".to_string()
        } else {
          "Showing published content".to_string()
        });
        self.reset_root();
      }
      CommandKind::ClearCache => {
        self.client.clear_cache();
        self.status = Some("Cache cleared".to_string());
        self.reset_root();
      }
      CommandKind::Quit => self.should_quit = true,
    }
  }

  /// Replace the whole stack with a fresh list of the current resource.
  fn reset_root(&mut self) {
    // Prefetching into a disabled cache would only double the requests
    let prefetch = self.config.cache.backend != CacheBackend::None;
    let client = self.client.clone();
    let listing = &self.config.listing;

    let root: Box<dyn View> = match self.resource {
      ResourceType::Article => Box::new(ContentListView::<Article>::new(client, listing, prefetch)),
      ResourceType::Talent => Box::new(ContentListView::<TalentProfile>::new(
        client, listing, prefetch,
      )),
    };

    self.view_stack.clear();
    self.view_stack.push(root);
  }

  // Accessors for UI rendering
  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn title(&self) -> &str {
    self
      .config
      .title
      .as_deref()
      .unwrap_or_else(|| self.client.space_id())
  }

  pub fn preview(&self) -> bool {
    self.client.preview()
  }

  /// Footer message. Serving stale data because the CMS is unreachable
  /// outranks the last command's message.
  pub fn status(&self) -> Option<String> {
    self
      .client
      .offline_since()
      .map(|cached_at| {
        format!(
          "Offline: showing data cached at {}",
          cached_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )
      })
      .or_else(|| self.status.clone())
  }

  pub fn shortcuts(&self) -> Vec<Shortcut> {
    self
      .view_stack
      .last()
      .map(|view| view.shortcuts())
      .unwrap_or_default()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, MemoryStorage};
  use crate::contentful::client::tests::{test_client, GRAPHQL_PATH};
  use crate::contentful::resolver::ContentResolver;
  use httpmock::prelude::*;
  use serde_json::json;

  fn offline_capable_app(server: &MockServer) -> App {
    let resolver = ContentResolver::new(test_client(&server.base_url()));
    let cache = CacheLayer::new(MemoryStorage::new())
      .with_stale_time(Duration::ZERO)
      .with_offline_fallback(true);
    let client = CachedContentClient::with_cache(resolver, cache, false);
    App::new(Config::default(), client, ResourceType::Article)
  }

  /// Only answers three-item pages, so the root list's own requests never match.
  fn mock_three_item_page(server: &MockServer, status: u16) -> httpmock::Mock<'_> {
    server.mock(move |when, then| {
      when
        .method(POST)
        .path(GRAPHQL_PATH)
        .json_body_includes(json!({ "variables": { "limit": 3 } }).to_string());
      then.status(status).json_body(json!({
        "data": { "articleCollection": { "total": 1, "items": [
          { "sys": { "id": "id-0" }, "slug": "article-0", "title": "Article 0" }
        ]}}
      }));
    })
  }

  #[tokio::test]
  async fn test_footer_reports_offline_data() {
    let server = MockServer::start();
    let mut app = offline_capable_app(&server);
    app.status = Some("Cache cleared".to_string());

    let mut online = mock_three_item_page(&server, 200);
    app.client.list_page::<Article>(1, 3).await.unwrap();
    assert_eq!(app.status().as_deref(), Some("Cache cleared"));
    online.delete();

    let mut outage = mock_three_item_page(&server, 503);
    app.client.list_page::<Article>(1, 3).await.unwrap();
    let status = app.status().unwrap();
    assert!(status.starts_with("Offline: showing data cached at "), "{status}");
    outage.delete();

    mock_three_item_page(&server, 200);
    app.client.list_page::<Article>(1, 3).await.unwrap();
    assert_eq!(app.status().as_deref(), Some("Cache cleared"));
  }

  #[tokio::test]
  async fn test_preview_command_switches_client() {
    let server = MockServer::start();
    let mut app = offline_capable_app(&server);

    app.execute_command(CommandKind::TogglePreview);
    assert!(app.preview());
    assert_eq!(app.status().as_deref(), Some("Showing drafts (preview API)"));
    assert_eq!(app.view_stack.len(), 1);
  }
}
