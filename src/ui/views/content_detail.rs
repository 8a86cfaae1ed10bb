use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::cache::Cacheable;
use crate::contentful::{CachedContentClient, Resource};
use crate::query::{ItemQuery, ItemState};
use crate::ui::view::{Shortcut, View, ViewAction};

use super::ContentDisplay;

/// One article or profile, looked up by slug
pub struct ContentDetailView<R> {
  slug: String,
  label: String,
  client: CachedContentClient,
  query: ItemQuery<R>,
  scroll: u16,
}

impl<R> ContentDetailView<R>
where
  R: Resource + Cacheable + ContentDisplay,
{
  pub fn new(slug: String, label: String, client: CachedContentClient) -> Self {
    let fetch_client = client.clone();
    let fetch_slug = slug.clone();
    let mut query = ItemQuery::new(move || {
      let client = fetch_client.clone();
      let slug = fetch_slug.clone();
      async move { client.get_by_slug::<R>(&slug).await }
    });

    // Usually a cache hit thanks to the hover prefetch
    query.fetch();

    Self {
      slug,
      label,
      client,
      query,
      scroll: 0,
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = if self.query.is_loading() {
      format!(" {} (loading...) ", self.label)
    } else {
      format!(" {} ", self.label)
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = match self.query.state() {
      ItemState::Idle | ItemState::Loading => {
        Paragraph::new("Loading...").style(Style::default().fg(Color::DarkGray))
      }
      ItemState::NotFound => Paragraph::new(vec![
        Line::styled("Not found", Style::default().fg(Color::Yellow).bold()),
        Line::default(),
        Line::styled(
          format!("Nothing is published at '{}'.", self.slug),
          Style::default().fg(Color::DarkGray),
        ),
      ]),
      ItemState::Failed(e) => Paragraph::new(vec![
        Line::styled(
          format!("{} error: {}", e.kind(), e),
          Style::default().fg(Color::Red),
        ),
        Line::default(),
        Line::styled("Press 'r' to retry.", Style::default().fg(Color::DarkGray)),
      ])
      .wrap(Wrap { trim: true }),
      ItemState::Found(item) => Paragraph::new(item.detail())
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0)),
    };

    frame.render_widget(paragraph, inner);
  }
}

impl<R> View for ContentDetailView<R>
where
  R: Resource + Cacheable + ContentDisplay,
{
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        if self.query.data().is_some() {
          self.scroll = self.scroll.saturating_add(1);
        }
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.scroll = self.scroll.saturating_sub(1);
      }
      KeyCode::Char('r') => {
        self.client.invalidate_item::<R>(&self.slug);
        self.scroll = 0;
        self.query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.slug.clone()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    let reload = if self.query.error().is_some() {
      "retry"
    } else {
      "refresh"
    };
    vec![
      Shortcut::new("j/k", "scroll").with_priority(10),
      Shortcut::new("r", reload).with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}
