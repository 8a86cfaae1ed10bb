//! How each content type appears in lists and detail pages.

use ratatui::prelude::*;

use crate::contentful::{Article, TalentProfile};
use crate::ui::renderfns::{format_date, truncate};

pub trait ContentDisplay {
  /// Title column of a list row and heading of the detail page
  fn heading(&self) -> &str;

  /// Secondary text after the heading
  fn byline(&self) -> Option<String>;

  /// Body of the detail page
  fn detail(&self) -> Vec<Line<'_>>;

  fn list_row(&self, width: usize) -> Line<'_> {
    let byline = self.byline().unwrap_or_default();
    let heading_width = width.saturating_sub(byline.chars().count() + 4).max(12);

    Line::from(vec![
      Span::raw(truncate(self.heading(), heading_width)),
      Span::raw("  "),
      Span::styled(byline, Style::default().fg(Color::DarkGray)),
    ])
  }
}

impl ContentDisplay for Article {
  fn heading(&self) -> &str {
    &self.title
  }

  fn byline(&self) -> Option<String> {
    let date = format_date(self.published_at);
    Some(match &self.author {
      Some(author) => format!("{} · {}", author, date),
      None => date,
    })
  }

  fn detail(&self) -> Vec<Line<'_>> {
    let mut lines = vec![
      Line::from(Span::styled(&self.title, Style::default().bold())),
      Line::from(Span::styled(
        self.byline().unwrap_or_default(),
        Style::default().fg(Color::DarkGray),
      )),
      Line::default(),
    ];

    if let Some(excerpt) = &self.excerpt {
      lines.push(Line::from(Span::styled(excerpt, Style::default().italic())));
      lines.push(Line::default());
    }

    match &self.body {
      Some(body) => lines.extend(body.lines().map(Line::raw)),
      None => lines.push(Line::styled("No content", Style::default().fg(Color::DarkGray))),
    }
    lines
  }
}

impl ContentDisplay for TalentProfile {
  fn heading(&self) -> &str {
    &self.name
  }

  fn byline(&self) -> Option<String> {
    match (&self.role, &self.location) {
      (Some(role), Some(location)) => Some(format!("{} · {}", role, location)),
      (Some(one), None) | (None, Some(one)) => Some(one.clone()),
      (None, None) => None,
    }
  }

  fn detail(&self) -> Vec<Line<'_>> {
    let mut lines = vec![Line::from(Span::styled(&self.name, Style::default().bold()))];

    if let Some(byline) = self.byline() {
      lines.push(Line::styled(byline, Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::default());

    match &self.bio {
      Some(bio) => lines.extend(bio.lines().map(Line::raw)),
      None => lines.push(Line::styled("No bio", Style::default().fg(Color::DarkGray))),
    }
    lines
  }
}
