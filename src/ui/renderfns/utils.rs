use chrono::{DateTime, Utc};
use ratatui::prelude::*;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Short publication date, or a dash for unpublished entries
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
  date
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "-".to_string())
}

/// Placeholder row drawn while a page is loading
pub fn skeleton_line(row: usize, width: usize) -> Line<'static> {
  // Vary the bar length a little so the rows don't look like a table border
  let len = (width * (60 + (row * 17) % 30) / 100).max(4);
  Line::from(Span::styled(
    "░".repeat(len),
    Style::default().fg(Color::DarkGray),
  ))
}
