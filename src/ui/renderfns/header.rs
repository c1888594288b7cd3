use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use super::utils::truncate;
use crate::session::SessionView;

/// Draw the header bar with logo, server, content and running score
pub fn draw_header(frame: &mut Frame, area: Rect, api_url: &str, view: &SessionView) {
  let host = extract_host(api_url);
  let content = view.content_id.as_deref().unwrap_or("-");

  let mut spans = vec![
    Span::styled(" listen-drill ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", truncate(content, 32)),
      Style::default().fg(Color::Yellow).bold(),
    ),
  ];

  if let Some(level) = &view.level {
    spans.push(Span::styled(
      format!("[{}] ", level),
      Style::default().fg(Color::DarkGray),
    ));
  }

  if view.total > 0 {
    spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
      format!(" score {}/{} ", view.score, view.answered),
      Style::default().fg(Color::Green),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host and port of the API URL
fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
