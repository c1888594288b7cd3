use crate::commands::Command;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

/// Draw the command overlay with autocomplete
pub fn draw_command_overlay(
  frame: &mut Frame,
  area: Rect,
  input: &str,
  suggestions: &[&Command],
  selected_suggestion: usize,
) {
  let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
  let suggestion_count = suggestions.len().min(8) as u16;
  let height = (3 + suggestion_count).min(area.height);

  // Top-left of the content area with a small margin
  let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

  frame.render_widget(Clear, overlay_area);

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(" Command ");

  let inner = block.inner(overlay_area);
  frame.render_widget(block, overlay_area);

  if inner.height == 0 {
    return;
  }

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Input line
      Constraint::Min(0),    // Suggestions
    ])
    .split(inner);

  let input_line = Line::from(vec![
    Span::styled(":", Style::default().fg(Color::Yellow)),
    Span::raw(input),
    Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
  ]);
  frame.render_widget(Paragraph::new(input_line), chunks[0]);

  if suggestions.is_empty() || chunks[1].height == 0 {
    return;
  }

  let items: Vec<ListItem> = suggestions
    .iter()
    .take(8)
    .map(|cmd| {
      let usage = if cmd.takes_arg {
        format!("{} <id>", cmd.name)
      } else {
        cmd.name.to_string()
      };
      ListItem::new(Line::from(vec![
        Span::styled(format!("{:<14}", usage), Style::default().fg(Color::Cyan)),
        Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
      ]))
    })
    .collect();

  let list =
    List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

  let mut state = ListState::default();
  state.select(Some(selected_suggestion));

  frame.render_stateful_widget(list, chunks[1], &mut state);
}
