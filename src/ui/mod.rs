mod components;
mod renderfns;
mod views;

use crate::app::{App, Mode};
use crate::db::KeyValueStore;
use crate::session::SessionView;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw<S: KeyValueStore>(frame: &mut Frame, app: &App<S>) {
  let view = app.session_view();

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app.api_url(), &view);
  views::practice::draw_practice(frame, chunks[1], &view);
  draw_status_bar(frame, chunks[2], app, &view);

  if *app.mode() == Mode::Command {
    components::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }
}

fn draw_status_bar<S: KeyValueStore>(
  frame: &mut Frame,
  area: Rect,
  app: &App<S>,
  view: &SessionView,
) {
  let (content, style) = match app.mode() {
    Mode::Command => (
      format!(":{}", app.command_input()),
      Style::default().fg(Color::Yellow),
    ),
    Mode::Normal => match (app.hint(), &view.notice) {
      (Some(hint), _) => (format!(" {}", hint), Style::default().fg(Color::Yellow)),
      (None, Some(notice)) => (
        format!(" {}", notice.message),
        Style::default().fg(Color::Cyan),
      ),
      _ => (
        " 1-9/j/k:choose  Enter:submit  n/p:next/prev  space:audio  r:restart  :command  q:quit"
          .to_string(),
        Style::default().fg(Color::DarkGray),
      ),
    },
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}
