use ratatui::prelude::Color;

use crate::session::SessionView;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Color of a choice: the correct one turns green and a wrong pick red once
/// the question has an answer; before that the selection is highlighted.
pub fn choice_color(view: &SessionView, index: usize) -> Color {
  let Some(question) = &view.question else {
    return Color::White;
  };

  match view.answer {
    Some(_) if question.is_correct(index) => Color::Green,
    Some(answer) if answer.choice_index == index => Color::Red,
    Some(_) => Color::DarkGray,
    None if view.selected == Some(index) => Color::Yellow,
    None => Color::White,
  }
}
