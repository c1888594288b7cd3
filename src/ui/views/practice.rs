use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::session::{Phase, SessionView};
use crate::ui::renderfns::utils::choice_color;

/// Draw the practice panel for the current session state
pub fn draw_practice(frame: &mut Frame, area: Rect, view: &SessionView) {
  let title = match (view.phase, view.position) {
    (Phase::Reviewing, Some(i)) => format!(" Reviewing {}/{} ", i + 1, view.total),
    (_, Some(i)) => format!(" Question {}/{} ", i + 1, view.total),
    (Phase::Completed, None) => " Complete ".to_string(),
    _ => " Practice ".to_string(),
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let inner = block.inner(area);
  frame.render_widget(block, area);

  let lines = match view.phase {
    Phase::Loading => loading_lines(view),
    Phase::Empty => vec![Line::styled(
      "This content has no questions yet.",
      Style::default().fg(Color::DarkGray),
    )],
    Phase::Completed => completed_lines(view),
    Phase::Ready | Phase::Answering | Phase::Feedback | Phase::Reviewing => question_lines(view),
  };

  let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
  frame.render_widget(paragraph, inner);
}

fn loading_lines(view: &SessionView) -> Vec<Line<'static>> {
  match &view.error {
    Some(error) => vec![
      Line::styled(format!("Error: {}", error), Style::default().fg(Color::Red)),
      Line::raw(""),
      Line::styled("Press 'r' to retry.", Style::default().fg(Color::DarkGray)),
    ],
    None => vec![Line::styled(
      "Loading questions...",
      Style::default().fg(Color::DarkGray),
    )],
  }
}

fn completed_lines(view: &SessionView) -> Vec<Line<'static>> {
  let mut lines = vec![Line::styled(
    "Session complete",
    Style::default().fg(Color::Cyan).bold(),
  )];

  if let Some(notice) = &view.notice {
    let color = if notice.success {
      Color::Green
    } else {
      Color::Yellow
    };
    lines.push(Line::styled(
      format!("Score: {}", notice.message),
      Style::default().fg(color),
    ));
  } else {
    lines.push(Line::raw(format!("Score: {}/{}", view.score, view.total)));
  }

  lines.push(Line::raw(""));
  lines.push(Line::styled(
    "p: review answers   r: start over   q: quit",
    Style::default().fg(Color::DarkGray),
  ));
  lines
}

fn question_lines(view: &SessionView) -> Vec<Line<'static>> {
  let Some(question) = &view.question else {
    return Vec::new();
  };

  let mut lines = vec![
    Line::styled(question.prompt.clone(), Style::default().bold()),
    Line::raw(""),
  ];

  if let Some(url) = &view.audio_url {
    let (label, color) = if view.is_playing {
      ("playing", Color::Yellow)
    } else {
      ("space to play", Color::DarkGray)
    };
    lines.push(Line::from(vec![
      Span::styled("♪ ", Style::default().fg(Color::Cyan)),
      Span::raw(url.clone()),
      Span::styled(format!("  [{}]", label), Style::default().fg(color)),
    ]));
    lines.push(Line::raw(""));
  }

  for (i, choice) in question.choices.iter().enumerate() {
    let marker = if view.selected == Some(i) || view.answer.map(|a| a.choice_index) == Some(i) {
      ">"
    } else {
      " "
    };
    lines.push(Line::styled(
      format!("{} {}. {}", marker, i + 1, choice),
      Style::default().fg(choice_color(view, i)),
    ));
  }

  if let Some(answer) = view.answer {
    lines.push(Line::raw(""));
    if answer.is_correct {
      lines.push(Line::styled("Correct!", Style::default().fg(Color::Green).bold()));
    } else {
      lines.push(Line::styled(
        format!(
          "Incorrect. The answer is {}.",
          question.correct_choice + 1
        ),
        Style::default().fg(Color::Red).bold(),
      ));
    }
    if let Some(explanation) = &question.explanation {
      lines.push(Line::styled(
        explanation.clone(),
        Style::default().fg(Color::DarkGray),
      ));
    }
  }

  lines
}
