use crate::commands::{self, Command, Invocation};
use crate::db::KeyValueStore;
use crate::event::{Event, EventHandler};
use crate::session::{Action, Outcome, PracticeSession, Rejection, SessionView};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Main application state
pub struct App<S: KeyValueStore> {
  session: PracticeSession<S>,

  /// API base URL, shown in the header
  api_url: String,

  /// Content opened at startup
  content_id: String,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Last rejected action, shown in the status bar
  hint: Option<&'static str>,

  /// Event handler feeding keys, ticks and background results
  events: EventHandler,

  /// Whether to quit
  should_quit: bool,
}

impl<S: KeyValueStore> App<S> {
  /// `build` receives the event sender background session work reports to.
  pub fn new(
    api_url: String,
    content_id: String,
    build: impl FnOnce(tokio::sync::mpsc::UnboundedSender<Event>) -> PracticeSession<S>,
  ) -> Self {
    let events = EventHandler::new(Duration::from_millis(250));
    let session = build(events.sender());

    Self {
      session,
      api_url,
      content_id,
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      hint: None,
      events,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let content_id = self.content_id.clone();
    let _ = self.session.open(&content_id);

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match self.events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::Practice(event) => self.session.handle_event(event),
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
    let action = match key.code {
      KeyCode::Char('q') => {
        self.should_quit = true;
        return;
      }
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
        return;
      }

      // Choices are numbered from 1 on screen
      KeyCode::Char(c @ '1'..='9') => Action::Select(c as usize - '1' as usize),
      KeyCode::Up | KeyCode::Char('k') => return self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => return self.move_selection(1),
      KeyCode::Enter => Action::Submit,
      KeyCode::Right | KeyCode::Char('n') => Action::Next,
      KeyCode::Left | KeyCode::Char('p') => Action::Previous,
      KeyCode::Char(' ') => Action::SetPlaying(!self.session.view().is_playing),
      KeyCode::Char('r') => Action::Restart,
      _ => return,
    };
    self.apply(action);
  }

  fn move_selection(&mut self, delta: i32) {
    let view = self.session.view();
    let Some(len) = view.question.as_ref().map(|q| q.choices.len()) else {
      return;
    };
    if len == 0 {
      return;
    }
    let next = match view.selected {
      Some(selected) => (selected as i32 + delta).rem_euclid(len as i32) as usize,
      None if delta < 0 => len - 1,
      None => 0,
    };
    self.apply(Action::Select(next));
  }

  fn apply(&mut self, action: Action) {
    self.hint = match self.session.dispatch(action) {
      Outcome::Applied => None,
      Outcome::Rejected(reason) => Some(rejection_hint(reason)),
    };
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
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

  fn execute_command(&mut self) {
    match commands::parse(&self.command_input, self.selected_suggestion) {
      Some(Invocation::Open(content_id)) => {
        self.content_id = content_id;
        let _ = self.session.open(&self.content_id);
        self.hint = None;
      }
      Some(Invocation::Restart) => self.apply(Action::Restart),
      Some(Invocation::Quit) => self.should_quit = true,
      None => self.hint = Some("Unknown command"),
    }
    self.command_input.clear();
  }

  // Accessors for UI rendering

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn api_url(&self) -> &str {
    &self.api_url
  }

  pub fn hint(&self) -> Option<&'static str> {
    self.hint
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }

  pub fn session_view(&self) -> SessionView {
    self.session.view()
  }
}

/// Status bar text for a rejected action
pub fn rejection_hint(reason: Rejection) -> &'static str {
  match reason {
    Rejection::NotLoaded => "No questions loaded",
    Rejection::NoSelection => "Pick an answer first",
    Rejection::InvalidChoice => "No such answer",
    Rejection::AudioPlaying => "Wait for the audio to finish",
    Rejection::AlreadyAnswered => "Already answered",
    Rejection::Unanswered => "Answer this question first",
    Rejection::AtFirstQuestion => "This is the first question",
    Rejection::Finished => "Session complete, press r to restart",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_rejection_has_a_hint() {
    let reasons = [
      Rejection::NotLoaded,
      Rejection::NoSelection,
      Rejection::InvalidChoice,
      Rejection::AudioPlaying,
      Rejection::AlreadyAnswered,
      Rejection::Unanswered,
      Rejection::AtFirstQuestion,
      Rejection::Finished,
    ];
    for reason in reasons {
      assert!(!rejection_hint(reason).is_empty());
    }
  }
}
