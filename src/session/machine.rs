//! Practice flow state machine.
//!
//! ```text
//! Loading -> Ready(i) -> Answering(i) -> Feedback(i) -> Ready(i+1) | Completed
//!        \-> Empty
//! ```
//!
//! `previous` opens a read-only `Reviewing` phase over already answered
//! questions; walking forward past the last reviewed question returns to
//! the phase the learner left. Answers are append-only and never rescored.
//!
//! Invalid actions are rejected without side effects and reported as
//! [`Outcome::Rejected`], never as errors.

use crate::api::{Question, QuestionSet};

use super::snapshot::{AnswerRecord, SessionSnapshot, SnapshotError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
  /// Waiting for questions
  #[default]
  Loading,
  /// The content has no questions
  Empty,
  /// Showing a question, nothing selected
  Ready,
  /// A choice is selected but not submitted
  Answering,
  /// The answer was scored
  Feedback,
  /// Looking back at an answered question
  Reviewing,
  Completed,
}

/// Learner actions dispatched by the view layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Select(usize),
  Submit,
  Next,
  Previous,
  Restart,
  SetPlaying(bool),
}

/// Why an action was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  NotLoaded,
  NoSelection,
  InvalidChoice,
  AudioPlaying,
  AlreadyAnswered,
  Unanswered,
  AtFirstQuestion,
  Finished,
}

#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Applied,
  Rejected(Rejection),
}

impl Outcome {
  pub fn is_applied(&self) -> bool {
    matches!(self, Outcome::Applied)
  }
}

/// Audio playback state. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
  pub is_playing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Review {
  index: usize,
  /// Phase to restore when the cursor returns to the frontier
  resume: Phase,
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
  phase: Phase,
  content_id: Option<String>,
  level: Option<String>,
  questions: Vec<Question>,
  /// Question being answered; equals `questions.len()` once completed
  current_index: usize,
  answers: Vec<AnswerRecord>,
  score: usize,
  selected: Option<usize>,
  review: Option<Review>,
  playback: PlaybackState,
}

impl Default for SessionMachine {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionMachine {
  pub fn new() -> Self {
    Self {
      phase: Phase::Loading,
      content_id: None,
      level: None,
      questions: Vec::new(),
      current_index: 0,
      answers: Vec::new(),
      score: 0,
      selected: None,
      review: None,
      playback: PlaybackState::default(),
    }
  }

  // ==========================================================================
  // Seeding
  // ==========================================================================

  /// Drop all progress and wait for questions for `content_id`.
  pub fn begin_loading(&mut self, content_id: &str) {
    *self = Self::new();
    self.content_id = Some(content_id.to_string());
  }

  /// Start a fresh run from fetched questions.
  pub fn seed(&mut self, set: QuestionSet) {
    *self = Self::new();
    self.content_id = Some(set.content_id);
    self.level = set.level;
    self.phase = if set.questions.is_empty() {
      Phase::Empty
    } else {
      Phase::Ready
    };
    self.questions = set.questions;
  }

  /// Continue a persisted run where it left off.
  pub fn resume(&mut self, snapshot: SessionSnapshot) -> Result<(), SnapshotError> {
    snapshot.validate()?;

    *self = Self::new();
    self.phase = if snapshot.completed {
      Phase::Completed
    } else {
      Phase::Ready
    };
    self.content_id = Some(snapshot.content_id);
    self.level = snapshot.level;
    self.questions = snapshot.questions;
    self.current_index = snapshot.current_index;
    self.answers = snapshot.answers;
    self.score = snapshot.score;
    Ok(())
  }

  /// Forget all progress for the open content and go back to loading.
  pub fn restart(&mut self) {
    let content_id = self.content_id.take();
    *self = Self::new();
    self.content_id = content_id;
  }

  // ==========================================================================
  // Actions
  // ==========================================================================

  pub fn dispatch(&mut self, action: Action) -> Outcome {
    match action {
      Action::Select(choice) => self.select(choice),
      Action::Submit => self.submit(),
      Action::Next => self.next(),
      Action::Previous => self.previous(),
      Action::Restart => {
        self.restart();
        Outcome::Applied
      }
      Action::SetPlaying(playing) => self.set_playing(playing),
    }
  }

  /// Select a choice for the current question. Allowed during playback.
  pub fn select(&mut self, choice: usize) -> Outcome {
    match self.phase {
      Phase::Loading | Phase::Empty => Outcome::Rejected(Rejection::NotLoaded),
      Phase::Completed => Outcome::Rejected(Rejection::Finished),
      Phase::Feedback | Phase::Reviewing => Outcome::Rejected(Rejection::AlreadyAnswered),
      Phase::Ready | Phase::Answering => {
        let choices = self.questions[self.current_index].choices.len();
        if choice >= choices {
          return Outcome::Rejected(Rejection::InvalidChoice);
        }
        self.selected = Some(choice);
        self.phase = Phase::Answering;
        Outcome::Applied
      }
    }
  }

  /// Score the selected choice.
  ///
  /// Fires at most once per question and never while audio is playing.
  pub fn submit(&mut self) -> Outcome {
    match self.phase {
      Phase::Loading | Phase::Empty => Outcome::Rejected(Rejection::NotLoaded),
      Phase::Completed => Outcome::Rejected(Rejection::Finished),
      Phase::Feedback | Phase::Reviewing => Outcome::Rejected(Rejection::AlreadyAnswered),
      Phase::Ready => Outcome::Rejected(Rejection::NoSelection),
      Phase::Answering => {
        let Some(choice) = self.selected else {
          return Outcome::Rejected(Rejection::NoSelection);
        };
        if self.playback.is_playing {
          return Outcome::Rejected(Rejection::AudioPlaying);
        }
        if self.answers.len() != self.current_index {
          return Outcome::Rejected(Rejection::AlreadyAnswered);
        }

        let is_correct = self.questions[self.current_index].is_correct(choice);
        self.answers.push(AnswerRecord {
          question_index: self.current_index,
          choice_index: choice,
          is_correct,
        });
        if is_correct {
          self.score += 1;
        }
        self.phase = Phase::Feedback;
        Outcome::Applied
      }
    }
  }

  /// Advance past feedback, or move the review cursor forward.
  pub fn next(&mut self) -> Outcome {
    match self.phase {
      Phase::Loading | Phase::Empty => Outcome::Rejected(Rejection::NotLoaded),
      Phase::Completed => Outcome::Rejected(Rejection::Finished),
      Phase::Ready | Phase::Answering => Outcome::Rejected(Rejection::Unanswered),
      Phase::Feedback => {
        self.current_index += 1;
        self.selected = None;
        self.phase = if self.current_index == self.questions.len() {
          Phase::Completed
        } else {
          Phase::Ready
        };
        self.playback = PlaybackState::default();
        Outcome::Applied
      }
      Phase::Reviewing => {
        let Some(mut review) = self.review else {
          return Outcome::Rejected(Rejection::NotLoaded);
        };
        review.index += 1;
        if review.index == self.frontier(review.resume) {
          self.phase = review.resume;
          self.review = None;
        } else {
          self.review = Some(review);
        }
        self.playback = PlaybackState::default();
        Outcome::Applied
      }
    }
  }

  /// Step back to review an earlier question.
  pub fn previous(&mut self) -> Outcome {
    match self.phase {
      Phase::Loading | Phase::Empty => Outcome::Rejected(Rejection::NotLoaded),
      Phase::Reviewing => match self.review {
        Some(ref mut review) if review.index > 0 => {
          review.index -= 1;
          self.playback = PlaybackState::default();
          Outcome::Applied
        }
        _ => Outcome::Rejected(Rejection::AtFirstQuestion),
      },
      phase @ (Phase::Ready | Phase::Answering | Phase::Feedback | Phase::Completed) => {
        let position = self.frontier(phase);
        if position == 0 {
          return Outcome::Rejected(Rejection::AtFirstQuestion);
        }
        self.review = Some(Review {
          index: position - 1,
          resume: phase,
        });
        self.phase = Phase::Reviewing;
        self.playback = PlaybackState::default();
        Outcome::Applied
      }
    }
  }

  /// Update playback state for the displayed question.
  pub fn set_playing(&mut self, playing: bool) -> Outcome {
    if self.display_index().is_none() {
      return Outcome::Rejected(match self.phase {
        Phase::Completed => Rejection::Finished,
        _ => Rejection::NotLoaded,
      });
    }
    self.playback.is_playing = playing;
    Outcome::Applied
  }

  /// Cursor position of the answering flow when leaving `phase`.
  fn frontier(&self, phase: Phase) -> usize {
    match phase {
      Phase::Completed => self.questions.len(),
      _ => self.current_index,
    }
  }

  // ==========================================================================
  // Accessors
  // ==========================================================================

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn content_id(&self) -> Option<&str> {
    self.content_id.as_deref()
  }

  pub fn level(&self) -> Option<&str> {
    self.level.as_deref()
  }

  pub fn questions(&self) -> &[Question] {
    &self.questions
  }

  pub fn current_index(&self) -> usize {
    self.current_index
  }

  pub fn answers(&self) -> &[AnswerRecord] {
    &self.answers
  }

  pub fn score(&self) -> usize {
    self.score
  }

  pub fn selected(&self) -> Option<usize> {
    self.selected
  }

  pub fn playback(&self) -> PlaybackState {
    self.playback
  }

  /// Index of the question on screen, if any.
  pub fn display_index(&self) -> Option<usize> {
    match self.phase {
      Phase::Ready | Phase::Answering | Phase::Feedback => Some(self.current_index),
      Phase::Reviewing => self.review.map(|r| r.index),
      Phase::Loading | Phase::Empty | Phase::Completed => None,
    }
  }

  pub fn displayed_question(&self) -> Option<&Question> {
    self.display_index().and_then(|i| self.questions.get(i))
  }

  pub fn answer_for(&self, question_index: usize) -> Option<&AnswerRecord> {
    self.answers.get(question_index)
  }

  /// Persistable view of the session, once questions are loaded.
  pub fn snapshot(&self) -> Option<SessionSnapshot> {
    if matches!(self.phase, Phase::Loading | Phase::Empty) {
      return None;
    }
    let content_id = self.content_id.clone()?;

    Some(SessionSnapshot {
      content_id,
      level: self.level.clone(),
      questions: self.questions.clone(),
      current_index: self.answers.len(),
      answers: self.answers.clone(),
      score: self.score,
      completed: self.answers.len() == self.questions.len(),
      score_reported: false,
      saved_at: None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::snapshot::tests::questions;
  use proptest::prelude::*;

  /// Three questions; correct choices are 0, 1 and 2.
  fn seeded() -> SessionMachine {
    let mut machine = SessionMachine::new();
    machine.begin_loading("abc");
    machine.seed(QuestionSet {
      content_id: "abc".into(),
      title: None,
      level: Some("intermediate".into()),
      questions: questions(3),
    });
    machine
  }

  fn answer(machine: &mut SessionMachine, choice: usize) {
    assert_eq!(machine.select(choice), Outcome::Applied);
    assert_eq!(machine.submit(), Outcome::Applied);
    assert_eq!(machine.next(), Outcome::Applied);
  }

  #[test]
  fn test_full_run_scores_and_completes() {
    let mut machine = seeded();
    assert_eq!(machine.phase(), Phase::Ready);

    answer(&mut machine, 0);
    answer(&mut machine, 0);
    answer(&mut machine, 2);

    assert_eq!(machine.phase(), Phase::Completed);
    assert_eq!(machine.score(), 2);
    assert_eq!(machine.answers().len(), 3);
    assert!(!machine.answers()[1].is_correct);

    let snapshot = machine.snapshot().unwrap();
    assert!(snapshot.completed);
    assert_eq!(snapshot.current_index, 3);
  }

  #[test]
  fn test_empty_question_set() {
    let mut machine = SessionMachine::new();
    machine.seed(QuestionSet {
      content_id: "abc".into(),
      title: None,
      level: None,
      questions: Vec::new(),
    });

    assert_eq!(machine.phase(), Phase::Empty);
    assert_eq!(machine.select(0), Outcome::Rejected(Rejection::NotLoaded));
    assert_eq!(machine.next(), Outcome::Rejected(Rejection::NotLoaded));
    assert!(machine.snapshot().is_none());
  }

  #[test]
  fn test_submit_without_selection_has_no_effect() {
    let mut machine = seeded();

    assert_eq!(machine.submit(), Outcome::Rejected(Rejection::NoSelection));
    assert_eq!(machine.phase(), Phase::Ready);
    assert!(machine.answers().is_empty());
  }

  #[test]
  fn test_double_submit_is_rejected() {
    let mut machine = seeded();
    let _ = machine.select(0);

    assert_eq!(machine.submit(), Outcome::Applied);
    assert_eq!(machine.submit(), Outcome::Rejected(Rejection::AlreadyAnswered));
    assert_eq!(machine.answers().len(), 1);
    assert_eq!(machine.score(), 1);
  }

  #[test]
  fn test_invalid_choice_is_rejected() {
    let mut machine = seeded();

    assert_eq!(machine.select(4), Outcome::Rejected(Rejection::InvalidChoice));
    assert_eq!(machine.phase(), Phase::Ready);
    assert_eq!(machine.selected(), None);
  }

  #[test]
  fn test_next_requires_an_answer() {
    let mut machine = seeded();
    assert_eq!(machine.next(), Outcome::Rejected(Rejection::Unanswered));

    let _ = machine.select(1);
    assert_eq!(machine.next(), Outcome::Rejected(Rejection::Unanswered));
  }

  #[test]
  fn test_submit_blocked_while_audio_plays() {
    let mut machine = seeded();
    assert_eq!(machine.set_playing(true), Outcome::Applied);

    // Selecting during playback is fine
    assert_eq!(machine.select(0), Outcome::Applied);
    assert_eq!(machine.submit(), Outcome::Rejected(Rejection::AudioPlaying));
    assert!(machine.answers().is_empty());

    assert_eq!(machine.set_playing(false), Outcome::Applied);
    assert_eq!(machine.submit(), Outcome::Applied);
  }

  #[test]
  fn test_playback_resets_on_question_change() {
    let mut machine = seeded();
    let _ = machine.select(0);
    let _ = machine.submit();
    let _ = machine.set_playing(true);

    assert_eq!(machine.next(), Outcome::Applied);
    assert!(!machine.playback().is_playing);
  }

  #[test]
  fn test_previous_at_first_question_is_rejected() {
    let mut machine = seeded();
    assert_eq!(machine.previous(), Outcome::Rejected(Rejection::AtFirstQuestion));

    let _ = machine.select(0);
    let _ = machine.submit();
    assert_eq!(machine.previous(), Outcome::Rejected(Rejection::AtFirstQuestion));
  }

  #[test]
  fn test_review_is_read_only_and_returns_to_frontier() {
    let mut machine = seeded();
    answer(&mut machine, 3);
    let _ = machine.select(1);

    assert_eq!(machine.previous(), Outcome::Applied);
    assert_eq!(machine.phase(), Phase::Reviewing);
    assert_eq!(machine.display_index(), Some(0));
    assert_eq!(machine.answer_for(0).map(|a| a.choice_index), Some(3));

    assert_eq!(machine.select(0), Outcome::Rejected(Rejection::AlreadyAnswered));
    assert_eq!(machine.submit(), Outcome::Rejected(Rejection::AlreadyAnswered));
    assert_eq!(machine.score(), 0);

    assert_eq!(machine.next(), Outcome::Applied);
    assert_eq!(machine.phase(), Phase::Answering);
    assert_eq!(machine.display_index(), Some(1));
    assert_eq!(machine.selected(), Some(1));
  }

  #[test]
  fn test_review_from_completed() {
    let mut machine = seeded();
    answer(&mut machine, 0);
    answer(&mut machine, 1);
    answer(&mut machine, 2);

    assert_eq!(machine.previous(), Outcome::Applied);
    assert_eq!(machine.display_index(), Some(2));
    assert_eq!(machine.previous(), Outcome::Applied);
    assert_eq!(machine.previous(), Outcome::Applied);
    assert_eq!(machine.previous(), Outcome::Rejected(Rejection::AtFirstQuestion));
    assert_eq!(machine.display_index(), Some(0));

    for _ in 0..3 {
      assert_eq!(machine.next(), Outcome::Applied);
    }
    assert_eq!(machine.phase(), Phase::Completed);
    assert_eq!(machine.score(), 3);
  }

  #[test]
  fn test_restart_keeps_content_and_clears_progress() {
    let mut machine = seeded();
    answer(&mut machine, 0);

    assert_eq!(machine.dispatch(Action::Restart), Outcome::Applied);
    assert_eq!(machine.phase(), Phase::Loading);
    assert_eq!(machine.content_id(), Some("abc"));
    assert_eq!(machine.current_index(), 0);
    assert!(machine.answers().is_empty());
    assert_eq!(machine.score(), 0);
  }

  #[test]
  fn test_resume_from_snapshot() {
    let mut machine = seeded();
    answer(&mut machine, 0);
    let snapshot = machine.snapshot().unwrap();

    let mut resumed = SessionMachine::new();
    resumed.resume(snapshot).unwrap();

    assert_eq!(resumed.phase(), Phase::Ready);
    assert_eq!(resumed.current_index(), 1);
    assert_eq!(resumed.score(), 1);
    assert_eq!(resumed.level(), Some("intermediate"));
  }

  #[test]
  fn test_snapshot_during_last_feedback_resumes_completed() {
    let mut machine = seeded();
    answer(&mut machine, 0);
    answer(&mut machine, 1);
    let _ = machine.select(2);
    let _ = machine.submit();
    assert_eq!(machine.phase(), Phase::Feedback);

    let mut resumed = SessionMachine::new();
    resumed.resume(machine.snapshot().unwrap()).unwrap();
    assert_eq!(resumed.phase(), Phase::Completed);
  }

  #[test]
  fn test_resume_rejects_inconsistent_snapshot() {
    let mut machine = seeded();
    answer(&mut machine, 0);
    let mut snapshot = machine.snapshot().unwrap();
    snapshot.score = 0;

    let mut resumed = SessionMachine::new();
    assert!(resumed.resume(snapshot).is_err());
    assert_eq!(resumed.phase(), Phase::Loading);
  }

  fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
      (0..5usize).prop_map(Action::Select),
      Just(Action::Submit),
      Just(Action::Next),
      Just(Action::Previous),
      any::<bool>().prop_map(Action::SetPlaying),
    ]
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Score and snapshot invariants survive any sequence of learner actions
    #[test]
    fn prop_invariants_hold_for_action_sequences(
      actions in prop::collection::vec(action_strategy(), 0..40)
    ) {
      let mut machine = seeded();
      for action in actions {
        let was_feedback = machine.phase() == Phase::Feedback;
        let outcome = machine.dispatch(action);

        if was_feedback && action == Action::Next && machine.phase() == Phase::Ready {
          prop_assert_eq!(machine.current_index(), machine.answers().len());
        }
        if !outcome.is_applied() {
          continue;
        }

        let correct = machine.answers().iter().filter(|a| a.is_correct).count();
        prop_assert_eq!(machine.score(), correct);
        prop_assert!(machine.answers().len() <= machine.questions().len());
        if let Some(snapshot) = machine.snapshot() {
          prop_assert_eq!(snapshot.validate(), Ok(()));
        }
      }
    }
  }
}
