//! Practice session orchestrator.
//!
//! Opening content first tries to resume the stored session; otherwise
//! questions are fetched through the gateway under the retry policy. Every
//! applied transition is persisted and published to subscribers.
//!
//! All state changes happen on the caller's task. Background work (fetches,
//! best-effort progress reports) reports back through the app event channel,
//! and fetch results are tagged with a generation so responses for content
//! the learner already left are dropped.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, Question, QuestionSet};
use crate::db::KeyValueStore;
use crate::event::Event;
use crate::retry::{with_retry, RetryPolicy};

use super::machine::{Action, Outcome, Phase, Rejection, SessionMachine};
use super::snapshot::AnswerRecord;
use super::store::SessionStore;

/// Percentage at or above which a finished run counts as a pass
pub const PASS_PERCENT: u32 = 70;

/// Results of background work, delivered through the app event loop
#[derive(Debug)]
pub enum PracticeEvent {
  QuestionsLoaded {
    generation: u64,
    content_id: String,
    result: Result<QuestionSet, ApiError>,
  },
}

/// Short message shown alongside the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub message: String,
  pub success: bool,
}

impl Notice {
  fn info(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      success: false,
    }
  }
}

/// Read-only projection of the session for the view layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
  pub content_id: Option<String>,
  pub level: Option<String>,
  pub phase: Phase,
  /// 0-based index of the question on screen
  pub position: Option<usize>,
  pub total: usize,
  pub question: Option<Question>,
  pub selected: Option<usize>,
  /// Recorded answer for the question on screen
  pub answer: Option<AnswerRecord>,
  pub score: usize,
  pub answered: usize,
  pub is_playing: bool,
  pub audio_url: Option<String>,
  pub error: Option<String>,
  pub notice: Option<Notice>,
}

pub struct PracticeSession<S: KeyValueStore> {
  api: ApiClient,
  store: SessionStore<S>,
  policy: RetryPolicy,
  report_progress: bool,
  machine: SessionMachine,
  /// The completed run's score has been posted
  score_reported: bool,
  generation: u64,
  error: Option<String>,
  notice: Option<Notice>,
  events: mpsc::UnboundedSender<Event>,
  view: watch::Sender<SessionView>,
}

impl<S: KeyValueStore> PracticeSession<S> {
  pub fn new(
    api: ApiClient,
    store: SessionStore<S>,
    policy: RetryPolicy,
    events: mpsc::UnboundedSender<Event>,
  ) -> Self {
    let (view, _) = watch::channel(SessionView::default());
    Self {
      api,
      store,
      policy,
      report_progress: true,
      machine: SessionMachine::new(),
      score_reported: false,
      generation: 0,
      error: None,
      notice: None,
      events,
      view,
    }
  }

  /// Toggle best-effort answer and score reporting.
  pub fn with_progress_reporting(mut self, enabled: bool) -> Self {
    self.report_progress = enabled;
    self
  }

  /// Receive a fresh [`SessionView`] after every change.
  pub fn subscribe(&self) -> watch::Receiver<SessionView> {
    self.view.subscribe()
  }

  pub fn view(&self) -> SessionView {
    self.view.borrow().clone()
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Open `content_id`, resuming the stored session when it belongs to it.
  pub fn open(&mut self, content_id: &str) -> watch::Receiver<SessionView> {
    self.generation += 1;
    self.error = None;
    self.notice = None;
    self.score_reported = false;

    match self.store.load(content_id) {
      Some(snapshot) => {
        let score_reported = snapshot.score_reported;
        match self.machine.resume(snapshot) {
          Ok(()) => {
            info!(
              content_id = %content_id,
              answered = self.machine.answers().len(),
              "resumed stored session"
            );
            self.score_reported = score_reported;
            if self.machine.phase() == Phase::Completed {
              // Saved during the last question's feedback or after the run ended
              self.complete();
              self.persist();
            } else {
              self.notice = Some(Notice::info("Resumed previous session"));
            }
          }
          Err(e) => {
            warn!(content_id = %content_id, "Stored session cannot be resumed: {}", e);
            self.store.clear();
            self.fetch(content_id);
          }
        }
      }
      None => self.fetch(content_id),
    }

    self.publish();
    self.subscribe()
  }

  /// Drop all progress on the open content and fetch its questions again.
  pub fn restart(&mut self) -> Outcome {
    let Some(content_id) = self.machine.content_id().map(str::to_string) else {
      return Outcome::Rejected(Rejection::NotLoaded);
    };

    info!(content_id = %content_id, "restarting session");
    self.generation += 1;
    self.store.clear();
    self.machine.restart();
    self.score_reported = false;
    self.error = None;
    self.notice = Some(Notice::info("Starting a new practice run"));
    self.fetch(&content_id);
    self.publish();
    Outcome::Applied
  }

  fn fetch(&mut self, content_id: &str) {
    self.machine.begin_loading(content_id);

    let api = self.api.clone();
    let policy = self.policy;
    let tx = self.events.clone();
    let generation = self.generation;
    let content_id = content_id.to_string();

    tokio::spawn(async move {
      let result = with_retry(&policy, || api.fetch_questions(&content_id)).await;
      let _ = tx.send(Event::Practice(PracticeEvent::QuestionsLoaded {
        generation,
        content_id,
        result,
      }));
    });
  }

  pub fn handle_event(&mut self, event: PracticeEvent) {
    match event {
      PracticeEvent::QuestionsLoaded {
        generation,
        content_id,
        result,
      } => {
        if generation != self.generation
          || self.machine.phase() != Phase::Loading
          || self.machine.content_id() != Some(content_id.as_str())
        {
          debug!(
            content_id = %content_id,
            generation,
            current = self.generation,
            "ignoring stale questions response"
          );
          return;
        }

        match result {
          Ok(set) => {
            info!(
              content_id = %content_id,
              questions = set.questions.len(),
              "questions loaded"
            );
            self.machine.seed(set);
            self.persist();
          }
          Err(e) => {
            warn!(content_id = %content_id, "Failed to load questions: {}", e);
            self.error = Some(e.message);
          }
        }
        self.publish();
      }
    }
  }

  // ==========================================================================
  // Actions
  // ==========================================================================

  /// Apply a learner action. Rejected actions change nothing.
  pub fn dispatch(&mut self, action: Action) -> Outcome {
    if action == Action::Restart {
      return self.restart();
    }

    let before = self.machine.phase();
    let outcome = self.machine.dispatch(action);

    match outcome {
      Outcome::Applied => {
        if !matches!(action, Action::SetPlaying(_)) {
          self.notice = None;
        }
        if action == Action::Submit {
          self.report_answer();
        }
        if before == Phase::Feedback && self.machine.phase() == Phase::Completed {
          self.complete();
        }
        if !matches!(action, Action::SetPlaying(_)) {
          self.persist();
        }
        self.publish();
      }
      Outcome::Rejected(reason) => {
        debug!(?action, ?reason, "action rejected");
      }
    }

    outcome
  }

  fn complete(&mut self) {
    let total = self.machine.questions().len();
    let score = self.machine.score();
    let percent = percent(score, total);

    info!(score, total, percent, "session completed");
    self.notice = Some(Notice {
      message: format!("{}/{} ({}%)", score, total, percent),
      success: percent >= PASS_PERCENT,
    });
    if !self.score_reported {
      self.score_reported = self.report_score(percent);
    }
  }

  fn persist(&self) {
    if let Some(mut snapshot) = self.machine.snapshot() {
      snapshot.score_reported = self.score_reported;
      self.store.save(&snapshot);
    }
  }

  fn publish(&self) {
    self.view.send_replace(self.project());
  }

  fn project(&self) -> SessionView {
    let machine = &self.machine;
    let position = machine.display_index();
    let question = machine.displayed_question().cloned();
    let audio_url = question
      .as_ref()
      .and_then(|q| q.audio_ref.as_deref())
      .and_then(|r| self.api.audio_url(r))
      .map(|u| u.to_string());

    SessionView {
      content_id: machine.content_id().map(str::to_string),
      level: machine.level().map(str::to_string),
      phase: machine.phase(),
      position,
      total: machine.questions().len(),
      question,
      selected: machine.selected(),
      answer: position.and_then(|i| machine.answer_for(i)).copied(),
      score: machine.score(),
      answered: machine.answers().len(),
      is_playing: machine.playback().is_playing,
      audio_url,
      error: self.error.clone(),
      notice: self.notice.clone(),
    }
  }

  // ==========================================================================
  // Progress reporting
  // ==========================================================================

  fn report_answer(&self) {
    if !self.report_progress {
      return;
    }
    let (Some(content_id), Some(record)) = (
      self.machine.content_id().map(str::to_string),
      self.machine.answers().last().copied(),
    ) else {
      return;
    };

    let api = self.api.clone();
    tokio::spawn(async move {
      let result = api
        .submit_answer(
          &content_id,
          record.question_index,
          record.choice_index,
          record.is_correct,
        )
        .await;
      if let Err(e) = result {
        warn!(content_id = %content_id, "Failed to report answer: {}", e);
      }
    });
  }

  /// Post the final score in the background. Returns whether a report was sent.
  fn report_score(&self, percent: u32) -> bool {
    if !self.report_progress {
      return false;
    }
    let api = self.api.clone();
    let level = self.machine.level().map(str::to_string);

    tokio::spawn(async move {
      if let Err(e) = api.submit_score(f64::from(percent), level.as_deref()).await {
        warn!("Failed to report score: {}", e);
      }
    });
    true
  }
}

/// Rounded share of correct answers, 0 when there are no questions.
pub fn percent(score: usize, total: usize) -> u32 {
  if total == 0 {
    return 0;
  }
  ((score as f64 / total as f64) * 100.0).round() as u32
}
