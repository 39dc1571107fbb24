//! Request-and-reveal controller.
//!
//! A [`Session`] owns the state of one question/answer view: the question
//! being edited, whether a request is outstanding, the last error, the last
//! answer, and the part of that answer revealed so far. A successful answer is
//! revealed one character per tick by a spawned tokio task; a newer answer (or
//! a new submission) aborts the running reveal before anything else happens.
//!
//! Every state change is also sent as a [`SessionEvent`] so a front end can
//! render without polling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::AnswerClient;

/// Shown when the question is empty after trimming.
pub const VALIDATION_MESSAGE: &str = "Please write a question.";

/// Shown when the answer service could not be reached or replied badly.
pub const REQUEST_FAILURE_MESSAGE: &str =
    "We could not get a response from the server. Is the backend running?";

/// Snapshot of a session's observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub question: String,
    pub pending: bool,
    pub error: Option<String>,
    pub answer: Option<String>,
    /// Always a prefix of `answer`.
    pub displayed: String,
    pub revealing: bool,
}

/// State transitions, in the order they were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Error, answer and displayed text were reset for a new attempt.
    Cleared,
    Pending(bool),
    /// A user-facing error message was set.
    Failed(String),
    /// A new answer was stored; its reveal starts one tick later.
    Answered(String),
    /// One more character was appended to the displayed text.
    Typed(char),
    RevealFinished,
}

/// How a call to [`Session::submit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Answered,
    /// Empty question; nothing was sent.
    Rejected,
    Failed,
    /// A request was already pending; nothing changed.
    Busy,
}

pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

struct Inner {
    view: SessionState,
    /// Bumped whenever `answer` changes; a reveal only writes while current.
    generation: u64,
}

struct Shared {
    state: Mutex<Inner>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // The front end may have gone away; the session keeps working.
        let _ = self.events.send(event);
    }

    /// Reveal one more character. Returns whether the reveal should go on.
    fn reveal_step(&self, generation: u64) -> bool {
        let mut guard = self.lock();
        if guard.generation != generation {
            return false;
        }
        let view = &mut guard.view;
        let Some(answer) = view.answer.as_deref() else {
            view.revealing = false;
            return false;
        };
        let Some(ch) = answer[view.displayed.len()..].chars().next() else {
            view.revealing = false;
            return false;
        };
        view.displayed.push(ch);
        self.emit(SessionEvent::Typed(ch));
        if view.displayed.len() < answer.len() {
            return true;
        }
        view.revealing = false;
        self.emit(SessionEvent::RevealFinished);
        false
    }
}

/// Clears `pending` when the request attempt ends, however it ends.
struct PendingGuard<'a> {
    shared: &'a Shared,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.shared.lock();
        guard.view.pending = false;
        self.shared.emit(SessionEvent::Pending(false));
    }
}

/// One question/answer view backed by an [`AnswerClient`].
pub struct Session<C> {
    client: C,
    shared: Arc<Shared>,
    reveal_task: Mutex<Option<JoinHandle<()>>>,
    reveal_interval: Duration,
}

impl<C: AnswerClient> Session<C> {
    /// Create a session and the receiving end of its event stream.
    ///
    /// A zero `reveal_interval` is raised to one millisecond.
    pub fn new(client: C, reveal_interval: Duration) -> (Self, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            client,
            shared: Arc::new(Shared {
                state: Mutex::new(Inner {
                    view: SessionState::default(),
                    generation: 0,
                }),
                events: tx,
            }),
            reveal_task: Mutex::new(None),
            reveal_interval: reveal_interval.max(Duration::from_millis(1)),
        };
        (session, rx)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn reveal_interval(&self) -> Duration {
        self.reveal_interval
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.lock().view.clone()
    }

    /// Replace the question text (the user edited the input).
    pub fn set_question(&self, text: impl Into<String>) {
        self.shared.lock().view.question = text.into();
    }

    /// Submit the current question.
    ///
    /// Clears the previous error and answer, validates the question, then asks
    /// the client. The outcome is also reflected in the session state: an
    /// answer starts a reveal, a failure sets a fixed error message. The
    /// question itself is kept so the user can retry.
    pub async fn submit(&self) -> SubmitOutcome {
        let question = {
            let mut guard = self.shared.lock();
            if guard.view.pending {
                tracing::debug!("submit ignored, a request is already pending");
                return SubmitOutcome::Busy;
            }

            guard.generation += 1;
            let view = &mut guard.view;
            view.error = None;
            view.answer = None;
            view.displayed.clear();
            view.revealing = false;
            self.shared.emit(SessionEvent::Cleared);

            if view.question.trim().is_empty() {
                view.error = Some(VALIDATION_MESSAGE.to_string());
                self.shared
                    .emit(SessionEvent::Failed(VALIDATION_MESSAGE.to_string()));
                drop(guard);
                self.cancel_reveal();
                return SubmitOutcome::Rejected;
            }

            view.pending = true;
            self.shared.emit(SessionEvent::Pending(true));
            view.question.clone()
        };
        self.cancel_reveal();

        let pending = PendingGuard {
            shared: &self.shared,
        };
        let result = self.client.ask(&question).await;

        let (outcome, reveal) = {
            let mut guard = self.shared.lock();
            match result {
                Ok(answer) => {
                    guard.generation += 1;
                    let generation = guard.generation;
                    let view = &mut guard.view;
                    view.revealing = !answer.is_empty();
                    view.answer = Some(answer.clone());
                    self.shared.emit(SessionEvent::Answered(answer.clone()));
                    let reveal = (!answer.is_empty()).then_some(generation);
                    (SubmitOutcome::Answered, reveal)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "answer request failed");
                    guard.view.error = Some(REQUEST_FAILURE_MESSAGE.to_string());
                    self.shared
                        .emit(SessionEvent::Failed(REQUEST_FAILURE_MESSAGE.to_string()));
                    (SubmitOutcome::Failed, None)
                }
            }
        };
        drop(pending);

        if let Some(generation) = reveal {
            self.arm_reveal(generation);
        }
        outcome
    }

    /// Start revealing the answer stored under `generation`, replacing any
    /// running reveal. Does nothing if a newer answer or attempt already took
    /// over, so a late caller can never abort the current reveal.
    fn arm_reveal(&self, generation: u64) {
        let mut slot = self
            .reveal_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.shared.lock().generation != generation {
            tracing::debug!(generation, "stale reveal not started");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let period = self.reveal_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !shared.reveal_step(generation) {
                    break;
                }
            }
        });
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }
}

impl<C> Session<C> {
    fn cancel_reveal(&self) {
        let task = self
            .reveal_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl<C> Drop for Session<C> {
    fn drop(&mut self) {
        self.cancel_reveal();
    }
}
