//! The conversation session: owns the ordered message history and mediates
//! every generation and revision request.
//!
//! A [`StorySession`] is created once per review session. [`StorySession::start`]
//! seeds the history from the intake record (system instructions + user
//! answers) and runs the first generation; [`StorySession::revise`] appends a
//! free-text instruction and re-invokes the model with the full history, so
//! the model keeps every prior draft as context even though only the latest
//! is user-visible.
//!
//! History invariants, enforced here and checked by the tests:
//! - the first message is `system`, set exactly once when the session seeds;
//! - a `user` message is appended before any generation attempt, and the
//!   matching `assistant` message is appended only on success;
//! - the history never shrinks, and no failure path leaves a partial
//!   assistant entry behind.
//!
//! At most one generation is in flight at a time: both entry points are
//! guarded by an atomic busy flag, and a call issued while one is pending is
//! rejected with [`SessionError::Busy`]. The history mutex is never held
//! across an await, so overlapping callers can never interleave writes.

use crate::error::SessionError;
use crate::intake::Intake;
use crate::prompt::build_initial_history;
use crate::{CompletionBackend, Message, MessageRole};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

// ── State machine ──────────────────────────────────────────────────

/// Lifecycle state of a session.
///
/// Transitions: `Idle → Generating` on `start`; `Generating → Ready` when a
/// cycle succeeds and `Generating → Failed` when it fails; `Ready`/`Failed`
/// back to `Generating` on the next `start`/`revise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No generation attempted yet.
    Idle,
    /// A generation call is in flight.
    Generating,
    /// The last cycle succeeded; a current draft exists.
    Ready,
    /// The last cycle failed; the history is intact up to the failure.
    Failed,
}

struct SessionInner {
    history: Vec<Message>,
    state: SessionState,
}

// ── Busy guard ─────────────────────────────────────────────────────

/// Releases the busy flag when a generation cycle ends, on every path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── StorySession ───────────────────────────────────────────────────

/// A single user's story conversation with the model.
///
/// Methods take `&self` so the session can sit behind a shared reference
/// (UI callbacks, spawned tasks); the internal mutex plus busy flag give
/// the exclusive-writer guarantee instead of the borrow checker.
///
/// There is no cancellation: once issued, a generation runs to completion.
/// A caller that has navigated away may simply discard the result.
pub struct StorySession<'a> {
    backend: &'a dyn CompletionBackend,
    inner: Mutex<SessionInner>,
    busy: AtomicBool,
}

impl<'a> StorySession<'a> {
    /// Create an idle session with an empty history.
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self {
            backend,
            inner: Mutex::new(SessionInner {
                history: Vec::new(),
                state: SessionState::Idle,
            }),
            busy: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Snapshot of the full conversation history.
    pub fn history(&self) -> Vec<Message> {
        self.lock().history.clone()
    }

    /// The current story: content of the most recent `assistant` message,
    /// or `None` until the first successful generation.
    pub fn current_story(&self) -> Option<String> {
        self.lock()
            .history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.clone())
    }

    /// Seed the history from the intake record and generate the first draft.
    ///
    /// On success the draft is appended as an `assistant` message and
    /// returned; on failure the history stays at the seeded system/user
    /// pair. Calling `start` again reseeds the conversation wholesale —
    /// the prior review's history is discarded, matching a user going back
    /// to the form and re-entering review.
    pub async fn start(&self, intake: &Intake) -> Result<String, SessionError> {
        intake.validate()?;
        let _guard = self.acquire_busy()?;

        let seeded = build_initial_history(intake);
        {
            let mut inner = self.lock();
            inner.history = seeded.clone();
            inner.state = SessionState::Generating;
        }
        info!("starting story generation ({} answers)", intake.questions_and_answers.len());

        self.run_cycle(seeded).await
    }

    /// Append a revision instruction and regenerate with the full history.
    ///
    /// Requires a prior successful `start`. On failure the appended user
    /// instruction remains in history — a retried revise reuses it as
    /// context without re-appending — and no assistant entry is added.
    pub async fn revise(&self, instruction: &str) -> Result<String, SessionError> {
        let _guard = self.acquire_busy()?;

        let snapshot = {
            let mut inner = self.lock();
            let started = inner
                .history
                .iter()
                .any(|m| m.role == MessageRole::Assistant);
            if !started {
                return Err(SessionError::NotStarted);
            }
            inner.history.push(Message::user(instruction));
            inner.state = SessionState::Generating;
            inner.history.clone()
        };
        info!("revising story (history: {} messages)", snapshot.len());

        self.run_cycle(snapshot).await
    }

    /// One generation attempt against a history snapshot. The caller holds
    /// the busy guard; the history lock is only taken again after the await
    /// resolves.
    async fn run_cycle(&self, snapshot: Vec<Message>) -> Result<String, SessionError> {
        let result = self.backend.generate(snapshot).await;

        let mut inner = self.lock();
        match result {
            Ok(text) => {
                inner.history.push(Message::assistant(&text));
                inner.state = SessionState::Ready;
                debug!(
                    "draft ready: {} chars, history now {} messages",
                    text.len(),
                    inner.history.len()
                );
                Ok(text)
            }
            Err(e) => {
                inner.state = SessionState::Failed;
                warn!("generation failed: {e}");
                Err(SessionError::Generation(e))
            }
        }
    }

    /// Claim the single in-flight slot, or reject with [`SessionError::Busy`].
    fn acquire_busy(&self) -> Result<BusyGuard<'_>, SessionError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::intake::QuestionAnswer;
    use crate::CompletionFuture;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn jane_intake() -> Intake {
        Intake {
            name: "Jane".into(),
            email: "jane@example.com".into(),
            phone: "555-0100".into(),
            questions_and_answers: vec![QuestionAnswer {
                question: "What challenge?".into(),
                answer: "Public speaking fear".into(),
            }],
        }
    }

    /// Backend that pops scripted outcomes in order.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
            }
        }
    }

    impl CompletionBackend for ScriptedBackend {
        fn generate(&self, _history: Vec<Message>) -> CompletionFuture<'_> {
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::new("script exhausted")));
            Box::pin(async move { next })
        }
    }

    /// Backend that blocks until notified, to hold a generation in flight.
    struct GatedBackend {
        gate: Arc<Notify>,
    }

    impl CompletionBackend for GatedBackend {
        fn generate(&self, _history: Vec<Message>) -> CompletionFuture<'_> {
            let gate = self.gate.clone();
            Box::pin(async move {
                gate.notified().await;
                Ok("slow draft".to_string())
            })
        }
    }

    #[tokio::test]
    async fn start_appends_assistant_and_returns_draft() {
        let backend = ScriptedBackend::new(vec![Ok("A Story".into())]);
        let session = StorySession::new(&backend);

        let draft = session.start(&jane_intake()).await.unwrap();
        assert_eq!(draft, "A Story");
        assert_eq!(session.state(), SessionState::Ready);

        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, MessageRole::System);
        assert_eq!(history[1].role, MessageRole::User);
        assert_eq!(history[2].role, MessageRole::Assistant);
        assert!(history[1].content.contains("Jane"));
        assert!(history[1].content.contains("Public speaking fear"));
        assert_eq!(session.current_story().as_deref(), Some("A Story"));
    }

    #[tokio::test]
    async fn failed_start_leaves_seeded_pair_only() {
        let backend = ScriptedBackend::new(vec![Err(GenerationError::new(
            "OpenAI API HTTP 500: oops",
        ))]);
        let session = StorySession::new(&backend);

        let err = session.start(&jane_intake()).await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.history().len(), 2);
        assert!(session.current_story().is_none());
    }

    #[tokio::test]
    async fn revise_grows_history_by_two_per_cycle() {
        let backend =
            ScriptedBackend::new(vec![Ok("draft one".into()), Ok("draft two".into())]);
        let session = StorySession::new(&backend);

        session.start(&jane_intake()).await.unwrap();
        assert_eq!(session.history().len(), 3);

        let revised = session.revise("make it shorter").await.unwrap();
        assert_eq!(revised, "draft two");

        let history = session.history();
        assert_eq!(history.len(), 5);
        assert_eq!(history[3].role, MessageRole::User);
        assert_eq!(history[3].content, "make it shorter");
        assert_eq!(history[4].role, MessageRole::Assistant);
        assert_eq!(history[4].content, "draft two");
        assert_eq!(session.current_story().as_deref(), Some("draft two"));
    }

    #[tokio::test]
    async fn returned_text_equals_last_history_message() {
        let backend = ScriptedBackend::new(vec![Ok("one".into()), Ok("two".into())]);
        let session = StorySession::new(&backend);

        let draft = session.start(&jane_intake()).await.unwrap();
        assert_eq!(session.history().last().unwrap().content, draft);

        let revised = session.revise("again").await.unwrap();
        assert_eq!(session.history().last().unwrap().content, revised);
    }

    #[tokio::test]
    async fn failed_revise_keeps_instruction_without_assistant() {
        let backend = ScriptedBackend::new(vec![
            Ok("draft one".into()),
            Err(GenerationError::new("request failed: timed out")),
            Ok("draft two".into()),
        ]);
        let session = StorySession::new(&backend);

        session.start(&jane_intake()).await.unwrap();
        let err = session.revise("tighten it").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
        assert_eq!(session.state(), SessionState::Failed);

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].role, MessageRole::User);
        assert_eq!(history[3].content, "tighten it");
        // still the first draft
        assert_eq!(session.current_story().as_deref(), Some("draft one"));

        // a subsequent revise with a new instruction does not duplicate the
        // failed one
        session.revise("add a title").await.unwrap();
        let history = session.history();
        assert_eq!(history.len(), 6);
        assert_eq!(
            history
                .iter()
                .filter(|m| m.content == "tighten it")
                .count(),
            1
        );
        assert_eq!(session.current_story().as_deref(), Some("draft two"));
    }

    #[tokio::test]
    async fn revise_before_start_is_rejected() {
        let backend = ScriptedBackend::new(vec![Ok("draft".into())]);
        let session = StorySession::new(&backend);

        let err = session.revise("shorter").await.unwrap_err();
        assert_eq!(err, SessionError::NotStarted);
        assert!(session.history().is_empty());

        // the busy slot was released; start still works
        session.start(&jane_intake()).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn empty_intake_fails_fast_without_generation() {
        let backend = ScriptedBackend::new(vec![]);
        let session = StorySession::new(&backend);

        let intake = Intake {
            name: "Jane".into(),
            email: String::new(),
            phone: String::new(),
            questions_and_answers: vec![],
        };
        let err = session.start(&intake).await.unwrap_err();
        assert!(matches!(err, SessionError::Intake(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn concurrent_call_rejected_while_generation_pending() {
        let gate = Arc::new(Notify::new());
        let backend = GatedBackend { gate: gate.clone() };
        let session = StorySession::new(&backend);
        let intake = jane_intake();

        let start_fut = session.start(&intake);
        futures::pin_mut!(start_fut);

        // Drive the first call into its in-flight await.
        assert!(futures::poll!(start_fut.as_mut()).is_pending());
        assert_eq!(session.state(), SessionState::Generating);

        // A second entry while pending is rejected, distinctly from a
        // generation failure.
        let err = session.revise("too soon").await.unwrap_err();
        assert_eq!(err, SessionError::Busy);
        let err = session.start(&intake).await.unwrap_err();
        assert_eq!(err, SessionError::Busy);

        // Release the gate; the original call completes exactly once.
        gate.notify_one();
        let draft = start_fut.await.unwrap();
        assert_eq!(draft, "slow draft");

        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, MessageRole::System);
        assert_eq!(history[1].role, MessageRole::User);
        assert_eq!(history[2].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn restart_reseeds_the_conversation() {
        let backend =
            ScriptedBackend::new(vec![Ok("first".into()), Ok("second".into())]);
        let session = StorySession::new(&backend);

        session.start(&jane_intake()).await.unwrap();
        session.start(&jane_intake()).await.unwrap();

        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(session.current_story().as_deref(), Some("second"));
        assert_eq!(
            history
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .count(),
            1
        );
    }
}
