//! Thin orchestration above the session for the revision dialog.
//!
//! The [`ReviewController`] captures the single pending instruction a user
//! is typing. Submitting hands it to [`StorySession::revise`] and clears the
//! pending text whatever the outcome, so after a failure the user can issue
//! another attempt immediately without the stale text lingering.

use crate::error::SessionError;
use crate::session::StorySession;

/// Pending-instruction capture for one revision dialog.
pub struct ReviewController<'a> {
    session: &'a StorySession<'a>,
    pending: String,
}

impl<'a> ReviewController<'a> {
    pub fn new(session: &'a StorySession<'a>) -> Self {
        Self {
            session,
            pending: String::new(),
        }
    }

    /// Replace the pending instruction (typing in the dialog).
    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.pending = instruction.into();
    }

    /// The instruction currently staged for submission.
    pub fn pending_instruction(&self) -> &str {
        &self.pending
    }

    /// Submit the pending instruction as a revision cycle.
    ///
    /// The pending text is cleared before the call resolves, regardless of
    /// success or failure. The instruction itself survives in the session
    /// history on failure, so retrying does not need the dialog text back.
    pub async fn submit(&mut self) -> Result<String, SessionError> {
        let instruction = std::mem::take(&mut self.pending);
        self.session.revise(&instruction).await
    }

    /// The current story draft, if one exists.
    pub fn current_story(&self) -> Option<String> {
        self.session.current_story()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::intake::{Intake, QuestionAnswer};
    use crate::{CompletionBackend, CompletionFuture, Message};
    use std::collections::VecDeque;
    use std::sync::Mutex;

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

    fn intake() -> Intake {
        Intake {
            name: "Jane".into(),
            email: String::new(),
            phone: String::new(),
            questions_and_answers: vec![QuestionAnswer {
                question: "What challenge?".into(),
                answer: "Public speaking fear".into(),
            }],
        }
    }

    #[tokio::test]
    async fn submit_clears_pending_on_success() {
        let backend = ScriptedBackend::new(vec![Ok("draft".into()), Ok("revised".into())]);
        let session = StorySession::new(&backend);
        session.start(&intake()).await.unwrap();

        let mut controller = ReviewController::new(&session);
        controller.set_instruction("make it shorter");
        assert_eq!(controller.pending_instruction(), "make it shorter");

        let result = controller.submit().await.unwrap();
        assert_eq!(result, "revised");
        assert!(controller.pending_instruction().is_empty());
        assert_eq!(controller.current_story().as_deref(), Some("revised"));
    }

    #[tokio::test]
    async fn submit_clears_pending_on_failure() {
        let backend = ScriptedBackend::new(vec![
            Ok("draft".into()),
            Err(GenerationError::new("OpenAI API HTTP 503: unavailable")),
        ]);
        let session = StorySession::new(&backend);
        session.start(&intake()).await.unwrap();

        let mut controller = ReviewController::new(&session);
        controller.set_instruction("make it shorter");
        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));

        // cleared despite the failure; the instruction lives on in history
        assert!(controller.pending_instruction().is_empty());
        assert_eq!(
            session.history().last().map(|m| m.content.clone()),
            Some("make it shorter".into())
        );
    }
}
