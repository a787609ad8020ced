//! Inbound data boundary: the structured answer record.
//!
//! The answer collector (form UI, draft persistence, input validation) is
//! an external collaborator — this module only defines the shape of what it
//! hands us. Field names follow the collector's camelCase wire format.
//! Validation here is fail-fast and minimal: a story needs at least one
//! question/answer pair. Empty or whitespace-only answer *text* passes
//! through verbatim; rejecting those is the collector's job.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// One answered question from the fixed questionnaire. Immutable once
/// collected; order matters and is preserved as given.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// The full intake record: identity fields plus the answered questionnaire.
///
/// Only `name` participates in narrative framing; `email` and `phone` are
/// carried for the hosting application but unused by the engine.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Intake {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub questions_and_answers: Vec<QuestionAnswer>,
}

impl Intake {
    /// Check that this record can seed a story. Called by
    /// [`StorySession::start`](crate::session::StorySession::start) before
    /// any generation is attempted.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.questions_and_answers.is_empty() {
            return Err(SessionError::Intake(
                "no questions and answers in intake record".into(),
            ));
        }
        Ok(())
    }
}
