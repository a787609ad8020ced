//! Error types for the generation and revision cycle.
//!
//! The completion client normalizes every provider-facing failure —
//! transport errors, non-success statuses, error payloads, malformed
//! responses — into a single [`GenerationError`] carrying a descriptive
//! message. The session layer adds its own conditions on top
//! ([`SessionError`]): a busy conflict, a revise-before-start, and an
//! intake record that cannot seed a story. The busy conflict is signaled
//! distinctly so callers never mistake it for a generation failure.

use std::fmt;

// ── GenerationError ────────────────────────────────────────────────

/// A failed chat-completion call, with a human-readable message.
///
/// The client does not distinguish failure subtypes to its caller; use
/// [`retry_hint`] if a caller wants to word its retry affordance based on
/// whether re-asking the user to retry is likely to help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError {
    message: String,
}

impl GenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GenerationError {}

// ── SessionError ───────────────────────────────────────────────────

/// Failure conditions surfaced by a [`StorySession`](crate::session::StorySession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A generation is already in flight for this session. Resolved
    /// locally by the caller waiting and retrying; never a user-visible
    /// generation failure.
    Busy,
    /// `revise` was called before a successful `start`.
    NotStarted,
    /// The intake record cannot seed a story (e.g. no answered questions).
    Intake(String),
    /// The completion call failed.
    Generation(GenerationError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Busy => write!(f, "a generation is already in progress"),
            SessionError::NotStarted => {
                write!(f, "no story has been generated yet; call start first")
            }
            SessionError::Intake(msg) => write!(f, "invalid intake: {msg}"),
            SessionError::Generation(e) => write!(f, "generation failed: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Generation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GenerationError> for SessionError {
    fn from(e: GenerationError) -> Self {
        SessionError::Generation(e)
    }
}

// ── Retry affordance ───────────────────────────────────────────────

/// A hint the caller can show next to a failed generation when wording its
/// retry affordance. `None` when the message gives no signal either way.
pub fn retry_hint(error: &GenerationError) -> Option<&'static str> {
    let message = error.message();
    if is_transient_error(message) {
        Some("this looks temporary; trying again is likely to succeed")
    } else if is_permanent_error(message) {
        Some("check the request and API credential before trying again")
    } else {
        None
    }
}

/// Whether a generation failure message points at a transient condition
/// (rate limiting, provider 5xx, connectivity) where a user-initiated
/// retry is likely to succeed. Matches against the normalized messages
/// [`OpenAiClient`](crate::OpenAiClient) produces.
pub fn is_transient_error(message: &str) -> bool {
    for status in ["429", "500", "502", "503", "504"] {
        if message.contains(&format!("HTTP {status}")) {
            return true;
        }
    }

    let lower = message.to_lowercase();
    [
        "request failed:",
        "failed to read response",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "network",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// Whether a generation failure message points at a permanent condition
/// (bad request, bad credential) that retrying will not fix.
pub fn is_permanent_error(message: &str) -> bool {
    for status in ["400", "401", "403", "404", "422"] {
        if message.contains(&format!("HTTP {status}")) {
            return true;
        }
    }

    let lower = message.to_lowercase();
    ["invalid", "bad request", "unauthorized", "incorrect api key"]
        .iter()
        .any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_distinct_from_generation_failure() {
        let busy = SessionError::Busy;
        let failed = SessionError::Generation(GenerationError::new("boom"));
        assert_ne!(busy, failed);
        assert!(!matches!(busy, SessionError::Generation(_)));
    }

    #[test]
    fn generation_error_display_carries_message() {
        let e = GenerationError::new("OpenAI API HTTP 500: oops");
        assert_eq!(e.to_string(), "OpenAI API HTTP 500: oops");
        let s: SessionError = e.into();
        assert!(s.to_string().contains("HTTP 500"));
    }

    #[test]
    fn retry_hint_suggests_retry_for_transient_failures() {
        for message in [
            "OpenAI API HTTP 429: rate limited",
            "OpenAI API HTTP 503: service unavailable",
            "request failed: connection reset by peer",
            "failed to read response: timed out",
        ] {
            let hint = retry_hint(&GenerationError::new(message));
            assert_eq!(
                hint,
                Some("this looks temporary; trying again is likely to succeed"),
                "expected transient hint for {message:?}"
            );
        }
    }

    #[test]
    fn retry_hint_flags_permanent_failures() {
        for message in [
            "OpenAI API HTTP 401: incorrect API key provided",
            "OpenAI API HTTP 400: bad request",
        ] {
            let hint = retry_hint(&GenerationError::new(message));
            assert_eq!(
                hint,
                Some("check the request and API credential before trying again"),
                "expected credential hint for {message:?}"
            );
        }
    }

    #[test]
    fn retry_hint_silent_when_unclassified() {
        assert!(retry_hint(&GenerationError::new("script exhausted")).is_none());
        assert!(!is_transient_error("OpenAI API HTTP 400: bad request"));
    }
}
