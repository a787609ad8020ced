//! Prompt construction: the fixed storytelling instructions and the pure
//! transformation from an intake record into the seed conversation.
//!
//! [`build_initial_history`] is deterministic and side-effect free — same
//! intake, same two messages. The system prompt is assembled with
//! [`SystemPromptBuilder`] rather than ad-hoc string concatenation, so each
//! instruction block stays a named, readable section.

use crate::intake::Intake;
use crate::Message;

// ── SystemPromptBuilder ────────────────────────────────────────────

/// Builder for multi-section system prompts.
///
/// Sections are joined with double newlines. Empty sections are silently
/// skipped.
///
/// # Example
///
/// ```
/// use storyweave::prompt::SystemPromptBuilder;
///
/// let prompt = SystemPromptBuilder::new("You are a storyteller.")
///     .section("Context", "The user overcame a challenge.")
///     .build();
///
/// assert!(prompt.contains("## Context"));
/// ```
pub struct SystemPromptBuilder {
    sections: Vec<String>,
}

impl SystemPromptBuilder {
    /// Create a new builder with an initial preamble section.
    ///
    /// The preamble is included as-is; subsequent sections added via
    /// `section()` get `## ` prefixed headings.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a named section with a heading. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n\n{content}"));
        }
        self
    }

    /// Assemble the final prompt string.
    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

// ── Story instructions ─────────────────────────────────────────────

/// The fixed task/style instructions for the story model. Static content:
/// the same prompt is produced on every call.
pub fn story_system_prompt() -> String {
    SystemPromptBuilder::new(
        "Write an inspirational and relatable story based on the user's responses \
         about a challenge they faced in life and have since overcome. Your tone \
         should be honest and open yet not too raw — the user should be happy to \
         share the story with others in their life, to give them the same hope the \
         user found during their own transformation.",
    )
    .section(
        "Context",
        "All users are graduates of the Mindscape program, an affordable set of \
         workshops and seminars. They are excited to tell others about this \
         opportunity. While staying subtle and never pushy, draw on anything the \
         questionnaire says about the program and how it changed their life.",
    )
    .section(
        "Call to Action",
        "Always close with a postscript paragraph telling the reader they can \
         overcome the challenges in their own life too, and to visit \
         https://Mindscape.edu/free-seminar to book a free introductory workshop. \
         Adapt the wording so it speaks to people facing the same kind of \
         challenge as the storyteller. Set that final paragraph in emphasis so \
         it reads clearly as an addition by the storytelling tool, not the user.",
    )
    .section(
        "Narrative Structure",
        "The story must NOT read like an interview transcript. Tell it as a \
         flowing first-person narrative of triumph over adversity. The questions \
         only exist to surface the key points of the story; they must not \
         structure the result.",
    )
    .section(
        "Formatting",
        "Plain structured text only: a title line, and at most a few short \
         section headers if they keep things organized. No HTML and no raw \
         markup of any other kind. Always leave a blank line between paragraphs \
         and keep the formatting minimal and clean.",
    )
    .section(
        "Edits",
        "The user may follow up with revision requests. Follow those \
         instructions precisely — the user's choices take priority over the rest \
         of this prompt, EXCEPT for formatting: never produce messy formatting \
         or raw markup, whatever the user asks.",
    )
    .build()
}

// ── Initial history ────────────────────────────────────────────────

/// Build the seed conversation for a story: exactly two messages, the fixed
/// system instructions followed by a user message carrying the display name
/// and every question/answer pair in original order.
///
/// Pure function — no I/O, no hidden state. Empty or whitespace-only
/// answers pass through verbatim.
pub fn build_initial_history(intake: &Intake) -> Vec<Message> {
    let mut details = String::from(
        "Based on the following answers, craft a compelling story in the first \
         person following the guidelines of your task.\n\n\
         Please only include first name, last initial in your response unless \
         the user has instructed you otherwise.\n\n",
    );
    details.push_str(&format!("Name: {}\n", intake.name));

    for qa in &intake.questions_and_answers {
        details.push_str(&format!("\nQ: {}\nA: {}\n", qa.question, qa.answer));
    }

    vec![Message::system(story_system_prompt()), Message::user(details)]
}
