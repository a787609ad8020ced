//! Conversational story generation and revision engine.
//!
//! `storyweave` turns a user's free-text questionnaire answers into a
//! first-person narrative via a single chat-completion call, then lets the
//! user iteratively revise that narrative through follow-up natural-language
//! instructions. The core abstraction is the [`StorySession`](session::StorySession) —
//! it owns the ordered conversation history, seeds it from an [`Intake`](intake::Intake)
//! record via the pure [`build_initial_history`](prompt::build_initial_history)
//! function, and drives every generation and revision cycle through a
//! [`CompletionBackend`], enforcing that exactly one generation is in flight
//! at a time.
//!
//! # Getting started
//!
//! ```ignore
//! use storyweave::intake::Intake;
//! use storyweave::session::StorySession;
//! use storyweave::OpenAiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAiClient::new(api_key)?;
//!
//!     let intake: Intake = serde_json::from_str(intake_json)?;
//!     let session = StorySession::new(&client);
//!
//!     let draft = session.start(&intake).await?;
//!     println!("{draft}");
//!
//!     let revised = session.revise("Make it shorter").await?;
//!     println!("{revised}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Inbound answer record:** [`intake::Intake`] and [`intake::QuestionAnswer`] —
//!   the shape the answer collector hands us. Validation is fail-fast and
//!   minimal (a story needs at least one answered question).
//! - **Prompt construction:** [`prompt::build_initial_history`] plus the
//!   sectioned [`prompt::SystemPromptBuilder`] used to assemble the fixed
//!   storytelling instructions.
//! - **The generation/revision loop:** [`session::StorySession`] with its
//!   `start` / `revise` operations and the [`session::SessionState`] machine.
//! - **Pending-instruction capture:** [`review::ReviewController`], the thin
//!   layer a revision dialog sits on.
//! - **Local export:** [`transcript::TranscriptStore`] writes the finished
//!   story and its conversation to disk for the share/publish collaborators.

pub mod error;
pub mod intake;
pub mod prompt;
pub mod review;
pub mod session;
pub mod transcript;

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for story generation.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default sampling temperature. High, to favor varied prose.
pub const DEFAULT_TEMPERATURE: f32 = 0.9;

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
///
/// This is a closed set: any other role value in serialized input fails
/// deserialization rather than being carried along silently.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation. Never mutated after creation — the
/// session history is append-only.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. The outbound contract is deliberately
/// small: a model identifier, the full ordered history, and a fixed
/// sampling temperature. No streaming, no tool definitions.
#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Backend seam ───────────────────────────────────────────────────

/// Boxed future returned by [`CompletionBackend::generate`].
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

/// The outbound boundary to the LLM provider.
///
/// Takes an owned snapshot of the conversation history — the generation
/// request has no identity of its own beyond that snapshot — and resolves
/// to the generated text or a single normalized [`GenerationError`]. The
/// [`StorySession`](session::StorySession) is written against this trait so
/// tests can substitute a scripted backend for the real HTTP client.
pub trait CompletionBackend: Send + Sync {
    fn generate(&self, history: Vec<Message>) -> CompletionFuture<'_>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenAI chat completions API.
///
/// Holds the fixed model identifier and sampling temperature for the
/// session. No retries: a failed call is surfaced to the caller, which is
/// expected to present a retry affordance to the user.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    /// Create a new client with the given API key and default model settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .user_agent("storyweave/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GenerationError::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Send a chat completion request and return the first choice's text.
    ///
    /// Transport failures, non-success statuses, provider error payloads,
    /// and responses missing the expected content field all normalize into
    /// one [`GenerationError`] with a descriptive message.
    pub async fn chat(&self, body: &ChatRequest) -> Result<String, GenerationError> {
        debug!(
            "LLM request: model={}, messages={}, temp={}",
            body.model,
            body.messages.len(),
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENAI_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::new(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GenerationError::new(format!("failed to read response: {e}")))?;

        let elapsed = start.elapsed();
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            elapsed.as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(GenerationError::new(format!(
                "OpenAI API HTTP {status}: {text}"
            )));
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::new(format!("failed to parse response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(GenerationError::new(format!(
                "OpenAI API error: {}",
                err.message
            )));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content);

        match content {
            Some(text) => {
                debug!("LLM output: {} chars", text.len());
                Ok(text)
            }
            None => Err(GenerationError::new(
                "OpenAI API response had no message content",
            )),
        }
    }
}

impl CompletionBackend for OpenAiClient {
    fn generate(&self, history: Vec<Message>) -> CompletionFuture<'_> {
        Box::pin(async move {
            let body = ChatRequest {
                model: self.model.clone(),
                messages: history,
                temperature: self.temperature,
            };
            self.chat(&body).await
        })
    }
}
