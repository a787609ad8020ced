//! Generate and revise a personal story from questionnaire answers.
//!
//! Reads the API key from the `OPENAI_API_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Generate a story from an intake record
//! storyweave --intake answers.json
//!
//! # Generate, then apply revision instructions in order
//! storyweave --intake answers.json \
//!   --revise "Make it shorter" \
//!   --revise "Emphasize the transformation more"
//!
//! # Export the finished story and its conversation
//! storyweave --intake answers.json --export-dir ./stories
//! ```
//!
//! The intake file is the answer collector's record:
//!
//! ```json
//! {
//!   "name": "Jane Doe",
//!   "email": "jane@example.com",
//!   "phone": "555-0100",
//!   "questionsAndAnswers": [
//!     {"question": "What challenge did you face?", "answer": "..."}
//!   ]
//! }
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process;
use storyweave::error::{SessionError, retry_hint};
use storyweave::intake::Intake;
use storyweave::session::StorySession;
use storyweave::transcript::{Transcript, TranscriptStore, timestamp_slug};
use storyweave::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, OpenAiClient};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Generate and revise a personal story from questionnaire answers.
///
/// Reads the API key from the OPENAI_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "storyweave")]
struct Cli {
    /// Path to the intake JSON file produced by the answer collector
    #[arg(long)]
    intake: PathBuf,

    /// Model to use for story generation
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature (high favors varied prose)
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Revision instruction, applied in order after the initial draft (repeatable)
    #[arg(long = "revise")]
    revisions: Vec<String>,

    /// Directory to export the final story and conversation to
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

/// Print a session failure and, for generation errors, a hint about
/// whether retrying is worthwhile, then exit.
fn exit_with_session_error(e: &SessionError) -> ! {
    eprintln!("Error: {e}");
    if let SessionError::Generation(inner) = e
        && let Some(hint) = retry_hint(inner)
    {
        eprintln!("Hint: {hint}");
    }
    process::exit(1)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let intake_json = match std::fs::read_to_string(&cli.intake) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: failed to read {}: {e}", cli.intake.display());
            process::exit(1);
        }
    };
    let intake: Intake = match serde_json::from_str(&intake_json) {
        Ok(intake) => intake,
        Err(e) => {
            eprintln!("Error: failed to parse {}: {e}", cli.intake.display());
            process::exit(1);
        }
    };

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENAI_API_KEY environment variable is not set");
            process::exit(1);
        }
    };

    let client = match OpenAiClient::new(api_key) {
        Ok(c) => c
            .with_model(cli.model.clone())
            .with_temperature(cli.temperature),
        Err(e) => {
            eprintln!("Error: failed to create API client: {e}");
            process::exit(1);
        }
    };

    let session = StorySession::new(&client);

    let mut story = match session.start(&intake).await {
        Ok(draft) => draft,
        Err(e) => exit_with_session_error(&e),
    };
    info!("initial draft ready ({} chars)", story.len());

    for instruction in &cli.revisions {
        story = match session.revise(instruction).await {
            Ok(draft) => draft,
            Err(e) => exit_with_session_error(&e),
        };
        info!("applied revision: {instruction}");
    }

    println!("{story}");

    if let Some(dir) = cli.export_dir {
        let store = match TranscriptStore::new(&dir) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: failed to open export dir {}: {e}", dir.display());
                process::exit(1);
            }
        };
        let transcript = Transcript::new(&cli.model, &story, session.history());
        match store.save(&timestamp_slug(), &transcript) {
            Ok(path) => info!("exported transcript to {}", path.display()),
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
