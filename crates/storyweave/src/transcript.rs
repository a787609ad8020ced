//! Local export of finished stories.
//!
//! The engine exposes the current story as an opaque string; share and
//! publish collaborators operate on that. [`TranscriptStore`] gives the
//! hosting application a place to drop the finished story together with the
//! conversation that produced it, one JSON file per export.

use crate::Message;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A finished story plus the conversation that produced it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Transcript {
    /// RFC 3339 timestamp of the export.
    pub saved_at: String,
    /// Model that generated the story.
    pub model: String,
    /// The final user-visible draft.
    pub story: String,
    /// The full conversation history, every prior draft included.
    pub messages: Vec<Message>,
}

impl Transcript {
    pub fn new(model: impl Into<String>, story: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            saved_at: chrono::Utc::now().to_rfc3339(),
            model: model.into(),
            story: story.into(),
            messages,
        }
    }
}

/// Store for transcript files under a single directory.
///
/// Layout:
/// ```text
/// export_dir/
///   story-20260830T101500482.json
///   story-20260830T113002077.json
/// ```
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    /// Create a new store, ensuring the export directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The export directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("story-{slug}.json"))
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    /// Refuses a slug that already exists rather than replacing the
    /// earlier export.
    pub fn save(&self, slug: &str, transcript: &Transcript) -> Result<PathBuf, String> {
        let final_path = self.path_for(slug);
        if final_path.exists() {
            return Err(format!(
                "Transcript already exists: {}",
                final_path.display()
            ));
        }
        let tmp_path = self.dir.join(format!(".story-{slug}.json.tmp"));

        let json = serde_json::to_string_pretty(transcript)
            .map_err(|e| format!("Failed to serialize transcript: {e}"))?;
        std::fs::write(&tmp_path, json)
            .map_err(|e| format!("Failed to write temp transcript: {e}"))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| format!("Failed to rename transcript: {e}"))?;

        Ok(final_path)
    }

    /// Load one transcript. Returns `None` if the slug doesn't exist.
    pub fn load(&self, slug: &str) -> Result<Option<Transcript>, String> {
        let path = self.path_for(slug);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read transcript: {e}"))?;
        let transcript: Transcript =
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse transcript: {e}"))?;
        Ok(Some(transcript))
    }

    /// List all transcripts in the store, sorted by filename (and therefore
    /// by timestamp slug). Malformed files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<(String, Transcript)>, String> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| format!("Failed to read export dir: {e}"))?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {e}"))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(slug) = name
                .strip_prefix("story-")
                .and_then(|s| s.strip_suffix(".json"))
            else {
                continue;
            };
            match std::fs::read_to_string(entry.path()) {
                Ok(json) => match serde_json::from_str::<Transcript>(&json) {
                    Ok(t) => found.push((slug.to_string(), t)),
                    Err(e) => {
                        warn!("Skipping malformed transcript at {}: {e}", entry.path().display());
                    }
                },
                Err(e) => {
                    warn!("Skipping unreadable transcript at {}: {e}", entry.path().display());
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }
}

/// Filename-safe slug for the current instant, millisecond precision so
/// back-to-back exports get distinct names.
pub fn timestamp_slug() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S%3f").to_string()
}
