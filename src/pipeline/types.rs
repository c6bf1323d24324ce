//! Data types flowing between pipeline stages

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::{Error, Result};

/// Spoken language of the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Hebrew
    #[default]
    He,
    /// English
    En,
    /// Let the provider detect the language
    Auto,
}

impl Language {
    /// ISO 639-1 code, or `auto`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::He => "he",
            Self::En => "en",
            Self::Auto => "auto",
        }
    }

    /// Hint forwarded to the transcription provider (`None` for auto-detect)
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "he" => Ok(Self::He),
            "en" => Ok(Self::En),
            "auto" => Ok(Self::Auto),
            other => Err(Error::Config(format!(
                "unsupported language '{other}' (expected he, en or auto)"
            ))),
        }
    }
}

/// Orchestration strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Wait for the full response, then synthesize once
    #[default]
    Simple,
    /// Synthesize chunks while generation is still running
    Streaming,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Streaming => "streaming",
        })
    }
}

/// Recorded question audio, read once from disk
#[derive(Debug, Clone)]
pub struct AudioInput {
    bytes: Vec<u8>,
    language: Language,
    file_name: String,
}

impl AudioInput {
    /// Wrap in-memory audio bytes
    #[must_use]
    pub fn new(bytes: Vec<u8>, language: Language, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            language,
            file_name: file_name.into(),
        }
    }

    /// Read audio from a file
    ///
    /// # Errors
    ///
    /// Returns `InputNotFound` if the file is missing or unreadable
    pub async fn from_path(path: &Path, language: Language) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "failed to read input audio");
            Error::InputNotFound(path.to_path_buf())
        })?;

        let file_name = path
            .file_name()
            .map_or_else(|| "audio.wav".to_string(), |n| n.to_string_lossy().into_owned());

        Ok(Self::new(bytes, language, file_name))
    }

    /// Raw audio bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Language hint supplied by the caller
    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// File name used for multipart uploads
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// MIME type guessed from the file extension
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());

        match ext.as_deref() {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a" | "mp4") => "audio/mp4",
            Some("ogg" | "oga") => "audio/ogg",
            Some("webm") => "audio/webm",
            Some("flac") => "audio/flac",
            _ => "application/octet-stream",
        }
    }
}

/// Output of the transcription stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    /// Recognized text
    pub text: String,
    /// Language reported by the provider (falls back to the hint)
    pub language: String,
    /// Audio duration in seconds (0 if unknown)
    pub duration: f64,
}

/// A finalized slice of the response, ready for synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisChunk {
    pub text: String,
    pub sequence: u64,
}

/// Synthesized audio for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
    pub sequence: u64,
}

/// One voice question to answer
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Correlation id for logs and the metrics document
    pub id: uuid::Uuid,
    /// Question audio
    pub audio: AudioInput,
    /// Optional content scope for retrieval (e.g. a video id)
    pub scope_id: Option<String>,
    /// Voice used for synthesis
    pub voice_id: String,
}

impl PipelineRequest {
    #[must_use]
    pub fn new(audio: AudioInput, voice_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            audio,
            scope_id: None,
            voice_id: voice_id.into(),
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope_id: Option<String>) -> Self {
        self.scope_id = scope_id;
        self
    }
}
