//! Error types for the voice tutor pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for voice tutor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice tutor pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Input audio missing or unreadable (pre-flight)
    #[error("input audio not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Provider credential absent
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Speech-to-text error
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Context retrieval error
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// LLM generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Text-to-speech error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Overall request deadline elapsed
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error ends the pipeline rather than degrading it
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Retrieval(_) | Self::Synthesis(_))
    }
}
