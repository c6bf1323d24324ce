//! TOML configuration file loading
//!
//! Supports `~/.config/voice-tutor/config.toml` (platform config dir) as a
//! persistent config source. All fields are optional: the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Generation configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech provider configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Context retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalFileConfig,

    /// Orchestration tuning
    #[serde(default)]
    pub pipeline: PipelineFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Provider ("anthropic" or "openai")
    pub provider: Option<String>,

    /// Model identifier (e.g. "claude-sonnet-4-20250514")
    pub model: Option<String>,

    /// Response length cap in tokens
    pub max_tokens: Option<u32>,
}

/// Speech provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("elevenlabs" or "openai")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "eleven_multilingual_v2")
    pub tts_model: Option<String>,

    /// TTS speed multiplier (`OpenAI` only)
    pub tts_speed: Option<f32>,

    /// Voice for Hebrew answers
    pub voice_he: Option<String>,

    /// Voice for English answers
    pub voice_en: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrievalFileConfig {
    /// Retrieval service endpoint; the placeholder provider is used when unset
    pub url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    pub chunk_size: Option<usize>,
    pub synthesis_concurrency: Option<usize>,
    pub channel_capacity: Option<usize>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub anthropic: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns `Toml` if the content is not a valid config file
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file
///
/// An explicitly given path must exist and parse. The default path is
/// optional: if it is missing or broken, defaults are used.
///
/// # Errors
///
/// Returns `Config` if an explicit file cannot be read or parsed
pub fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = parse_config(&content).map_err(|e| {
            Error::Config(format!("invalid config file {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };

    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(ConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(ConfigFile::default())
        }
    }
}

/// Return the default config file path: `<config_dir>/voice-tutor/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-tutor").join("config.toml"))
}
