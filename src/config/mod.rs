//! Configuration management for the voice tutor
//!
//! Every value resolves as env > TOML file > default. Credentials are read
//! once here and passed into provider constructors; nothing else reads the
//! environment.

pub mod file;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::context::{ContextProvider, HttpContextProvider, PlaceholderContextProvider};
use crate::llm::{AnthropicGenerator, Generator, LlmProvider, OpenAiGenerator};
use crate::pipeline::{Language, PipelineOptions, Providers};
use crate::voice::{
    SpeechToText, SttProvider, Synthesizer, TextToSpeech, Transcriber, TtsProvider,
};
use crate::{Error, Result};

/// Default generation length cap
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Default retrieval request timeout
pub const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Voice tutor configuration
#[derive(Debug)]
pub struct Config {
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub retrieval: RetrievalConfig,
    pub pipeline: PipelineOptions,
    pub api_keys: ApiKeys,
}

/// Generation configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub max_tokens: u32,
}

/// Speech provider configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub stt_provider: SttProvider,
    pub stt_model: String,
    pub tts_provider: TtsProvider,
    pub tts_model: String,
    /// TTS speed multiplier (`OpenAI` only)
    pub tts_speed: f32,
    pub voice_he: String,
    pub voice_en: String,
}

impl VoiceConfig {
    /// Voice to answer in for a question spoken in `language`
    ///
    /// Auto-detected questions are answered with the English voice.
    #[must_use]
    pub fn voice_for(&self, language: Language) -> &str {
        match language {
            Language::He => &self.voice_he,
            Language::En | Language::Auto => &self.voice_en,
        }
    }
}

/// Context retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Retrieval endpoint; `None` selects the placeholder provider
    pub url: Option<String>,
    pub timeout: Duration,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, TTS and generation)
    pub openai: Option<SecretString>,

    /// Deepgram API key (optional STT)
    pub deepgram: Option<SecretString>,

    /// `Anthropic` API key (generation)
    pub anthropic: Option<SecretString>,

    /// `ElevenLabs` API key (TTS)
    pub elevenlabs: Option<SecretString>,
}

impl Config {
    /// Load configuration from the process environment and config file
    ///
    /// # Errors
    ///
    /// Returns `Config` if an explicit config file is unusable or a value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path)?;
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns `Config` if a provider name or numeric value is invalid
    pub fn from_sources<F>(fc: file::ConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank env values count as unset
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            deepgram: env("DEEPGRAM_API_KEY")
                .or(fc.api_keys.deepgram)
                .map(SecretString::from),
            anthropic: env("ANTHROPIC_API_KEY")
                .or(fc.api_keys.anthropic)
                .map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
        };

        // LLM config (env > toml > default)
        let llm_provider: LlmProvider = parse_or(
            env("VOICE_TUTOR_LLM_PROVIDER").or(fc.llm.provider),
            LlmProvider::Anthropic,
        )?;
        let llm = LlmConfig {
            provider: llm_provider,
            model: env("VOICE_TUTOR_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| llm_provider.default_model().to_string()),
            max_tokens: parse_or(
                env("VOICE_TUTOR_MAX_TOKENS"),
                fc.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            )?,
        };

        // Voice config (env > toml > provider default)
        let stt_provider: SttProvider = parse_or(
            env("VOICE_TUTOR_STT_PROVIDER").or(fc.voice.stt_provider),
            SttProvider::Whisper,
        )?;
        let tts_provider: TtsProvider = parse_or(
            env("VOICE_TUTOR_TTS_PROVIDER").or(fc.voice.tts_provider),
            TtsProvider::ElevenLabs,
        )?;
        let voice = VoiceConfig {
            stt_provider,
            stt_model: env("VOICE_TUTOR_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            tts_provider,
            tts_model: env("VOICE_TUTOR_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            tts_speed: parse_or(
                env("VOICE_TUTOR_TTS_SPEED"),
                fc.voice.tts_speed.unwrap_or(1.0),
            )?,
            voice_he: env("VOICE_TUTOR_VOICE_HE")
                .or(fc.voice.voice_he)
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
            voice_en: env("VOICE_TUTOR_VOICE_EN")
                .or(fc.voice.voice_en)
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
        };

        // Retrieval config (env > toml > placeholder)
        let retrieval = RetrievalConfig {
            url: env("VOICE_TUTOR_RETRIEVAL_URL").or(fc.retrieval.url),
            timeout: parse_or(
                env("VOICE_TUTOR_RETRIEVAL_TIMEOUT_SECS"),
                fc.retrieval
                    .timeout_secs
                    .unwrap_or(DEFAULT_RETRIEVAL_TIMEOUT.as_secs()),
            )
            .map(Duration::from_secs)?,
        };

        // Pipeline tuning (env > toml > default)
        let defaults = PipelineOptions::default();
        let pipeline = PipelineOptions {
            chunk_size: parse_or(
                env("VOICE_TUTOR_CHUNK_SIZE"),
                fc.pipeline.chunk_size.unwrap_or(defaults.chunk_size),
            )?,
            synthesis_concurrency: parse_or(
                env("VOICE_TUTOR_SYNTHESIS_CONCURRENCY"),
                fc.pipeline
                    .synthesis_concurrency
                    .unwrap_or(defaults.synthesis_concurrency),
            )?,
            channel_capacity: parse_or(
                env("VOICE_TUTOR_CHANNEL_CAPACITY"),
                fc.pipeline
                    .channel_capacity
                    .unwrap_or(defaults.channel_capacity),
            )?,
        };

        Ok(Self {
            llm,
            voice,
            retrieval,
            pipeline,
            api_keys,
        })
    }

    /// Construct the provider set this configuration describes
    ///
    /// A missing TTS credential is not an error: synthesis degrades to
    /// empty audio with a warning.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if the STT or LLM key is absent
    pub fn providers(&self) -> Result<Providers> {
        let keys = &self.api_keys;

        let transcriber: Arc<dyn Transcriber> = Arc::new(match self.voice.stt_provider {
            SttProvider::Whisper => SpeechToText::new_whisper(
                reveal(keys.openai.as_ref()),
                self.voice.stt_model.clone(),
            )?,
            SttProvider::Deepgram => SpeechToText::new_deepgram(
                reveal(keys.deepgram.as_ref()),
                self.voice.stt_model.clone(),
            )?,
        });

        let generator: Arc<dyn Generator> = match self.llm.provider {
            LlmProvider::Anthropic => Arc::new(AnthropicGenerator::new(
                reveal(keys.anthropic.as_ref()),
                self.llm.model.clone(),
                self.llm.max_tokens,
            )?),
            LlmProvider::OpenAI => Arc::new(OpenAiGenerator::new(
                reveal(keys.openai.as_ref()),
                self.llm.model.clone(),
                self.llm.max_tokens,
            )?),
        };

        let synthesizer: Arc<dyn Synthesizer> = Arc::new(match self.voice.tts_provider {
            TtsProvider::OpenAI => TextToSpeech::new_openai(
                reveal(keys.openai.as_ref()),
                self.voice.tts_model.clone(),
                self.voice.tts_speed,
            ),
            TtsProvider::ElevenLabs => TextToSpeech::new_elevenlabs(
                reveal(keys.elevenlabs.as_ref()),
                self.voice.tts_model.clone(),
            ),
        });

        let context: Arc<dyn ContextProvider> = match &self.retrieval.url {
            Some(url) => {
                tracing::info!(url = %url, "using HTTP context retrieval");
                Arc::new(HttpContextProvider::new(url.clone(), self.retrieval.timeout)?)
            }
            None => {
                tracing::info!("no retrieval URL configured, using placeholder context");
                Arc::new(PlaceholderContextProvider)
            }
        };

        tracing::debug!(
            stt = ?self.voice.stt_provider,
            llm = ?self.llm.provider,
            model = %self.llm.model,
            tts = ?self.voice.tts_provider,
            "providers configured"
        );

        Ok(Providers {
            transcriber,
            context,
            generator,
            synthesizer,
        })
    }
}

/// Copy a key for a provider constructor
fn reveal(key: Option<&SecretString>) -> Option<SecretString> {
    key.map(|k| SecretString::from(k.expose_secret().to_owned()))
}

/// Parse an env override, falling back to `default` when unset
fn parse_or<T>(value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid value '{raw}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(file::ConfigFile::default(), env_of(&[])).unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(config.llm.model, "claude-sonnet-4-20250514");
        assert_eq!(config.llm.max_tokens, 500);
        assert_eq!(config.voice.stt_provider, SttProvider::Whisper);
        assert_eq!(config.voice.stt_model, "whisper-1");
        assert_eq!(config.voice.tts_model, "eleven_multilingual_v2");
        assert_eq!(config.voice.voice_for(Language::He), "21m00Tcm4TlvDq8ikWAM");
        assert!(config.retrieval.url.is_none());
        assert_eq!(config.pipeline, PipelineOptions::default());
        assert!(config.api_keys.anthropic.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = file::parse_config(
            r#"
            [llm]
            provider = "anthropic"
            model = "from-file"

            [pipeline]
            chunk_size = 80
            synthesis_concurrency = 2

            [api_keys]
            openai = "sk-file"
            "#,
        )
        .unwrap();
        let env = env_of(&[
            ("VOICE_TUTOR_LLM_MODEL", "from-env"),
            ("VOICE_TUTOR_CHUNK_SIZE", "150"),
            ("OPENAI_API_KEY", "sk-env"),
        ]);

        let config = Config::from_sources(fc, env).unwrap();
        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.pipeline.chunk_size, 150);
        assert_eq!(config.pipeline.synthesis_concurrency, 2);
        assert_eq!(
            config.api_keys.openai.as_ref().unwrap().expose_secret(),
            "sk-env"
        );
    }

    #[test]
    fn test_openai_tts_voice_defaults() {
        let env = env_of(&[("VOICE_TUTOR_TTS_PROVIDER", "openai")]);
        let config = Config::from_sources(file::ConfigFile::default(), env).unwrap();

        assert_eq!(config.voice.tts_model, "tts-1");
        assert_eq!(config.voice.voice_for(Language::Auto), "alloy");
    }

    #[test]
    fn test_auto_uses_english_voice() {
        let env = env_of(&[
            ("VOICE_TUTOR_VOICE_HE", "he-voice"),
            ("VOICE_TUTOR_VOICE_EN", "en-voice"),
        ]);
        let config = Config::from_sources(file::ConfigFile::default(), env).unwrap();

        assert_eq!(config.voice.voice_for(Language::He), "he-voice");
        assert_eq!(config.voice.voice_for(Language::En), "en-voice");
        assert_eq!(config.voice.voice_for(Language::Auto), "en-voice");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let env = env_of(&[("VOICE_TUTOR_CHUNK_SIZE", "lots")]);
        let err = Config::from_sources(file::ConfigFile::default(), env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let env = env_of(&[("VOICE_TUTOR_LLM_PROVIDER", "gemini")]);
        assert!(Config::from_sources(file::ConfigFile::default(), env).is_err());
    }

    #[test]
    fn test_missing_llm_key_is_fatal() {
        let env = env_of(&[("OPENAI_API_KEY", "sk-test")]);
        let config = Config::from_sources(file::ConfigFile::default(), env).unwrap();

        let err = config.providers().err().unwrap();
        assert!(matches!(err, Error::MissingCredential("ANTHROPIC_API_KEY")));
    }

    #[test]
    fn test_missing_stt_key_is_fatal() {
        let env = env_of(&[("ANTHROPIC_API_KEY", "sk-ant")]);
        let config = Config::from_sources(file::ConfigFile::default(), env).unwrap();

        let err = config.providers().err().unwrap();
        assert!(matches!(err, Error::MissingCredential("OPENAI_API_KEY")));
    }

    #[test]
    fn test_missing_tts_key_degrades() {
        let env = env_of(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ]);
        let config = Config::from_sources(file::ConfigFile::default(), env).unwrap();

        assert!(config.api_keys.elevenlabs.is_none());
        assert!(config.providers().is_ok());
    }

    #[test]
    fn test_blank_env_key_is_unset() {
        let env = env_of(&[("ANTHROPIC_API_KEY", "  ")]);
        let config = Config::from_sources(file::ConfigFile::default(), env).unwrap();
        assert!(config.api_keys.anthropic.is_none());
    }
}
