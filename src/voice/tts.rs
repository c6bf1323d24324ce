//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Converts one chunk of response text into audio bytes
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with `voice_id`
    ///
    /// Returns empty bytes when the provider credential is absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` if the provider call fails
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

impl TtsProvider {
    /// Environment variable holding this provider's key
    #[must_use]
    pub const fn key_name(self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::ElevenLabs => "ELEVENLABS_API_KEY",
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI => "tts-1",
            Self::ElevenLabs => "eleven_multilingual_v2",
        }
    }

    /// Voice used when none is configured
    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::OpenAI => "alloy",
            // Rachel; multilingual model covers Hebrew and English
            Self::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        }
    }
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider '{other}'"))),
        }
    }
}

/// ElevenLabs voice settings tuned for conversational answers
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// Synthesizes speech from text through a hosted provider
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    speed: f32,
    model: String,
    settings: VoiceSettings,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// A missing key yields a silent synthesizer rather than an error.
    #[must_use]
    pub fn new_openai(api_key: Option<SecretString>, model: String, speed: f32) -> Self {
        Self::new(api_key, model, TtsProvider::OpenAI).with_speed(speed)
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// A missing key yields a silent synthesizer rather than an error.
    #[must_use]
    pub fn new_elevenlabs(api_key: Option<SecretString>, model: String) -> Self {
        Self::new(api_key, model, TtsProvider::ElevenLabs)
    }

    fn new(api_key: Option<SecretString>, model: String, provider: TtsProvider) -> Self {
        let api_key = api_key.filter(|k| !k.expose_secret().trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                key = provider.key_name(),
                "TTS credential not set, synthesized audio will be empty"
            );
        }

        Self {
            client: reqwest::Client::new(),
            api_key,
            // ElevenLabs doesn't use speed in the same way
            speed: 1.0,
            model,
            settings: VoiceSettings::default(),
            provider,
        }
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Whether synthesis will produce audio at all
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(&self, api_key: &str, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(
        &self,
        api_key: &str,
        text: &str,
        voice: &str,
    ) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{voice}");

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            voice_settings: self.settings,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "ElevenLabs TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        let Some(api_key) = &self.api_key else {
            tracing::warn!(
                key = self.provider.key_name(),
                "TTS credential not set, returning empty audio"
            );
            return Ok(Vec::new());
        };

        let preview: String = text.chars().take(50).collect();
        tracing::debug!(text = %preview, voice = voice_id, "synthesizing speech");

        let audio = match self.provider {
            TtsProvider::OpenAI => {
                self.synthesize_openai(api_key.expose_secret(), text, voice_id)
                    .await?
            }
            TtsProvider::ElevenLabs => {
                self.synthesize_elevenlabs(api_key.expose_secret(), text, voice_id)
                    .await?
            }
        };

        tracing::debug!(audio_bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }
}
