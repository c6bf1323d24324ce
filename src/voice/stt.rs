//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::pipeline::{AudioInput, Transcript};
use crate::{Error, Result};

/// Converts question audio to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio`, forwarding its language hint to the provider
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcription` if the audio is empty or the provider fails
    async fn transcribe(&self, audio: &AudioInput) -> Result<Transcript>;
}

/// Response from `OpenAI` Whisper with `response_format=verbose_json`
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    #[serde(default)]
    metadata: Option<DeepgramMetadata>,
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramMetadata {
    #[serde(default)]
    duration: f64,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
    #[serde(default)]
    detected_language: Option<String>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

impl SttProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

impl std::str::FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider '{other}'"))),
        }
    }
}

/// Transcribes speech through a hosted provider
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if the API key is absent
    pub fn new_whisper(api_key: Option<SecretString>, model: String) -> Result<Self> {
        let api_key = require_key(api_key, "OPENAI_API_KEY")?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if the API key is absent
    pub fn new_deepgram(api_key: Option<SecretString>, model: String) -> Result<Self> {
        let api_key = require_key(api_key, "DEEPGRAM_API_KEY")?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Deepgram,
        })
    }

    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe using `OpenAI` Whisper
    async fn transcribe_whisper(&self, audio: &AudioInput) -> Result<Transcript> {
        tracing::debug!(audio_bytes = audio.bytes().len(), "starting Whisper transcription");

        let part = reqwest::multipart::Part::bytes(audio.bytes().to_vec())
            .file_name(audio.file_name().to_string())
            .mime_str(audio.mime_type())
            .map_err(|e| Error::Transcription(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        if let Some(hint) = audio.language().hint() {
            form = form.text("language", hint);
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Transcription(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Transcription(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::Transcription(e.to_string())
        })?;

        Ok(Transcript {
            text: result.text,
            language: result
                .language
                .unwrap_or_else(|| audio.language().to_string()),
            duration: result.duration.unwrap_or_default(),
        })
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &AudioInput) -> Result<Transcript> {
        tracing::debug!(audio_bytes = audio.bytes().len(), "starting Deepgram transcription");

        let mut query = vec![("model", self.model.as_str()), ("punctuate", "true")];
        match audio.language().hint() {
            Some(hint) => query.push(("language", hint)),
            None => query.push(("detect_language", "true")),
        }

        let response = self
            .client
            .post("https://api.deepgram.com/v1/listen")
            .query(&query)
            .header(
                "Authorization",
                format!("Token {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", audio.mime_type())
            .body(audio.bytes().to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                Error::Transcription(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Transcription(format!(
                "Deepgram API error {status}: {body}"
            )));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            Error::Transcription(e.to_string())
        })?;

        let channel = result.results.channels.first();
        let text = channel
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();
        let language = channel
            .and_then(|c| c.detected_language.clone())
            .unwrap_or_else(|| audio.language().to_string());

        Ok(Transcript {
            text,
            language,
            duration: result.metadata.map(|m| m.duration).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &AudioInput) -> Result<Transcript> {
        if audio.bytes().is_empty() {
            return Err(Error::Transcription("input audio is empty".to_string()));
        }

        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
        };

        tracing::info!(
            transcript = %transcript.text,
            language = %transcript.language,
            duration = transcript.duration,
            "transcription complete"
        );
        Ok(transcript)
    }
}

pub(crate) fn require_key(key: Option<SecretString>, name: &'static str) -> Result<SecretString> {
    key.filter(|k| !k.expose_secret().trim().is_empty())
        .ok_or(Error::MissingCredential(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Language;

    #[test]
    fn test_missing_key_is_fatal() {
        let err = SpeechToText::new_whisper(None, "whisper-1".to_string())
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingCredential("OPENAI_API_KEY")));

        let blank = Some(SecretString::from("  ".to_string()));
        let err = SpeechToText::new_deepgram(blank, "nova-2".to_string())
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingCredential("DEEPGRAM_API_KEY")));
    }

    #[tokio::test]
    async fn test_empty_audio_rejected_before_request() {
        let stt = SpeechToText::new_whisper(
            Some(SecretString::from("sk-test".to_string())),
            "whisper-1".to_string(),
        )
        .unwrap();
        let audio = AudioInput::new(Vec::new(), Language::He, "q.wav");

        let err = stt.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Whisper".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!("deepgram".parse::<SttProvider>().unwrap(), SttProvider::Deepgram);
        assert!(matches!("azure".parse::<SttProvider>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_whisper_verbose_json_parse() {
        let body = r#"{"task":"transcribe","language":"hebrew","duration":2.5,"text":"מה זה RAG?"}"#;
        let parsed: WhisperResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text, "מה זה RAG?");
        assert_eq!(parsed.language.as_deref(), Some("hebrew"));
        assert_eq!(parsed.duration, Some(2.5));
    }

    #[test]
    fn test_deepgram_parse() {
        let body = r#"{
            "metadata": {"duration": 1.25},
            "results": {"channels": [{"detected_language": "en",
                "alternatives": [{"transcript": "what is a vector store"}]}]}
        }"#;
        let parsed: DeepgramResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.results.channels[0].alternatives[0].transcript,
            "what is a vector store"
        );
        assert!((parsed.metadata.unwrap().duration - 1.25).abs() < f64::EPSILON);
    }
}
