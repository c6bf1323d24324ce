//! Anthropic Messages API with streaming

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::sse::SseEvent;
use super::{Generator, IncrementStream, StreamStep, ensure_success, forward_events};
use crate::voice::require_key;
use crate::{Error, Result, prompt};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Streams answers from Claude
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl AnthropicGenerator {
    /// Create a generator for `model`
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if the API key is absent
    pub fn new(api_key: Option<SecretString>, model: String, max_tokens: u32) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: require_key(api_key, "ANTHROPIC_API_KEY")?,
            model,
            max_tokens,
        })
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<IncrementStream> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": prompt::VOICE_TUTOR_PROMPT,
            "stream": true,
            "messages": [
                { "role": "user", "content": prompt::user_message(question, context) }
            ],
        });

        tracing::debug!(model = %self.model, "starting Claude stream");

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Claude request failed");
                Error::Generation(e.to_string())
            })?;

        let response = ensure_success(response, "anthropic").await?;
        Ok(forward_events(response, "anthropic", step))
    }
}

fn step(event: &SseEvent) -> StreamStep {
    match serde_json::from_str::<StreamEvent>(&event.data) {
        Ok(StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        }) if !text.is_empty() => StreamStep::Text(text),
        Ok(StreamEvent::MessageStop) => StreamStep::Done,
        Ok(StreamEvent::Error { error }) => {
            StreamStep::Fail(format!("anthropic {}: {}", error.kind, error.message))
        }
        Ok(_) => StreamStep::Skip,
        Err(e) => {
            tracing::warn!(error = %e, data = %event.data, "unparseable Claude event");
            StreamStep::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_text_delta() {
        let ev = event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"So,"}}"#,
        );
        assert!(matches!(step(&ev), StreamStep::Text(t) if t == "So,"));
    }

    #[test]
    fn test_lifecycle_events() {
        assert!(matches!(step(&event(r#"{"type":"ping"}"#)), StreamStep::Skip));
        assert!(matches!(
            step(&event(r#"{"type":"message_start","message":{}}"#)),
            StreamStep::Skip
        ));
        assert!(matches!(
            step(&event(r#"{"type":"message_stop"}"#)),
            StreamStep::Done
        ));
    }

    #[test]
    fn test_error_event() {
        let ev = event(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#);
        assert!(
            matches!(step(&ev), StreamStep::Fail(msg) if msg == "anthropic overloaded_error: Overloaded")
        );
    }

    #[test]
    fn test_missing_key() {
        let err = AnthropicGenerator::new(None, "m".to_string(), 500).err().unwrap();
        assert!(matches!(err, Error::MissingCredential("ANTHROPIC_API_KEY")));
    }
}
