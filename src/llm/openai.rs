//! `OpenAI` chat completions with streaming

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::sse::SseEvent;
use super::{Generator, IncrementStream, StreamStep, ensure_success, forward_events};
use crate::voice::require_key;
use crate::{Error, Result, prompt};

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: ChoiceDelta,
}

#[derive(Deserialize, Default)]
struct ChoiceDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Streams answers from an `OpenAI` chat model
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl OpenAiGenerator {
    /// Create a generator for `model`
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if the API key is absent
    pub fn new(api_key: Option<SecretString>, model: String, max_tokens: u32) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: require_key(api_key, "OPENAI_API_KEY")?,
            model,
            max_tokens,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<IncrementStream> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "stream": true,
            "messages": [
                { "role": "system", "content": prompt::VOICE_TUTOR_PROMPT },
                { "role": "user", "content": prompt::user_message(question, context) }
            ],
        });

        tracing::debug!(model = %self.model, "starting OpenAI stream");

        let response = self
            .client
            .post(COMPLETIONS_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "OpenAI request failed");
                Error::Generation(e.to_string())
            })?;

        let response = ensure_success(response, "openai").await?;
        Ok(forward_events(response, "openai", step))
    }
}

fn step(event: &SseEvent) -> StreamStep {
    if event.data.trim() == "[DONE]" {
        return StreamStep::Done;
    }

    match serde_json::from_str::<ChunkResponse>(&event.data) {
        Ok(ChunkResponse {
            error: Some(error), ..
        }) => StreamStep::Fail(format!("openai: {}", error.message)),
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|t| !t.is_empty())
            .map_or(StreamStep::Skip, StreamStep::Text),
        Err(e) => {
            tracing::warn!(error = %e, data = %event.data, "unparseable OpenAI chunk");
            StreamStep::Skip
        }
    }
}
