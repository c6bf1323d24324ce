//! Streaming response generation
//!
//! Providers stream their answer as server-sent events. A background task
//! decodes the event stream and forwards text increments through a bounded
//! channel; the consumer sees an ordinary [`Stream`] of increments.

mod anthropic;
mod openai;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

pub use anthropic::AnthropicGenerator;
pub use openai::OpenAiGenerator;
use sse::{SseDecoder, SseEvent};

use crate::{Error, Result};

/// Ordered, finite stream of response increments
pub type IncrementStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Increments buffered between the network task and the consumer
const INCREMENT_BUFFER: usize = 64;

/// Produces a response to a question as a stream of text increments
#[async_trait]
pub trait Generator: Send + Sync {
    /// Start generating an answer to `question` grounded in `context`
    ///
    /// # Errors
    ///
    /// Returns `Error::Generation` if the request cannot be started; failures
    /// after that arrive as an `Err` item on the stream
    async fn generate(&self, question: &str, context: &str) -> Result<IncrementStream>;
}

/// LLM provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAI,
}

impl LlmProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAI => "gpt-4o-mini",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::Config(format!("unknown LLM provider '{other}'"))),
        }
    }
}

/// What a decoded event means for the increment stream
pub(crate) enum StreamStep {
    Text(String),
    Skip,
    Done,
    Fail(String),
}

/// Check the HTTP status of a streaming request before consuming its body
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    provider: &'static str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(provider, status = %status, body = %body, "LLM API error");
    Err(Error::Generation(format!("{provider} API error {status}: {body}")))
}

/// Decode `response` as server-sent events on a background task
///
/// The task stops early when the consumer drops the stream.
pub(crate) fn forward_events<F>(
    response: reqwest::Response,
    provider: &'static str,
    mut step: F,
) -> IncrementStream
where
    F: FnMut(&SseEvent) -> StreamStep + Send + 'static,
{
    let (tx, rx) = mpsc::channel(INCREMENT_BUFFER);

    tokio::spawn(
        async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(read) = body.next().await {
                let bytes = match read {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(provider, error = %e, "LLM stream read failed");
                        let _ = tx
                            .send(Err(Error::Generation(format!("{provider} stream error: {e}"))))
                            .await;
                        return;
                    }
                };

                for event in decoder.feed(&bytes) {
                    match step(&event) {
                        StreamStep::Text(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                tracing::debug!(provider, "increment consumer dropped");
                                return;
                            }
                        }
                        StreamStep::Skip => {}
                        StreamStep::Done => return,
                        StreamStep::Fail(message) => {
                            tracing::error!(provider, error = %message, "LLM stream error event");
                            let _ = tx.send(Err(Error::Generation(message))).await;
                            return;
                        }
                    }
                }
            }

            if let Some(event) = decoder.finish() {
                match step(&event) {
                    StreamStep::Text(text) => {
                        let _ = tx.send(Ok(text)).await;
                    }
                    StreamStep::Done => return,
                    StreamStep::Skip | StreamStep::Fail(_) => {}
                }
            }

            let _ = tx
                .send(Err(Error::Generation(format!(
                    "{provider} stream ended before completion"
                ))))
                .await;
        }
        .in_current_span(),
    );

    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(" Anthropic ".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert_eq!("openai".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!(matches!("gemini".parse::<LlmProvider>(), Err(Error::Config(_))));
    }
}
