//! Shared test utilities: scripted providers

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::Instant;

use voice_tutor::context::ContextProvider;
use voice_tutor::llm::{Generator, IncrementStream};
use voice_tutor::pipeline::{AudioInput, Language, PipelineRequest, Providers, Transcript};
use voice_tutor::voice::{Synthesizer, Transcriber};
use voice_tutor::{Error, Result};

/// Transcriber that returns fixed text or fails
pub struct FakeTranscriber {
    text: Option<String>,
}

impl FakeTranscriber {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { text: None })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &AudioInput) -> Result<Transcript> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        match &self.text {
            Some(text) => Ok(Transcript {
                text: text.clone(),
                language: audio.language().to_string(),
                duration: 1.0,
            }),
            None => Err(Error::Transcription("audio could not be decoded".to_string())),
        }
    }
}

/// Context provider that returns fixed context or fails
pub struct FakeContext {
    context: Option<String>,
    queries: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeContext {
    pub fn ok(context: &str) -> Arc<Self> {
        Arc::new(Self {
            context: Some(context.to_string()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            context: None,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<(String, Option<String>)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextProvider for FakeContext {
    async fn retrieve(&self, query: &str, scope_id: Option<&str>) -> Result<String> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), scope_id.map(ToString::to_string)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.context
            .clone()
            .ok_or_else(|| Error::Retrieval("vector store unavailable".to_string()))
    }
}

/// Generator that replays scripted increments
pub struct FakeGenerator {
    increments: Vec<String>,
    /// Yield this many increments, then an error
    fail_after: Option<usize>,
    fail_to_start: bool,
    delay: Duration,
    calls: AtomicUsize,
    contexts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(increments: &[&str]) -> Self {
        Self {
            increments: increments.iter().map(ToString::to_string).collect(),
            fail_after: None,
            fail_to_start: false,
            delay: Duration::from_millis(30),
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn failing_to_start(mut self) -> Self {
        self.fail_to_start = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, _question: &str, context: &str) -> Result<IncrementStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.to_string());

        if self.fail_to_start {
            return Err(Error::Generation("401 unauthorized".to_string()));
        }

        let mut items: Vec<Result<String>> = self.increments.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(Error::Generation("connection reset".to_string())));
        }

        let delay = self.delay;
        Ok(Box::pin(futures::stream::iter(items).then(
            move |item| async move {
                tokio::time::sleep(delay).await;
                item
            },
        )))
    }
}

/// Synthesizer that returns the text's bytes as "audio"
///
/// Records each call's text and start instant in call order.
pub struct FakeSynthesizer {
    delay: Duration,
    delays: HashMap<String, Duration>,
    fail_on: Option<String>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(50),
            delays: HashMap::new(),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Per-text delays; texts not listed use the default delay
    pub fn with_delays(mut self, delays: HashMap<String, Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Fail any call whose text contains `needle`
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub fn first_call(&self) -> Option<Instant> {
        self.calls.lock().unwrap().first().map(|(_, at)| *at)
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), Instant::now()));

        let delay = self.delays.get(text).copied().unwrap_or(self.delay);
        tokio::time::sleep(delay).await;

        if self.fail_on.as_deref().is_some_and(|needle| text.contains(needle)) {
            return Err(Error::Synthesis("503 service unavailable".to_string()));
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Bundle fakes into a provider set
pub fn providers(
    transcriber: Arc<dyn Transcriber>,
    context: Arc<dyn ContextProvider>,
    generator: Arc<dyn Generator>,
    synthesizer: Arc<dyn Synthesizer>,
) -> Providers {
    Providers {
        transcriber,
        context,
        generator,
        synthesizer,
    }
}

/// A Hebrew question scoped to one video
pub fn request() -> PipelineRequest {
    let audio = AudioInput::new(b"RIFF....WAVE".to_vec(), Language::He, "question.wav");
    PipelineRequest::new(audio, "voice-he").with_scope(Some("lesson-7".to_string()))
}
