//! Stage steps shared by both orchestration modes
//!
//! A [`Run`] holds everything one request accumulates: state, timings,
//! warnings and partial results. Each stage helper records its own latency
//! marks and decides whether a provider error is fatal or degrades.

use std::sync::Arc;

use tokio::time::Instant;

use super::latency::{LatencyTracker, Mark};
use super::state::{PipelineState, StateLog};
use super::types::{AudioChunk, AudioInput, PipelineMode, SynthesisChunk, Transcript};
use super::{PipelineFailure, PipelineOutcome, PipelineResult, Stage};
use crate::Error;
use crate::context::ContextProvider;
use crate::llm::Generator;
use crate::voice::{Synthesizer, Transcriber};

/// The four capability providers a pipeline chains together
#[derive(Clone)]
pub struct Providers {
    pub transcriber: Arc<dyn Transcriber>,
    pub context: Arc<dyn ContextProvider>,
    pub generator: Arc<dyn Generator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

/// How a run's stages ended: `Err` names the fatal stage
pub(crate) type StageResult = Result<(), (Stage, Error)>;

/// Working state of one request
pub(crate) struct Run {
    mode: PipelineMode,
    state: StateLog,
    pub(crate) latency: LatencyTracker,
    pub(crate) warnings: Vec<String>,
    pub(crate) transcript: Option<Transcript>,
    pub(crate) context: String,
    pub(crate) response: String,
    pub(crate) audio: Vec<u8>,
    pub(crate) audio_chunks: usize,
}

impl Run {
    pub(crate) fn new(mode: PipelineMode) -> Self {
        Self {
            mode,
            state: StateLog::default(),
            latency: LatencyTracker::new(),
            warnings: Vec::new(),
            transcript: None,
            context: String::new(),
            response: String::new(),
            audio: Vec::new(),
            audio_chunks: 0,
        }
    }

    pub(crate) fn advance(&mut self, next: PipelineState) {
        self.state.advance(next);
    }

    /// Record a degraded-but-successful condition
    pub(crate) fn warn(&mut self, message: String) {
        tracing::warn!(warning = %message, "degraded pipeline stage");
        self.warnings.push(message);
    }

    /// Transcribed question text (empty before transcription)
    pub(crate) fn question(&self) -> &str {
        self.transcript.as_ref().map_or("", |t| t.text.as_str())
    }

    /// Transcribe the question; failure is fatal
    pub(crate) async fn transcribe(
        &mut self,
        transcriber: &dyn Transcriber,
        audio: &AudioInput,
    ) -> Result<(), Error> {
        self.advance(PipelineState::Transcribing);
        self.latency.mark(Mark::SttStart);
        tracing::info!(
            audio_bytes = audio.bytes().len(),
            language = %audio.language(),
            "transcribing audio"
        );

        let transcript = transcriber.transcribe(audio).await?;
        self.latency.mark(Mark::SttEnd);

        tracing::info!(
            transcript = %transcript.text,
            language = %transcript.language,
            duration = transcript.duration,
            "[STT] transcription ready"
        );
        self.transcript = Some(transcript);
        Ok(())
    }

    /// Retrieve context; any failure degrades to an empty context
    pub(crate) async fn retrieve(
        &mut self,
        provider: &dyn ContextProvider,
        scope_id: Option<&str>,
    ) {
        self.advance(PipelineState::RetrievingContext);
        self.latency.mark(Mark::RagStart);

        let query = self.question().to_string();
        let preview: String = query.chars().take(50).collect();
        tracing::info!(query = %preview, scope = scope_id.unwrap_or("all"), "retrieving context");

        let result = provider.retrieve(&query, scope_id).await;
        self.latency.mark(Mark::RagEnd);

        match result {
            Ok(context) => {
                tracing::info!(chars = context.chars().count(), "[RAG] context retrieved");
                if context.is_empty() {
                    self.warn("retrieved context is empty".to_string());
                }
                self.context = context;
            }
            Err(e) => {
                self.warn(format!("context retrieval failed, continuing without context: {e}"));
                self.context = String::new();
            }
        }
    }

    /// Record the first synthesized chunk's timing
    pub(crate) fn record_first_synthesis(&mut self, started: Instant, finished: Instant) {
        self.latency.mark_at(Mark::TtsStart, started);
        self.latency.mark_at(Mark::TtsEnd, finished);
    }

    /// Close the run successfully
    pub(crate) fn finish(mut self) -> PipelineOutcome {
        if self.audio.is_empty() && !self.response.trim().is_empty() {
            self.warn("synthesized audio is empty".to_string());
        }
        self.advance(PipelineState::Done);

        let outcome = self.into_outcome();
        let report = outcome.report();
        tracing::info!(
            audio_bytes = outcome.audio.len(),
            chunks = outcome.audio_chunks,
            warnings = outcome.warnings.len(),
            total_ms = report.total_latency_ms,
            "pipeline complete"
        );
        outcome
    }

    /// Close the run according to how its stages ended
    pub(crate) fn settle(self, result: StageResult) -> PipelineResult {
        match result {
            Ok(()) => Ok(self.finish()),
            Err((stage, source)) => Err(self.fail(stage, source)),
        }
    }

    /// Close the run as failed, keeping whatever was produced
    pub(crate) fn fail(mut self, stage: Stage, source: Error) -> PipelineFailure {
        tracing::error!(%stage, error = %source, "pipeline failed");
        if stage == Stage::Deadline {
            self.state.abort();
        } else {
            self.advance(PipelineState::Failed);
        }
        PipelineFailure {
            stage,
            source,
            partial: Box::new(self.into_outcome()),
        }
    }

    fn into_outcome(self) -> PipelineOutcome {
        PipelineOutcome {
            mode: self.mode,
            state: self.state.current(),
            history: self.state.into_history(),
            transcript: self.transcript,
            context: self.context,
            response: self.response,
            audio: self.audio,
            audio_chunks: self.audio_chunks,
            latency: self.latency,
            warnings: self.warnings,
        }
    }
}

/// Result of synthesizing one chunk
pub(crate) struct ChunkSynthesis {
    pub(crate) audio: AudioChunk,
    /// Start and end of the provider call; `None` when the text was blank
    pub(crate) timing: Option<(Instant, Instant)>,
    pub(crate) error: Option<Error>,
}

/// Synthesize one chunk; provider errors yield empty audio for that chunk only
pub(crate) async fn synthesize_chunk(
    synthesizer: &dyn Synthesizer,
    chunk: SynthesisChunk,
    voice_id: &str,
) -> ChunkSynthesis {
    let text = chunk.text.trim();
    if text.is_empty() {
        tracing::debug!(sequence = chunk.sequence, "[TTS] blank chunk skipped");
        return ChunkSynthesis {
            audio: AudioChunk {
                bytes: Vec::new(),
                sequence: chunk.sequence,
            },
            timing: None,
            error: None,
        };
    }

    let started = Instant::now();
    let (bytes, error) = match synthesizer.synthesize(text, voice_id).await {
        Ok(bytes) => (bytes, None),
        Err(e) => (Vec::new(), Some(e)),
    };
    let finished = Instant::now();

    tracing::debug!(
        sequence = chunk.sequence,
        chars = text.chars().count(),
        audio_bytes = bytes.len(),
        elapsed_ms = finished.duration_since(started).as_millis(),
        failed = error.is_some(),
        "[TTS] chunk synthesized"
    );

    ChunkSynthesis {
        audio: AudioChunk {
            bytes,
            sequence: chunk.sequence,
        },
        timing: Some((started, finished)),
        error,
    }
}
