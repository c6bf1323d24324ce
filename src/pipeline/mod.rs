//! Voice question pipeline
//!
//! A request flows through transcription, context retrieval, streaming
//! generation and synthesis. Two orchestrators share the same stage helpers:
//!
//! - [`SimpleOrchestrator`] waits for the complete response and synthesizes it once
//! - [`StreamingOrchestrator`] chunks the response as it arrives and synthesizes
//!   chunks concurrently with generation, reassembling audio in sequence order
//!
//! Transcription and generation failures are fatal. Retrieval and synthesis
//! failures degrade the result and are reported as warnings.

mod assembler;
mod chunker;
mod deadline;
mod latency;
mod simple;
mod stages;
mod state;
mod streaming;
mod types;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

pub use assembler::AudioAssembler;
pub use chunker::{Chunker, DEFAULT_CHUNK_SIZE, chunk_increments};
pub use deadline::{Deadline, WithDeadline};
pub use latency::{LatencyReport, LatencyTracker, Mark};
pub use simple::SimpleOrchestrator;
pub use stages::Providers;
pub use state::{PipelineState, StateLog};
pub use streaming::StreamingOrchestrator;
pub use types::{
    AudioChunk, AudioInput, Language, PipelineMode, PipelineRequest, SynthesisChunk, Transcript,
};

use crate::Error;

/// Default number of chunks that may wait between chunking and synthesis
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Tuning knobs shared by both orchestrators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Chunk length threshold in characters (streaming only)
    pub chunk_size: usize,
    /// Chunks synthesized at once (streaming only, at least 1)
    pub synthesis_concurrency: usize,
    /// Bounded handoff between chunker and synthesizer (streaming only)
    pub channel_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            synthesis_concurrency: 1,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Everything a run produced, complete or partial
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub mode: PipelineMode,
    /// Terminal state (`Done` or `Failed`)
    pub state: PipelineState,
    /// Every state entered, starting at `Idle`
    pub history: Vec<PipelineState>,
    pub transcript: Option<Transcript>,
    pub context: String,
    pub response: String,
    /// Chunk audio concatenated in sequence order
    pub audio: Vec<u8>,
    /// Number of chunks that went through synthesis
    pub audio_chunks: usize,
    pub latency: LatencyTracker,
    pub warnings: Vec<String>,
}

impl PipelineOutcome {
    #[must_use]
    pub fn report(&self) -> LatencyReport {
        self.latency.report()
    }

    /// Whether the run ever entered `state`
    #[must_use]
    pub fn entered(&self, state: PipelineState) -> bool {
        self.history.contains(&state)
    }

    /// Transcribed question text, empty if transcription never completed
    #[must_use]
    pub fn transcript_text(&self) -> &str {
        self.transcript.as_ref().map_or("", |t| t.text.as_str())
    }
}

/// Stage that aborted a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Generation,
    Deadline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transcription => "transcription",
            Self::Generation => "generation",
            Self::Deadline => "pipeline deadline",
        })
    }
}

/// A fatal run failure together with the partial outcome
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub source: Error,
    pub partial: Box<PipelineOutcome>,
}

pub type PipelineResult = std::result::Result<PipelineOutcome, PipelineFailure>;

/// Runs one request end to end
#[async_trait]
pub trait Orchestrator: Send + Sync {
    fn mode(&self) -> PipelineMode;

    /// Answer one voice question
    ///
    /// Degraded stages still produce `Ok`; only fatal stages produce `Err`.
    async fn run(&self, request: &PipelineRequest) -> PipelineResult {
        self.run_until(request, None).await
    }

    /// Answer one voice question, abandoning it at `deadline`
    ///
    /// An abandoned run fails with [`Stage::Deadline`] and keeps its partial
    /// outcome; provider calls still pending are cancelled.
    async fn run_until(
        &self,
        request: &PipelineRequest,
        deadline: Option<Deadline>,
    ) -> PipelineResult;
}

#[async_trait]
impl<T: Orchestrator + ?Sized> Orchestrator for Box<T> {
    fn mode(&self) -> PipelineMode {
        (**self).mode()
    }

    async fn run_until(
        &self,
        request: &PipelineRequest,
        deadline: Option<Deadline>,
    ) -> PipelineResult {
        (**self).run_until(request, deadline).await
    }
}

/// Span every run executes in
fn run_span(request: &PipelineRequest, mode: PipelineMode) -> tracing::Span {
    tracing::info_span!(
        "pipeline",
        request_id = %request.id,
        mode = %mode,
        language = %request.audio.language()
    )
}

/// Run `future` inside the request's span
pub(crate) async fn instrumented<F>(
    request: &PipelineRequest,
    mode: PipelineMode,
    future: F,
) -> PipelineResult
where
    F: std::future::Future<Output = PipelineResult>,
{
    future.instrument(run_span(request, mode)).await
}

/// Build the orchestrator for `mode`, optionally bounded by a deadline
#[must_use]
pub fn build_orchestrator(
    mode: PipelineMode,
    providers: Providers,
    options: PipelineOptions,
    deadline: Option<Duration>,
) -> Box<dyn Orchestrator> {
    let inner: Box<dyn Orchestrator> = match mode {
        PipelineMode::Simple => Box::new(SimpleOrchestrator::new(providers)),
        PipelineMode::Streaming => Box::new(StreamingOrchestrator::new(providers, options)),
    };

    match deadline {
        Some(limit) => Box::new(WithDeadline::new(inner, limit)),
        None => inner,
    }
}
