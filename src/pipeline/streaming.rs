//! Overlapped orchestration: synthesize chunks while generation continues
//!
//! The generation loop owns the [`Chunker`] and pushes finalized chunks into a
//! bounded channel. The synthesis side pulls chunks in sequence order and runs
//! up to `synthesis_concurrency` provider calls at once; results land in an
//! [`AudioAssembler`] so audio comes out in sequence order no matter which
//! call finishes first.
//!
//! Both sides run inside the run's own future: dropping the run cancels queued
//! and in-flight synthesis.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;

use super::assembler::AudioAssembler;
use super::chunker::Chunker;
use super::deadline::{Deadline, within};
use super::latency::Mark;
use super::stages::{Providers, Run, StageResult, synthesize_chunk};
use super::state::PipelineState;
use super::types::{PipelineMode, PipelineRequest, SynthesisChunk};
use super::{Orchestrator, PipelineOptions, PipelineResult, Stage, instrumented};
use crate::Error;
use crate::llm::IncrementStream;
use crate::voice::Synthesizer;

/// Orchestrator that overlaps generation with chunked synthesis
pub struct StreamingOrchestrator {
    providers: Providers,
    options: PipelineOptions,
}

/// What the synthesis side hands back once its channel closes
#[derive(Default)]
struct Synthesized {
    audio: Vec<u8>,
    chunks: usize,
    /// Sequence, start and end of the earliest chunk that reached the provider
    first: Option<(u64, Instant, Instant)>,
    warnings: Vec<String>,
}

impl StreamingOrchestrator {
    #[must_use]
    pub const fn new(providers: Providers, options: PipelineOptions) -> Self {
        Self { providers, options }
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        deadline: Option<Deadline>,
    ) -> PipelineResult {
        let mut run = Run::new(PipelineMode::Streaming);
        let result = within(deadline, self.stages(request, &mut run)).await;
        run.settle(result)
    }

    async fn stages(&self, request: &PipelineRequest, run: &mut Run) -> StageResult {
        run.transcribe(self.providers.transcriber.as_ref(), &request.audio)
            .await
            .map_err(|e| (Stage::Transcription, e))?;

        run.retrieve(self.providers.context.as_ref(), request.scope_id.as_deref())
            .await;

        run.advance(PipelineState::Generating);
        run.latency.mark(Mark::LlmStart);
        tracing::info!(
            chunk_size = self.options.chunk_size,
            concurrency = self.options.synthesis_concurrency,
            "streaming response"
        );

        let increments = self
            .providers
            .generator
            .generate(run.question(), &run.context)
            .await
            .map_err(|e| (Stage::Generation, e))?;

        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let (failure, synthesized) = tokio::join!(
            feed_chunks(increments, self.options.chunk_size, tx, run),
            synthesize_all(
                self.providers.synthesizer.as_ref(),
                rx,
                &request.voice_id,
                self.options.synthesis_concurrency.max(1),
            ),
        );

        if let Some((_, started, finished)) = synthesized.first {
            run.record_first_synthesis(started, finished);
        }
        for warning in synthesized.warnings {
            run.warn(warning);
        }
        run.audio_chunks = synthesized.chunks;
        run.audio = synthesized.audio;

        if let Some(e) = failure {
            return Err((Stage::Generation, e));
        }

        run.advance(PipelineState::Assembling);
        Ok(())
    }
}

/// Consume the increment stream, handing finalized chunks to `tx`
///
/// Returns the generation error, if any. The channel closes when this
/// returns, which lets the synthesis side drain and finish.
async fn feed_chunks(
    mut increments: IncrementStream,
    chunk_size: usize,
    tx: mpsc::Sender<SynthesisChunk>,
    run: &mut Run,
) -> Option<Error> {
    let mut chunker = Chunker::new(chunk_size);
    let mut sender = Some(tx);

    while let Some(item) = increments.next().await {
        match item {
            Ok(text) => {
                if run.latency.mark_once(Mark::LlmFirstToken) {
                    tracing::debug!("[LLM] first token received");
                }
                run.response.push_str(&text);
                if let Some(chunk) = chunker.push(&text) {
                    dispatch(&mut sender, chunk, run).await;
                }
            }
            Err(e) => {
                if let Some(rest) = chunker.finish() {
                    tracing::debug!(
                        sequence = rest.sequence,
                        chars = rest.text.chars().count(),
                        "discarding unfinished chunk after generation failure"
                    );
                }
                return Some(e);
            }
        }
    }

    run.latency.mark(Mark::LlmEnd);
    tracing::info!(chars = run.response.chars().count(), "[LLM] response complete");
    if let Some(chunk) = chunker.finish() {
        dispatch(&mut sender, chunk, run).await;
    }
    None
}

/// Hand a chunk to the synthesis side
///
/// If the receiver is gone, text generation carries on without audio.
async fn dispatch(
    sender: &mut Option<mpsc::Sender<SynthesisChunk>>,
    chunk: SynthesisChunk,
    run: &mut Run,
) {
    let Some(tx) = sender.as_ref() else {
        return;
    };

    tracing::debug!(sequence = chunk.sequence, chars = chunk.text.chars().count(), "chunk ready");
    if tx.send(chunk).await.is_err() {
        run.warn("synthesis stopped early, remaining chunks not synthesized".to_string());
        *sender = None;
    }
}

/// Synthesize every chunk received on `rx`, at most `concurrency` at a time
async fn synthesize_all(
    synthesizer: &dyn Synthesizer,
    rx: mpsc::Receiver<SynthesisChunk>,
    voice_id: &str,
    concurrency: usize,
) -> Synthesized {
    let mut assembler = AudioAssembler::new();
    let mut out = Synthesized::default();

    let mut results = ReceiverStream::new(rx)
        .map(|chunk| synthesize_chunk(synthesizer, chunk, voice_id))
        .buffer_unordered(concurrency);

    while let Some(result) = results.next().await {
        let sequence = result.audio.sequence;
        if let Some((started, finished)) = result.timing
            && out.first.is_none_or(|(first, _, _)| sequence < first)
        {
            out.first = Some((sequence, started, finished));
        }
        if let Some(e) = result.error {
            out.warnings
                .push(format!("synthesis failed for chunk {sequence}: {e}"));
        }
        out.chunks += 1;
        assembler.insert(result.audio);
    }

    out.audio = assembler.assemble();
    out
}

#[async_trait]
impl Orchestrator for StreamingOrchestrator {
    fn mode(&self) -> PipelineMode {
        PipelineMode::Streaming
    }

    async fn run_until(
        &self,
        request: &PipelineRequest,
        deadline: Option<Deadline>,
    ) -> PipelineResult {
        instrumented(request, self.mode(), self.execute(request, deadline)).await
    }
}
