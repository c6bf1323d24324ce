//! Sequential orchestration: full response first, then one synthesis call

use async_trait::async_trait;
use futures::StreamExt;

use super::deadline::{Deadline, within};
use super::latency::Mark;
use super::stages::{Providers, Run, StageResult, synthesize_chunk};
use super::state::PipelineState;
use super::types::{PipelineMode, PipelineRequest, SynthesisChunk};
use super::{Orchestrator, PipelineResult, Stage, instrumented};

/// Orchestrator that waits for the complete response before synthesizing
pub struct SimpleOrchestrator {
    providers: Providers,
}

impl SimpleOrchestrator {
    #[must_use]
    pub const fn new(providers: Providers) -> Self {
        Self { providers }
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        deadline: Option<Deadline>,
    ) -> PipelineResult {
        let mut run = Run::new(PipelineMode::Simple);
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
        tracing::info!("generating response");

        let mut increments = self
            .providers
            .generator
            .generate(run.question(), &run.context)
            .await
            .map_err(|e| (Stage::Generation, e))?;

        while let Some(item) = increments.next().await {
            let text = item.map_err(|e| (Stage::Generation, e))?;
            if run.latency.mark_once(Mark::LlmFirstToken) {
                tracing::debug!("[LLM] first token received");
            }
            run.response.push_str(&text);
        }
        run.latency.mark(Mark::LlmEnd);
        tracing::info!(chars = run.response.chars().count(), "[LLM] response complete");

        let chunk = SynthesisChunk {
            text: run.response.clone(),
            sequence: 0,
        };
        let outcome = synthesize_chunk(
            self.providers.synthesizer.as_ref(),
            chunk,
            &request.voice_id,
        )
        .await;

        if let Some((started, finished)) = outcome.timing {
            run.record_first_synthesis(started, finished);
        }
        if let Some(e) = outcome.error {
            run.warn(format!("synthesis failed: {e}"));
        }
        run.audio_chunks = 1;
        run.audio = outcome.audio.bytes;
        tracing::info!(audio_bytes = run.audio.len(), "[TTS] audio generated");

        run.advance(PipelineState::Assembling);
        Ok(())
    }
}

#[async_trait]
impl Orchestrator for SimpleOrchestrator {
    fn mode(&self) -> PipelineMode {
        PipelineMode::Simple
    }

    async fn run_until(
        &self,
        request: &PipelineRequest,
        deadline: Option<Deadline>,
    ) -> PipelineResult {
        instrumented(request, self.mode(), self.execute(request, deadline)).await
    }
}
