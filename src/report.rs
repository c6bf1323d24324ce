//! Metrics document written after a run

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::pipeline::{LatencyReport, PipelineMode, PipelineOutcome, PipelineState};

/// JSON summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct MetricsDocument {
    pub request_id: uuid::Uuid,
    pub mode: PipelineMode,
    pub state: PipelineState,
    pub transcript: String,
    pub response: String,
    /// Size of the synthesized audio in bytes
    pub audio_size: usize,
    pub metrics: LatencyReport,
    pub warnings: Vec<String>,
    /// Fatal error, if the run failed
    pub error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl MetricsDocument {
    /// Summarize a finished (or partial) run
    #[must_use]
    pub fn new(request_id: uuid::Uuid, outcome: &PipelineOutcome, error: Option<String>) -> Self {
        Self {
            request_id,
            mode: outcome.mode,
            state: outcome.state,
            transcript: outcome.transcript_text().to_string(),
            response: outcome.response.clone(),
            audio_size: outcome.audio.len(),
            metrics: outcome.report(),
            warnings: outcome.warnings.clone(),
            error,
            generated_at: Utc::now(),
        }
    }

    /// Write the document as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the file write fails
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        tracing::info!(path = %path.display(), "metrics saved");
        Ok(())
    }
}
