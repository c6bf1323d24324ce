//! Overall time limit for a run

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::stages::StageResult;
use super::types::{PipelineMode, PipelineRequest};
use super::{Orchestrator, PipelineResult, Stage};
use crate::Error;

/// Same horizon tokio uses for timers that never fire
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Instant a run is abandoned at, plus the limit it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// Deadline `limit` from now
    #[must_use]
    pub fn after(limit: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(limit)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { at, limit }
    }

    #[must_use]
    pub const fn at(&self) -> Instant {
        self.at
    }

    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Whichever of `self` and `other` expires first
    #[must_use]
    pub fn earliest(self, other: Option<Self>) -> Self {
        match other {
            Some(other) if other.at < self.at => other,
            _ => self,
        }
    }
}

/// Drive a run's stages, abandoning them at `deadline`
///
/// Dropping `stages` cancels every provider call it still owns, including
/// queued synthesis.
pub(crate) async fn within<F>(deadline: Option<Deadline>, stages: F) -> StageResult
where
    F: Future<Output = StageResult>,
{
    let Some(deadline) = deadline else {
        return stages.await;
    };

    if let Ok(result) = tokio::time::timeout_at(deadline.at, stages).await {
        result
    } else {
        tracing::error!(
            limit_ms = deadline.limit.as_millis(),
            "pipeline deadline exceeded"
        );
        Err((Stage::Deadline, Error::DeadlineExceeded(deadline.limit)))
    }
}

/// Wraps an orchestrator and abandons runs that exceed `limit`
///
/// An abandoned run keeps what it produced before the deadline: transcript,
/// context, response text and latency marks.
pub struct WithDeadline<O> {
    inner: O,
    limit: Duration,
}

impl<O> WithDeadline<O> {
    #[must_use]
    pub const fn new(inner: O, limit: Duration) -> Self {
        Self { inner, limit }
    }

    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl<O: Orchestrator> Orchestrator for WithDeadline<O> {
    fn mode(&self) -> PipelineMode {
        self.inner.mode()
    }

    async fn run_until(
        &self,
        request: &PipelineRequest,
        deadline: Option<Deadline>,
    ) -> PipelineResult {
        let deadline = Deadline::after(self.limit).earliest(deadline);
        self.inner.run_until(request, Some(deadline)).await
    }
}
