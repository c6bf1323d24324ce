//! Pipeline state machine

use std::fmt;

use serde::Serialize;

/// Stage a request is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Transcribing,
    RetrievingContext,
    /// Generation, plus chunking and synthesis in streaming mode
    Generating,
    Assembling,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether `self → next` is a legal transition
    ///
    /// Retrieval never fails: its errors degrade to an empty context.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Transcribing)
                | (Self::Transcribing, Self::RetrievingContext | Self::Failed)
                | (Self::RetrievingContext, Self::Generating)
                | (Self::Generating, Self::Assembling | Self::Failed)
                | (Self::Assembling, Self::Done)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Transcribing => "transcribing",
            Self::RetrievingContext => "retrieving_context",
            Self::Generating => "generating",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current state plus every state entered, in order
#[derive(Debug, Clone)]
pub struct StateLog {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl Default for StateLog {
    fn default() -> Self {
        Self {
            current: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }
}

impl StateLog {
    #[must_use]
    pub const fn current(&self) -> PipelineState {
        self.current
    }

    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to `next`
    pub fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal pipeline transition {} -> {next}",
            self.current
        );
        if !self.current.can_transition_to(next) {
            tracing::warn!(from = %self.current, to = %next, "illegal pipeline transition");
        }

        tracing::debug!(from = %self.current, to = %next, "pipeline state");
        self.current = next;
        self.history.push(next);
    }

    /// Abandon the run from whatever state it is in
    ///
    /// Used when the run is cut off from outside (overall deadline), which
    /// can happen in any stage.
    pub fn abort(&mut self) {
        if self.current.is_terminal() {
            return;
        }
        tracing::debug!(from = %self.current, "pipeline abandoned");
        self.current = PipelineState::Failed;
        self.history.push(PipelineState::Failed);
    }

    #[must_use]
    pub fn into_history(self) -> Vec<PipelineState> {
        self.history
    }
}
