//! Voice Tutor - spoken questions in, spoken answers out
//!
//! This library answers a recorded question about course content:
//! - Speech-to-text for the question (Whisper, Deepgram)
//! - Context retrieval from course material
//! - Streaming answer generation (Anthropic, `OpenAI`)
//! - Text-to-speech for the answer (`ElevenLabs`, `OpenAI`)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Audio in                          │
//! └────────────────────────┬─────────────────────────────┘
//!                          │
//! ┌────────────────────────▼─────────────────────────────┐
//! │   Transcribe  →  Retrieve  →  Generate (streaming)    │
//! └────────────────────────┬─────────────────────────────┘
//!                          │ increments
//! ┌────────────────────────▼─────────────────────────────┐
//! │   Chunker  →  Synthesis (overlapped)  →  Assembler    │
//! └────────────────────────┬─────────────────────────────┘
//!                          │
//! ┌────────────────────────▼─────────────────────────────┐
//! │            Audio out  +  latency report               │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{
    Orchestrator, PipelineFailure, PipelineMode, PipelineOptions, PipelineOutcome,
    PipelineRequest, Providers, build_orchestrator,
};
pub use report::MetricsDocument;
