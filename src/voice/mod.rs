//! Voice processing module
//!
//! Speech-to-text for the question and text-to-speech for the answer, both
//! through hosted providers.

mod stt;
mod tts;

pub(crate) use stt::require_key;
pub use stt::{SpeechToText, SttProvider, Transcriber};
pub use tts::{Synthesizer, TextToSpeech, TtsProvider, VoiceSettings};
