//! Stage timestamps and the derived latency report

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

const MARK_COUNT: usize = 9;

/// A stage boundary worth timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    SttStart,
    SttEnd,
    RagStart,
    RagEnd,
    LlmStart,
    LlmFirstToken,
    LlmEnd,
    TtsStart,
    TtsEnd,
}

impl Mark {
    /// Every mark, in pipeline order
    pub const ALL: [Self; MARK_COUNT] = [
        Self::SttStart,
        Self::SttEnd,
        Self::RagStart,
        Self::RagEnd,
        Self::LlmStart,
        Self::LlmFirstToken,
        Self::LlmEnd,
        Self::TtsStart,
        Self::TtsEnd,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Monotonic timestamps recorded at stage boundaries of one request
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    marks: [Option<Instant>; MARK_COUNT],
}

impl LatencyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `mark` at the current instant
    pub fn mark(&mut self, mark: Mark) {
        self.mark_at(mark, Instant::now());
    }

    /// Record `mark` at a specific instant (timings measured around a provider call)
    pub fn mark_at(&mut self, mark: Mark, at: Instant) {
        self.marks[mark.index()] = Some(at);
    }

    /// Record `mark` now unless it was already recorded; returns whether it was set
    pub fn mark_once(&mut self, mark: Mark) -> bool {
        if self.is_set(mark) {
            return false;
        }
        self.mark(mark);
        true
    }

    #[must_use]
    pub fn get(&self, mark: Mark) -> Option<Instant> {
        self.marks[mark.index()]
    }

    #[must_use]
    pub fn is_set(&self, mark: Mark) -> bool {
        self.get(mark).is_some()
    }

    /// Marks recorded so far, in pipeline order
    #[must_use]
    pub fn recorded(&self) -> Vec<Mark> {
        Mark::ALL.into_iter().filter(|m| self.is_set(*m)).collect()
    }

    /// Milliseconds between two marks, 0 if either is missing
    #[must_use]
    pub fn span_ms(&self, start: Mark, end: Mark) -> f64 {
        match (self.get(start), self.get(end)) {
            (Some(s), Some(e)) => e.saturating_duration_since(s).as_secs_f64() * 1000.0,
            _ => 0.0,
        }
    }

    /// Derive per-stage durations
    #[must_use]
    pub fn report(&self) -> LatencyReport {
        LatencyReport {
            stt_latency_ms: self.span_ms(Mark::SttStart, Mark::SttEnd),
            rag_latency_ms: self.span_ms(Mark::RagStart, Mark::RagEnd),
            llm_first_token_ms: self.span_ms(Mark::LlmStart, Mark::LlmFirstToken),
            llm_total_ms: self.span_ms(Mark::LlmStart, Mark::LlmEnd),
            tts_latency_ms: self.span_ms(Mark::TtsStart, Mark::TtsEnd),
            total_latency_ms: self.span_ms(Mark::SttStart, Mark::TtsEnd),
        }
    }
}

/// Per-stage durations in milliseconds
///
/// A duration is 0 when its end mark was never recorded (stage skipped or
/// failed). `tts_latency_ms` covers only the first synthesized chunk, so in
/// streaming mode `total_latency_ms` is the time to first audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    pub stt_latency_ms: f64,
    pub rag_latency_ms: f64,
    pub llm_first_token_ms: f64,
    pub llm_total_ms: f64,
    pub tts_latency_ms: f64,
    pub total_latency_ms: f64,
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Voice Pipeline Latency Report ===")?;
        writeln!(f, "STT:                  {:.0}ms", self.stt_latency_ms)?;
        writeln!(f, "RAG retrieval:        {:.0}ms", self.rag_latency_ms)?;
        writeln!(f, "LLM first token:      {:.0}ms", self.llm_first_token_ms)?;
        writeln!(f, "LLM total:            {:.0}ms", self.llm_total_ms)?;
        writeln!(f, "TTS generation:       {:.0}ms", self.tts_latency_ms)?;
        writeln!(f, "TOTAL END-TO-END:     {:.0}ms", self.total_latency_ms)?;
        write!(f, "{}", "=".repeat(40))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_missing_end_reports_zero() {
        let mut tracker = LatencyTracker::new();
        tracker.mark(Mark::SttStart);

        let report = tracker.report();
        assert!(report.stt_latency_ms.abs() < f64::EPSILON);
        assert!(report.total_latency_ms.abs() < f64::EPSILON);
        assert_eq!(tracker.recorded(), vec![Mark::SttStart]);
    }

    #[test]
    fn test_spans_from_explicit_instants() {
        let base = Instant::now();
        let mut tracker = LatencyTracker::new();
        tracker.mark_at(Mark::SttStart, base);
        tracker.mark_at(Mark::SttEnd, base + Duration::from_millis(300));
        tracker.mark_at(Mark::LlmStart, base + Duration::from_millis(400));
        tracker.mark_at(Mark::LlmFirstToken, base + Duration::from_millis(650));
        tracker.mark_at(Mark::TtsStart, base + Duration::from_millis(700));
        tracker.mark_at(Mark::TtsEnd, base + Duration::from_millis(1100));

        let report = tracker.report();
        assert!((report.stt_latency_ms - 300.0).abs() < 1e-6);
        assert!((report.llm_first_token_ms - 250.0).abs() < 1e-6);
        assert!((report.tts_latency_ms - 400.0).abs() < 1e-6);
        assert!((report.total_latency_ms - 1100.0).abs() < 1e-6);
        assert!(report.llm_total_ms.abs() < f64::EPSILON);
    }

    #[test]
    fn test_mark_once_keeps_first() {
        let base = Instant::now();
        let mut tracker = LatencyTracker::new();
        tracker.mark_at(Mark::TtsStart, base);

        assert!(!tracker.mark_once(Mark::TtsStart));
        assert_eq!(tracker.get(Mark::TtsStart), Some(base));
        assert!(tracker.mark_once(Mark::TtsEnd));
    }

    #[test]
    fn test_report_serializes_with_ms_keys() {
        let json = serde_json::to_value(LatencyReport::default()).unwrap();
        for key in [
            "stt_latency_ms",
            "rag_latency_ms",
            "llm_first_token_ms",
            "llm_total_ms",
            "tts_latency_ms",
            "total_latency_ms",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
