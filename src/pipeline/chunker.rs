//! Incremental text chunking for streaming synthesis
//!
//! Increments from the generator are appended to a buffer owned by the
//! [`Chunker`]. A chunk is finalized as soon as the buffer reaches the length
//! threshold or the increment just appended ends a sentence, so synthesis can
//! start long before generation finishes. Increments are never split: a chunk
//! may overrun the threshold by part of the increment that crossed it.

use super::types::SynthesisChunk;

/// Default chunk length threshold in characters
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Characters that end a sentence
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Accumulates response increments into synthesis-ready chunks
#[derive(Debug)]
pub struct Chunker {
    threshold: usize,
    buffer: String,
    buffered_chars: usize,
    next_sequence: u64,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Chunker {
    /// Create a chunker with the given character threshold (a zero threshold is treated as 1)
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            buffer: String::new(),
            buffered_chars: 0,
            next_sequence: 0,
        }
    }

    /// Character threshold in effect
    #[must_use]
    pub const fn threshold(&self) -> usize {
        self.threshold
    }

    /// Append one increment and return a chunk if a boundary was reached
    pub fn push(&mut self, increment: &str) -> Option<SynthesisChunk> {
        if increment.is_empty() {
            return None;
        }

        self.buffer.push_str(increment);
        self.buffered_chars += increment.chars().count();

        let at_sentence_end = increment
            .chars()
            .next_back()
            .is_some_and(|c| SENTENCE_TERMINATORS.contains(&c));

        if self.buffered_chars >= self.threshold || at_sentence_end {
            self.take()
        } else {
            None
        }
    }

    /// Flush whatever remains once the increment stream has ended
    #[must_use]
    pub fn finish(mut self) -> Option<SynthesisChunk> {
        self.take()
    }

    fn take(&mut self) -> Option<SynthesisChunk> {
        if self.buffer.is_empty() {
            return None;
        }

        let chunk = SynthesisChunk {
            text: std::mem::take(&mut self.buffer),
            sequence: self.next_sequence,
        };
        self.buffered_chars = 0;
        self.next_sequence += 1;
        Some(chunk)
    }
}

/// Run a whole increment sequence through a fresh chunker
#[must_use]
pub fn chunk_increments<'a, I>(increments: I, threshold: usize) -> Vec<SynthesisChunk>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chunker = Chunker::new(threshold);
    let mut chunks: Vec<SynthesisChunk> = increments
        .into_iter()
        .filter_map(|inc| chunker.push(inc))
        .collect();
    chunks.extend(chunker.finish());
    chunks
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::seq::SliceRandom;

    use super::*;

    #[test]
    fn terminator_emits_immediately() {
        let mut chunker = Chunker::new(100);

        assert_eq!(chunker.push("Hello"), None);
        let chunk = chunker.push(" world.").unwrap();
        assert_eq!(chunk.text, "Hello world.");
        assert_eq!(chunk.sequence, 0);

        assert_eq!(chunker.push(" Bye"), None);
        let last = chunker.finish().unwrap();
        assert_eq!(last.text, " Bye");
        assert_eq!(last.sequence, 1);
    }

    #[test]
    fn threshold_emits_without_terminator() {
        let chunks = chunk_increments(["abcd", "efgh", "ij"], 8);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "abcdefgh");
        assert_eq!(chunks[1].text, "ij");
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        // Each Hebrew letter is two bytes in UTF-8
        let chunks = chunk_increments(["של", "ום"], 4);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "שלום");

        let chunks = chunk_increments(["של", "ו"], 4);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence, 0);
    }

    #[test]
    fn terminator_only_checked_on_trailing_char() {
        // The period is mid-increment, so no boundary yet
        let mut chunker = Chunker::new(100);
        assert_eq!(chunker.push("e.g. this"), None);
        assert!(chunker.push("!").is_some());
    }

    #[test]
    fn empty_stream_emits_nothing() {
        assert!(chunk_increments(std::iter::empty(), 10).is_empty());
        assert!(chunk_increments(["", ""], 10).is_empty());
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let chunker = Chunker::new(0);
        assert_eq!(chunker.threshold(), 1);
        let chunks = chunk_increments(["a", "b"], 0);
        assert_eq!(chunks.len(), 2);
    }

    fn random_increments(rng: &mut impl Rng) -> Vec<String> {
        let pieces = [
            "Hello", " world", ".", " So", ", well", "...", " שלום", "!", " why", "?", " ",
            "a long fragment without any punctuation at all", "x",
        ];
        let len = rng.gen_range(0..40);
        (0..len)
            .map(|_| (*pieces.choose(rng).unwrap()).to_string())
            .collect()
    }

    #[test]
    fn randomized_streams_preserve_text_and_bounds() {
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let increments = random_increments(&mut rng);
            let threshold = rng.gen_range(1..80);

            let mut chunker = Chunker::new(threshold);
            let mut chunks = Vec::new();
            let mut last_increment_of_chunk = Vec::new();
            for inc in &increments {
                if let Some(chunk) = chunker.push(inc) {
                    chunks.push(chunk);
                    last_increment_of_chunk.push(inc.clone());
                }
            }
            let trailing = chunker.finish();

            // Concatenation is lossless
            let joined: String = chunks
                .iter()
                .chain(trailing.iter())
                .map(|c| c.text.as_str())
                .collect();
            assert_eq!(joined, increments.concat());

            // Never empty, sequences dense from zero
            for (i, chunk) in chunks.iter().chain(trailing.iter()).enumerate() {
                assert!(!chunk.text.is_empty());
                assert_eq!(chunk.sequence, i as u64);
            }

            // A chunk only overruns the threshold through the increment that closed it
            for (chunk, last) in chunks.iter().zip(&last_increment_of_chunk) {
                let before_last = chunk.text.chars().count() - last.chars().count();
                assert!(before_last < threshold, "chunk {:?} emitted late", chunk.text);
            }

            // The trailing chunk met neither condition
            if let Some(tail) = trailing {
                assert!(tail.text.chars().count() < threshold);
            }
        }
    }
}
