//! Sequence-ordered reassembly of synthesized audio

use std::collections::BTreeMap;

use super::types::AudioChunk;

/// Collects audio chunks in completion order, emits them in sequence order
#[derive(Debug, Default)]
pub struct AudioAssembler {
    chunks: BTreeMap<u64, Vec<u8>>,
}

impl AudioAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a finished chunk; a repeated sequence number replaces the earlier audio
    pub fn insert(&mut self, chunk: AudioChunk) {
        if self.chunks.insert(chunk.sequence, chunk.bytes).is_some() {
            tracing::warn!(sequence = chunk.sequence, "duplicate audio chunk replaced");
        }
    }

    /// Number of chunks received
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate all chunk bytes by ascending sequence number
    #[must_use]
    pub fn assemble(self) -> Vec<u8> {
        let total = self.chunks.values().map(Vec::len).sum();
        let mut audio = Vec::with_capacity(total);
        for bytes in self.chunks.into_values() {
            audio.extend_from_slice(&bytes);
        }
        audio
    }
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;

    use super::*;

    fn chunk(sequence: u64, bytes: &[u8]) -> AudioChunk {
        AudioChunk {
            bytes: bytes.to_vec(),
            sequence,
        }
    }

    #[test]
    fn test_out_of_order_insert() {
        let mut assembler = AudioAssembler::new();
        assembler.insert(chunk(2, b"cc"));
        assembler.insert(chunk(0, b"a"));
        assembler.insert(chunk(1, b""));

        assert_eq!(assembler.len(), 3);
        assert_eq!(assembler.assemble(), b"acc");
    }

    #[test]
    fn test_empty() {
        let assembler = AudioAssembler::new();
        assert!(assembler.is_empty());
        assert!(assembler.assemble().is_empty());
    }

    #[test]
    fn test_shuffled_completion_is_order_stable() {
        let mut rng = rand::thread_rng();
        let chunks: Vec<AudioChunk> = (0..32u8)
            .map(|i| chunk(u64::from(i), &[i; 3]))
            .collect();
        let expected: Vec<u8> = chunks.iter().flat_map(|c| c.bytes.clone()).collect();

        for _ in 0..100 {
            let mut shuffled = chunks.clone();
            shuffled.shuffle(&mut rng);

            let mut assembler = AudioAssembler::new();
            for c in shuffled {
                assembler.insert(c);
            }
            assert_eq!(assembler.assemble(), expected);
        }
    }
}
