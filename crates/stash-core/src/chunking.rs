//! Text chunking for the semantic index.
//!
//! Extracted document text is split into fixed-size, overlapping windows
//! before embedding. Window sizes are counted in characters, never bytes,
//! so multi-byte text is never split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use stash_core::{Chunker, ChunkerConfig, SlidingWindowChunker};
//!
//! let chunker = SlidingWindowChunker::new(ChunkerConfig {
//!     max_chunk_size: 10,
//!     overlap: 2,
//! });
//! let chunks = chunker.chunk("abcdefghijklmnop");
//! assert_eq!(chunks[0].text, "abcdefghij");
//! assert_eq!(chunks[1].text, "ijklmnop");
//! ```

use crate::defaults;

/// Configuration for chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum size of a chunk in characters.
    pub max_chunk_size: usize,
    /// Number of characters shared by adjacent chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: defaults::CHUNK_SIZE,
            overlap: defaults::CHUNK_OVERLAP,
        }
    }
}

/// A text chunk with its position in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// Sequence number of the chunk within its document.
    pub index: usize,
    /// Starting byte offset in the original text.
    pub start_offset: usize,
    /// Ending byte offset in the original text.
    pub end_offset: usize,
}

/// Trait for chunking strategies.
pub trait Chunker: Send + Sync {
    /// Chunk the given text into a list of chunks.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    /// Get the configuration used by this chunker.
    fn config(&self) -> &ChunkerConfig;
}

/// Fixed-size windows advancing by `max_chunk_size - overlap` characters.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowChunker {
    config: ChunkerConfig,
}

impl SlidingWindowChunker {
    /// Create a new SlidingWindowChunker with the given configuration.
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    fn step_size(&self) -> usize {
        if self.config.overlap >= self.config.max_chunk_size {
            1 // Prevent infinite loop
        } else {
            self.config.max_chunk_size - self.config.overlap
        }
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() || self.config.max_chunk_size == 0 {
            return vec![];
        }

        // Byte offset of every char, plus the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;
        let step = self.step_size();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < char_count {
            let end = (start + self.config.max_chunk_size).min(char_count);
            let (start_byte, end_byte) = (bounds[start], bounds[end]);
            chunks.push(Chunk {
                text: text[start_byte..end_byte].to_string(),
                index: chunks.len(),
                start_offset: start_byte,
                end_offset: end_byte,
            });

            if end >= char_count {
                break;
            }
            start += step;
        }

        chunks
    }

    fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(max: usize, overlap: usize) -> SlidingWindowChunker {
        SlidingWindowChunker::new(ChunkerConfig {
            max_chunk_size: max,
            overlap,
        })
    }

    #[test]
    fn test_default_config_matches_defaults() {
        let config = ChunkerConfig::default();
        assert_eq!(config.max_chunk_size, 1050);
        assert_eq!(config.overlap, 50);
    }

    #[test]
    fn test_sliding_window_empty_text() {
        let chunker = SlidingWindowChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n ").is_empty());
    }

    #[test]
    fn test_sliding_window_short_text() {
        let chunker = SlidingWindowChunker::default();
        let chunks = chunker.chunk("Short text.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text.");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 11);
    }

    #[test]
    fn test_sliding_window_overlap() {
        let chunks = small(10, 3).chunk("0123456789abcdefghij");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "0123456789");
        assert_eq!(chunks[1].text, "789abcdefg");
        assert_eq!(chunks[2].text, "efghij");
        // Adjacent chunks share exactly `overlap` characters.
        assert!(chunks[0].text.ends_with("789"));
        assert!(chunks[1].text.starts_with("789"));
    }

    #[test]
    fn test_sliding_window_exact_fit_is_single_chunk() {
        let chunks = small(5, 1).chunk("abcde");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_sliding_window_indexes_are_sequential() {
        let text = "x".repeat(5000);
        let chunks = SlidingWindowChunker::default().chunk(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.text.chars().count() <= 1050);
        }
        assert_eq!(chunks.last().unwrap().end_offset, text.len());
    }

    #[test]
    fn test_sliding_window_counts_characters_not_bytes() {
        // Each char is 3 bytes in UTF-8.
        let text = "日本語のテキストです";
        let chunks = small(4, 1).chunk(text);
        assert_eq!(chunks[0].text, "日本語の");
        assert_eq!(chunks[1].text, "のテキス");
        for chunk in &chunks {
            assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.text);
        }
    }

    #[test]
    fn test_sliding_window_overlap_not_smaller_than_size() {
        let chunks = small(2, 5).chunk("abcd");
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["ab", "bc", "cd"]
        );
    }
}
