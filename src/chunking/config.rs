//! Chunker thresholds and their validation.

use serde::{Deserialize, Serialize};

use super::types::ChunkingError;

/// Token-window configuration for the semantic chunker.
///
/// Validated once, at chunker construction, so a bad configuration can
/// never surface mid-document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Minimum tokens a non-forced chunk must reach before it is emitted.
    pub min_tokens: usize,
    /// Soft upper bound on chunk size; also the emission threshold for the
    /// internal split of oversized blocks.
    pub max_tokens: usize,
    /// Fraction of `max_tokens` carried over between consecutive chunks of
    /// the same document. Must lie strictly between 0 and 1.
    pub overlap_ratio: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_tokens: 400,
            max_tokens: 500,
            overlap_ratio: 0.25,
        }
    }
}

impl ChunkerConfig {
    /// Checks the thresholds, returning the configuration unchanged when
    /// they are consistent.
    pub fn validated(self) -> Result<Self, ChunkingError> {
        if self.min_tokens == 0 {
            return Err(ChunkingError::Config(
                "min_tokens must be greater than zero".to_string(),
            ));
        }
        if self.max_tokens <= self.min_tokens {
            return Err(ChunkingError::Config(format!(
                "max_tokens ({}) must exceed min_tokens ({})",
                self.max_tokens, self.min_tokens
            )));
        }
        if !(self.overlap_ratio > 0.0 && self.overlap_ratio < 1.0) {
            return Err(ChunkingError::Config(format!(
                "overlap_ratio ({}) must lie strictly between 0 and 1",
                self.overlap_ratio
            )));
        }
        Ok(self)
    }

    /// Token budget carried between consecutive chunks:
    /// `floor(max_tokens * overlap_ratio)`.
    pub fn overlap_tokens(&self) -> usize {
        (self.max_tokens as f64 * self.overlap_ratio).floor() as usize
    }
}
