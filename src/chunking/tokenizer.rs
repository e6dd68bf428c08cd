//! Token counting under a single fixed vocabulary.
//!
//! Every sizing decision in the pipeline — chunk thresholds, overlap
//! budgets, stored `token_count` fields — must agree on one tokenization
//! scheme; mixing schemes silently corrupts the chunk-size guarantees.
//! The counter pins `cl100k_base`, the encoding shared by the embedding
//! and generation models this pipeline targets.

use std::sync::Arc;

use tiktoken_rs::{CoreBPE, cl100k_base};

use super::types::ChunkingError;

/// Shared token counter over the `cl100k_base` vocabulary.
///
/// Construction loads the BPE ranks once and is the only fallible step;
/// counting itself has no failure modes. Clones share the underlying
/// encoder, so one counter can be handed to the chunker, the indexer, and
/// any budget accounting without re-loading the vocabulary.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    /// Loads the `cl100k_base` encoder.
    ///
    /// A failure here is a fatal configuration error, not a per-call one.
    pub fn new() -> Result<Self, ChunkingError> {
        let bpe = cl100k_base().map_err(|err| ChunkingError::Tokenizer(err.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Number of tokens in `text`. Empty input counts as 0.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &"cl100k_base")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_counts_zero() {
        let counter = TokenCounter::new().unwrap();
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn counting_is_deterministic() {
        let counter = TokenCounter::new().unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(counter.count(text), counter.count(text));
        assert!(counter.count(text) > 0);
    }

    #[test]
    fn clones_share_the_encoder() {
        let counter = TokenCounter::new().unwrap();
        let clone = counter.clone();
        assert_eq!(counter.count("shared vocabulary"), clone.count("shared vocabulary"));
    }

    #[test]
    fn longer_text_never_counts_fewer_tokens() {
        let counter = TokenCounter::new().unwrap();
        let short = "alpha beta";
        let long = "alpha beta gamma delta epsilon";
        assert!(counter.count(long) >= counter.count(short));
    }
}
