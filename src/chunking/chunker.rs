//! The semantic chunker: groups ordered text blocks into overlapping,
//! token-bounded chunks while preserving reading order and page
//! provenance.
//!
//! Documents are fully independent: blocks are grouped by `source_file`
//! before chunking, state is reset between documents, and no chunk ever
//! mixes sources. Within a document the algorithm is strictly sequential —
//! each chunk's overlap carry-over depends on the previous flush — so
//! parallelism is applied across documents only.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::debug;

use super::config::ChunkerConfig;
use super::tokenizer::TokenCounter;
use super::types::{
    Chunk, ChunkMetadata, ChunkingError, ChunkingOutcome, ContentType, DocumentStats, TextBlock,
};

/// Per-document accumulation state: the in-progress chunk.
///
/// `buffer` holds the pending block texts in reading order; `pages` the
/// pages contributed by blocks currently in the buffer. After a flush the
/// buffer is rebuilt as the overlap carry-over and the page set is cleared —
/// carried-over text does not re-attach its pages.
#[derive(Debug, Default)]
struct ChunkingState {
    buffer: Vec<String>,
    pages: BTreeSet<u32>,
}

/// Splits per-document block sequences into token-bounded chunks.
///
/// Thresholds are validated at construction; the chunking loop itself has
/// no failure modes. The counter is shared, so chunk sizing and any
/// downstream token accounting agree on one vocabulary.
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    counter: TokenCounter,
    config: ChunkerConfig,
}

impl SemanticChunker {
    /// Builds a chunker, failing fast on inconsistent thresholds.
    pub fn new(counter: TokenCounter, config: ChunkerConfig) -> Result<Self, ChunkingError> {
        let config = config.validated()?;
        Ok(Self { counter, config })
    }

    /// Builds a chunker with the default thresholds and a fresh counter.
    pub fn with_defaults() -> Result<Self, ChunkingError> {
        Self::new(TokenCounter::new()?, ChunkerConfig::default())
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Chunks a batch of blocks spanning any number of documents.
    ///
    /// Blocks are grouped by `source_file` in first-seen order; each group
    /// is chunked independently (in parallel), and the emitted chunks keep
    /// document order, then emission order.
    pub fn chunk_blocks(&self, blocks: &[TextBlock]) -> ChunkingOutcome {
        let mut groups: Vec<(&str, Vec<&TextBlock>)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();
        for block in blocks {
            let key = block.source_file.as_str();
            let slot = *slots.entry(key).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(block);
        }

        let per_document: Vec<(String, usize, Vec<Chunk>)> = groups
            .par_iter()
            .map(|(source_file, doc_blocks)| {
                let chunks = self.chunk_document(source_file, doc_blocks.iter().copied());
                (source_file.to_string(), doc_blocks.len(), chunks)
            })
            .collect();

        let mut chunks = Vec::new();
        let mut documents = Vec::new();
        for (source_file, block_count, doc_chunks) in per_document {
            debug!(
                source_file = %source_file,
                blocks = block_count,
                chunks = doc_chunks.len(),
                "chunked document"
            );
            documents.push(DocumentStats {
                source_file,
                block_count,
                chunk_count: doc_chunks.len(),
            });
            chunks.extend(doc_chunks);
        }

        ChunkingOutcome { chunks, documents }
    }

    /// Chunks the ordered blocks of a single document.
    ///
    /// The blocks must all belong to `source_file`; grouping happens in
    /// [`chunk_blocks`](Self::chunk_blocks), not here.
    pub fn chunk_document<'a, I>(&self, source_file: &str, blocks: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = &'a TextBlock>,
    {
        let mut out = Vec::new();
        let mut state = ChunkingState::default();

        for block in blocks {
            // Oversized block guard: too large for any buffer, split it
            // internally. The buffered context is flushed first so it is
            // not lost behind the split.
            if self.counter.count(&block.text) > self.config.max_tokens {
                self.flush(&mut state, source_file, true, &mut out);
                self.split_oversized(block, source_file, &mut out);
                continue;
            }

            state.buffer.push(block.text.clone());
            if let Some(page) = block.page {
                state.pages.insert(page);
            }

            // Soft limit is checked after the append.
            if self.counter.count(&state.buffer.join("\n")) >= self.config.max_tokens {
                self.flush(&mut state, source_file, false, &mut out);
            }
        }

        // Trailing remainder is genuinely final content for this document.
        self.flush(&mut state, source_file, true, &mut out);
        out
    }

    /// Emits the pending buffer as a chunk and rebuilds it as the overlap
    /// carry-over.
    ///
    /// A non-forced flush below `min_tokens` keeps accumulating instead —
    /// the only case a non-empty buffer survives a flush untouched.
    fn flush(&self, state: &mut ChunkingState, source_file: &str, force: bool, out: &mut Vec<Chunk>) {
        if state.buffer.is_empty() {
            return;
        }

        let mut combined = state.buffer.join("\n").trim().to_string();
        let mut tokens = self.counter.count(&combined);

        if !force && tokens < self.config.min_tokens {
            return;
        }

        // A single append can overshoot the soft limit by more than one
        // block's worth of tokens; trim from the end, never the start.
        while tokens > self.config.max_tokens && state.buffer.len() > 1 {
            state.buffer.pop();
            combined = state.buffer.join("\n").trim().to_string();
            tokens = self.counter.count(&combined);
        }

        out.push(Chunk {
            content: combined,
            content_type: ContentType::Text,
            token_count: tokens,
            metadata: ChunkMetadata {
                source_file: source_file.to_string(),
                pages: state.pages.iter().copied().collect(),
            },
        });

        // Carry whole trailing entries into the next chunk while they fit
        // the overlap budget. Pages are not re-attached to carried text.
        let overlap_tokens = self.config.overlap_tokens();
        let mut carried: Vec<String> = Vec::new();
        let mut running = 0usize;
        for part in state.buffer.iter().rev() {
            let part_tokens = self.counter.count(part);
            if running + part_tokens > overlap_tokens {
                break;
            }
            carried.push(part.clone());
            running += part_tokens;
        }
        carried.reverse();

        state.buffer = carried;
        state.pages.clear();
    }

    /// Word-level internal split for a block that alone exceeds
    /// `max_tokens`.
    ///
    /// Words accumulate greedily until the sub-chunk reaches `max_tokens`
    /// (so a sub-chunk may overshoot by at most one word), then the
    /// trailing `overlap_ratio` fraction of its words seeds the next
    /// sub-chunk. A trailing remainder holding words not already covered
    /// by the carry is emitted as the final sub-chunk.
    fn split_oversized(&self, block: &TextBlock, source_file: &str, out: &mut Vec<Chunk>) {
        let pages: Vec<u32> = block.page.into_iter().collect();
        let mut piece: Vec<&str> = Vec::new();
        let mut carried_words = 0usize;

        for word in block.text.split_whitespace() {
            piece.push(word);
            let joined = piece.join(" ");
            let tokens = self.counter.count(&joined);
            if tokens >= self.config.max_tokens {
                out.push(Chunk {
                    content: joined,
                    content_type: ContentType::Text,
                    token_count: tokens,
                    metadata: ChunkMetadata {
                        source_file: source_file.to_string(),
                        pages: pages.clone(),
                    },
                });
                let keep = (piece.len() as f64 * self.config.overlap_ratio).floor() as usize;
                piece = piece[piece.len() - keep..].to_vec();
                carried_words = piece.len();
            }
        }

        if piece.len() > carried_words {
            let joined = piece.join(" ");
            let tokens = self.counter.count(&joined);
            out.push(Chunk {
                content: joined,
                content_type: ContentType::Text,
                token_count: tokens,
                metadata: ChunkMetadata {
                    source_file: source_file.to_string(),
                    pages,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(min_tokens: usize, max_tokens: usize, overlap_ratio: f64) -> SemanticChunker {
        SemanticChunker::new(
            TokenCounter::new().unwrap(),
            ChunkerConfig {
                min_tokens,
                max_tokens,
                overlap_ratio,
            },
        )
        .unwrap()
    }

    fn block(text: &str, page: Option<u32>, source: &str) -> TextBlock {
        TextBlock::new(text, page, source)
    }

    /// A run of `n` single-word repetitions; token count scales with `n`.
    fn run(word: &str, n: usize) -> String {
        vec![word; n].join(" ")
    }

    #[test]
    fn empty_input_yields_zero_chunks() {
        let chunker = chunker(4, 10, 0.25);
        let outcome = chunker.chunk_blocks(&[]);
        assert!(outcome.is_empty());
        assert!(outcome.documents.is_empty());
    }

    #[test]
    fn single_small_block_is_force_flushed_below_min() {
        let chunker = chunker(400, 500, 0.25);
        let blocks = vec![block("just a handful of tokens", Some(1), "doc.pdf")];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].token_count < 400);
        assert_eq!(chunks[0].content, "just a handful of tokens");
        assert_eq!(chunks[0].pages(), &[1]);
    }

    #[test]
    fn soft_limit_is_checked_after_append() {
        let counter = TokenCounter::new().unwrap();
        let b1 = run("alpha", 30);
        let b2 = run("beta", 30);
        let b3 = "tail content";
        let joined = format!("{b1}\n{b2}");
        // Thresholds derived from measured counts: the second append is
        // exactly what pushes the buffer to the soft limit.
        let max = counter.count(&joined);
        assert!(counter.count(&b1) < max);
        let chunker = chunker(1, max, 0.01);

        let blocks = vec![
            block(&b1, Some(1), "doc.pdf"),
            block(&b2, Some(2), "doc.pdf"),
            block(b3, Some(3), "doc.pdf"),
        ];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);

        // Flush fired right after the second append, before the third
        // block was seen.
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, joined);
        assert_eq!(chunks[0].pages(), &[1, 2]);
        assert_eq!(chunks[1].content, b3);
        assert_eq!(chunks[1].pages(), &[3]);
    }

    #[test]
    fn overshoot_is_trimmed_from_the_end() {
        let counter = TokenCounter::new().unwrap();
        let b1 = run("alpha", 45);
        let b2 = run("beta", 8);
        let joined = format!("{b1}\n{b2}");
        let c1 = counter.count(&b1);
        let cj = counter.count(&joined);
        // Appending b2 crosses the limit by more than zero, so the flush
        // trims it back off.
        let max = cj - 1;
        assert!(c1 <= max);
        let chunker = chunker(1, max, 0.1);

        let blocks = vec![block(&b1, Some(1), "doc.pdf"), block(&b2, Some(2), "doc.pdf")];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, b1);
        assert_eq!(chunks[0].token_count, c1);
        // The page set was collected before the trim: the dropped block's
        // page is still reported.
        assert_eq!(chunks[0].pages(), &[1, 2]);
    }

    #[test]
    fn overlap_carry_prefixes_the_next_chunk() {
        let counter = TokenCounter::new().unwrap();
        let b1 = run("alpha", 40);
        let b2 = run("beta", 10);
        let b3 = "closing remarks";
        let joined = format!("{b1}\n{b2}");
        let max = counter.count(&joined);
        let c2 = counter.count(&b2);
        // Overlap budget admits b2 but not b1.
        let ratio = (c2 + 1) as f64 / max as f64;
        assert!(ratio < 1.0);
        let chunker = chunker(1, max, ratio);

        let blocks = vec![
            block(&b1, Some(1), "doc.pdf"),
            block(&b2, Some(2), "doc.pdf"),
            block(b3, Some(3), "doc.pdf"),
        ];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);

        assert_eq!(chunks.len(), 2);
        // Chunk 2 opens with the carried-over entry, a suffix of chunk 1.
        assert_eq!(chunks[1].content, format!("{b2}\n{b3}"));
        assert!(chunks[0].content.ends_with(&b2));
    }

    #[test]
    fn carried_text_does_not_reattach_pages() {
        let counter = TokenCounter::new().unwrap();
        let b1 = run("alpha", 40);
        let b2 = run("beta", 10);
        let b3 = "closing remarks";
        let joined = format!("{b1}\n{b2}");
        let max = counter.count(&joined);
        let c2 = counter.count(&b2);
        let ratio = (c2 + 1) as f64 / max as f64;
        let chunker = chunker(1, max, ratio);

        let blocks = vec![
            block(&b1, Some(1), "doc.pdf"),
            block(&b2, Some(2), "doc.pdf"),
            block(b3, Some(9), "doc.pdf"),
        ];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);

        // The second chunk contains carried text from page 2, but only the
        // freshly appended block's page is reported.
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].pages(), &[1, 2]);
        assert_eq!(chunks[1].pages(), &[9]);
    }

    #[test]
    fn oversized_block_splits_into_overlapping_sub_chunks() {
        let chunker = chunker(400, 500, 0.25);
        let text = run("word", 1200);
        let blocks = vec![block(&text, Some(7), "doc.pdf")];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);

        assert!(chunks.len() >= 3, "expected >= 3 sub-chunks, got {}", chunks.len());
        for chunk in &chunks {
            // Word-granularity overshoot only: within one word of the cap.
            assert!(chunk.token_count <= 500 + 2, "sub-chunk too large: {}", chunk.token_count);
            assert_eq!(chunk.pages(), &[7]);
        }

        // Each sub-chunk after the first opens with the trailing
        // overlap_ratio fraction of its predecessor's words.
        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].content.split_whitespace().collect();
            let next: Vec<&str> = pair[1].content.split_whitespace().collect();
            let keep = (prev.len() as f64 * 0.25).floor() as usize;
            assert!(keep > 0);
            assert_eq!(&prev[prev.len() - keep..], &next[..keep]);
        }
    }

    #[test]
    fn oversized_split_preserves_every_word() {
        let chunker = chunker(400, 500, 0.25);
        let text = run("word", 1200);
        let total_words = 1200usize;
        let blocks = vec![block(&text, None, "doc.pdf")];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);

        // Fresh (non-carry) words across sub-chunks cover the block.
        let mut covered = 0usize;
        let mut prev_words: Option<Vec<String>> = None;
        for chunk in &chunks {
            let words: Vec<String> = chunk
                .content
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let carry = prev_words
                .as_ref()
                .map(|prev| (prev.len() as f64 * 0.25).floor() as usize)
                .unwrap_or(0);
            covered += words.len() - carry;
            prev_words = Some(words);
        }
        assert_eq!(covered, total_words);
    }

    #[test]
    fn oversized_block_flushes_pending_buffer_first() {
        let chunker = chunker(400, 500, 0.25);
        let small = "a short opening paragraph";
        let huge = run("word", 700);
        let blocks = vec![
            block(small, Some(1), "doc.pdf"),
            block(&huge, Some(2), "doc.pdf"),
        ];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);

        // The buffered context is emitted (even under min_tokens) before
        // any sub-chunk of the oversized block.
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].content, small);
        assert!(chunks[0].token_count < 400);
        assert!(chunks[1].content.starts_with("word"));
    }

    #[test]
    fn documents_never_mix() {
        let chunker = chunker(4, 32, 0.25);
        let blocks = vec![
            block("first document opening paragraph", Some(1), "a.pdf"),
            block("second document opening paragraph", Some(1), "b.pdf"),
            block("first document closing paragraph", Some(2), "a.pdf"),
            block("second document closing paragraph", Some(2), "b.pdf"),
        ];
        let outcome = chunker.chunk_blocks(&blocks);

        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.documents[0].source_file, "a.pdf");
        assert_eq!(outcome.documents[0].block_count, 2);
        assert_eq!(outcome.documents[1].source_file, "b.pdf");

        for chunk in &outcome.chunks {
            let from_a = chunk.content.contains("first document");
            let from_b = chunk.content.contains("second document");
            assert!(from_a != from_b, "chunk mixes documents: {}", chunk.content);
        }

        // First-seen document order is preserved in the output.
        let first_b = outcome
            .chunks
            .iter()
            .position(|c| c.source_file() == "b.pdf")
            .unwrap();
        assert!(outcome.chunks[..first_b]
            .iter()
            .all(|c| c.source_file() == "a.pdf"));
    }

    #[test]
    fn chunking_is_idempotent() {
        let chunker = chunker(4, 40, 0.3);
        let blocks: Vec<TextBlock> = (0..12)
            .map(|i| {
                block(
                    &format!("paragraph number {i} with a little body text"),
                    Some(i / 3 + 1),
                    "doc.pdf",
                )
            })
            .collect();
        let first = chunker.chunk_blocks(&blocks);
        let second = chunker.chunk_blocks(&blocks);
        assert_eq!(first, second);
    }

    #[test]
    fn pages_are_sorted_and_deduplicated() {
        let chunker = chunker(2, 500, 0.25);
        let blocks = vec![
            block("text from a later page", Some(3), "doc.pdf"),
            block("text from an early page", Some(1), "doc.pdf"),
            block("more from the later page", Some(3), "doc.pdf"),
        ];
        let chunks = chunker.chunk_document("doc.pdf", &blocks);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].pages(), &[1, 3]);
    }

    #[test]
    fn invalid_config_fails_before_processing() {
        let result = SemanticChunker::new(
            TokenCounter::new().unwrap(),
            ChunkerConfig {
                min_tokens: 10,
                max_tokens: 10,
                overlap_ratio: 0.25,
            },
        );
        assert!(matches!(result, Err(ChunkingError::Config(_))));
    }
}
