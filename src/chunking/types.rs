//! Data model for the chunking stage: input blocks, emitted chunks, and
//! batch-level outcome reporting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by chunker construction and configuration validation.
///
/// Both variants are fatal and fire before any document is processed; the
/// chunking loop itself has no recoverable failure modes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// The chunker thresholds are inconsistent or out of range.
    #[error("invalid chunking configuration: {0}")]
    Config(String),

    /// The token vocabulary could not be loaded.
    #[error("tokenizer initialization failed: {0}")]
    Tokenizer(String),
}

/// One atomic unit of extracted document text.
///
/// Blocks are produced by the ingestion loader in reading order and consumed
/// exactly once by the chunker. Blocks from different source files are never
/// combined into one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Trimmed, non-empty text content.
    pub text: String,
    /// 1-based page of origin, when the extractor attributed one.
    pub page: Option<u32>,
    /// Identifier of the originating document. Never empty; the loader
    /// falls back to a filename-derived value.
    pub source_file: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, page: Option<u32>, source_file: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page,
            source_file: source_file.into(),
        }
    }
}

/// Kind of content a chunk carries. Only text today; tables and figures
/// would extend this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
}

/// Provenance metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document the chunk was cut from.
    pub source_file: String,
    /// Sorted, deduplicated pages touched by the chunk's constituent
    /// blocks. Empty when no block carried a page number.
    pub pages: Vec<u32>,
}

/// The unit of retrieval granularity.
///
/// Immutable once emitted. The serialized field layout (`content`,
/// `content_type`, `token_count`, `metadata.source_file`, `metadata.pages`)
/// is the persistence contract consumed by the indexing stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Newline-joined, trimmed concatenation of the constituent block texts.
    pub content: String,
    pub content_type: ContentType,
    /// Token length of `content` under the pipeline's token counter.
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Source document the chunk was cut from.
    pub fn source_file(&self) -> &str {
        &self.metadata.source_file
    }

    /// Pages touched by the chunk's constituent blocks.
    pub fn pages(&self) -> &[u32] {
        &self.metadata.pages
    }
}

/// Per-document summary produced by a batch chunking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub source_file: String,
    /// Number of blocks consumed from this document.
    pub block_count: usize,
    /// Number of chunks emitted for this document.
    pub chunk_count: usize,
}

/// Result of chunking a batch of blocks spanning one or more documents.
///
/// Chunks are ordered by document (first-seen order) and, within a
/// document, by emission order. `documents` carries the per-document
/// counts surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingOutcome {
    pub chunks: Vec<Chunk>,
    pub documents: Vec<DocumentStats>,
}

impl ChunkingOutcome {
    /// Total number of chunks across all documents.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` when no document produced any chunk.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
