//! Vector storage for embedded chunks.
//!
//! The pipeline talks to storage through the [`VectorBackend`] trait:
//! upsert embedded chunk records, query nearest neighbors, count, and
//! delete by source. The shipped implementation is SQLite with the
//! `sqlite-vec` extension ([`sqlite::SqliteVectorStore`]); the trait keeps
//! the door open for other engines.
//!
//! Store metadata is scalar-only: page lists are flattened to a
//! comma-delimited string on write ([`encode_pages`]) and decoded on read
//! ([`decode_pages`]).

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunking::{Chunk, ContentType};
use crate::types::PipelineError;

pub use sqlite::SqliteVectorStore;

/// A chunk record as it lives in the vector store.
///
/// The `id` is assigned at index time; everything else is carried over
/// from the [`Chunk`] it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub source_file: String,
    pub pages: Vec<u32>,
    pub content: String,
    pub content_type: ContentType,
    pub token_count: usize,
    /// Zero-based position of this chunk in the indexed sequence.
    pub chunk_index: usize,
}

impl StoredChunk {
    /// Builds a store record from an emitted chunk.
    pub fn from_chunk(chunk: &Chunk, id: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            id: id.into(),
            source_file: chunk.metadata.source_file.clone(),
            pages: chunk.metadata.pages.clone(),
            content: chunk.content.clone(),
            content_type: chunk.content_type,
            token_count: chunk.token_count,
            chunk_index,
        }
    }
}

/// Flattens a page list into the scalar form stores accept.
pub fn encode_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes a page list previously flattened by [`encode_pages`].
pub fn decode_pages(raw: &str) -> Vec<u32> {
    raw.split(',')
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Unified contract for chunk vector stores.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Inserts or replaces chunk records with their embeddings.
    async fn upsert_chunks(
        &self,
        chunks: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<(), PipelineError>;

    /// Nearest-neighbor query. Returns up to `top_k` records ordered most
    /// similar first, with their similarity scores.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(StoredChunk, f32)>, PipelineError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, PipelineError>;

    /// Removes every chunk belonging to `source_file`; returns how many
    /// were deleted.
    async fn delete_by_source(&self, source_file: &str) -> Result<usize, PipelineError>;
}
