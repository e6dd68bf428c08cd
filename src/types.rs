//! Crate-wide error types shared by the ingestion, storage, and answer
//! pipeline layers.

use thiserror::Error;

use crate::chunking::ChunkingError;

/// Errors surfaced by pipeline operations.
///
/// Chunking configuration problems keep their own taxonomy in
/// [`ChunkingError`] so they can fail fast before any document is touched;
/// everything that crosses an external boundary (filesystem, SQLite, HTTP
/// services) is folded into the variants below and propagated unrecovered.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Chunking failed (invalid thresholds or tokenizer setup).
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),

    /// A document or extraction record could not be interpreted.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Filesystem failure while reading or writing pipeline artifacts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vector store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding service failure.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// Generation service failure.
    #[error("generation request failed: {0}")]
    Generation(String),

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// MCP server failure.
    #[error("mcp server error: {0}")]
    Server(String),
}
