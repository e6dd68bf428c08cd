//! Semantic chunking: the core of the pipeline.
//!
//! A per-document stream of [`TextBlock`]s is folded into overlapping,
//! token-bounded [`Chunk`]s:
//!
//! ```text
//! TextBlocks ──► SemanticChunker ──► Chunks (+ per-document stats)
//!                    │
//!                    ├─ TokenCounter (cl100k_base sizing)
//!                    └─ ChunkerConfig (min/max tokens, overlap ratio)
//! ```
//!
//! See [`SemanticChunker`] for the algorithm's invariants.

pub mod chunker;
pub mod config;
pub mod tokenizer;
pub mod types;

pub use chunker::SemanticChunker;
pub use config::ChunkerConfig;
pub use tokenizer::TokenCounter;
pub use types::{
    Chunk, ChunkMetadata, ChunkingError, ChunkingOutcome, ContentType, DocumentStats, TextBlock,
};
