//! Semantic chunking and retrieval-augmented question answering for PDF
//! document collections.
//!
//! ```text
//! PDFs ──► ingestion::pdf ──► raw records ──► ingestion::loader ──► TextBlocks
//!
//! TextBlocks ──► chunking::SemanticChunker ──► Chunks ──► ingestion::writer
//!                                   │
//!                                   └─ TokenCounter / ChunkerConfig
//!
//! Chunks ──► indexing (embeddings) ──► stores::SqliteVectorStore
//!
//! Stored vectors ──► pipeline::Retriever ──► pipeline::AnswerPipeline
//!                                                │
//!                                                └─ generation (draft + cite)
//!
//! Query surfaces: CLI (`docsmith ask`) and MCP stdio server (`docsmith serve`).
//! ```
//!
//! The core is [`chunking::SemanticChunker`]; extraction, embeddings, the
//! vector database, and generation are external collaborators behind the
//! trait seams in [`embeddings`], [`stores`], and [`generation`].

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod indexing;
pub mod ingestion;
pub mod mcp;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use chunking::{Chunk, ChunkerConfig, SemanticChunker, TextBlock, TokenCounter};
pub use config::PipelineConfig;
pub use pipeline::{Answer, AnswerPipeline, Retriever};
pub use types::PipelineError;
