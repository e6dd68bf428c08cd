//! Similarity retrieval over the vector store.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::stores::VectorBackend;
use crate::types::PipelineError;

/// A chunk returned from retrieval, with its provenance and score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_file: String,
    pub pages: Vec<u32>,
    pub score: f32,
}

/// Embeds a question and fetches its nearest chunks from the store.
///
/// Both collaborators are injected handles; the retriever owns no model
/// or database state of its own.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorBackend>,
    embeddings: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorBackend>,
        embeddings: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embeddings,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieves the configured number of chunks for `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, PipelineError> {
        self.retrieve_top(question, self.top_k).await
    }

    /// Retrieves up to `top_k` chunks for `question`, most similar first.
    pub async fn retrieve_top(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, PipelineError> {
        let embedding = self.embeddings.embed_one(question).await?;
        let hits = self.store.query(&embedding, top_k).await?;
        debug!(hits = hits.len(), top_k, "retrieved chunks");
        Ok(hits
            .into_iter()
            .map(|(chunk, score)| RetrievedChunk {
                content: chunk.content,
                source_file: chunk.source_file,
                pages: chunk.pages,
                score,
            })
            .collect())
    }
}
