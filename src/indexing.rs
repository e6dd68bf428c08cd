//! Embeds chunk content and upserts the records into the vector store.

use tracing::info;
use uuid::Uuid;

use crate::chunking::Chunk;
use crate::embeddings::EmbeddingProvider;
use crate::stores::{StoredChunk, VectorBackend};
use crate::types::PipelineError;

/// Number of chunk texts sent to the embedding provider per request.
const EMBED_BATCH_SIZE: usize = 64;

/// Per-source chunk count in an [`IndexReport`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceCount {
    pub source_file: String,
    pub chunks: usize,
}

/// Summary of an indexing run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IndexReport {
    pub embedder: String,
    pub total_chunks: usize,
    pub per_source: Vec<SourceCount>,
}

/// Embeds `chunks` in batches and upserts them with fresh UUID ids.
///
/// Chunk order is preserved in the stored `chunk_index`. Embedding or
/// storage failures propagate unrecovered; chunks upserted by earlier
/// batches remain in the store.
pub async fn index_chunks(
    provider: &dyn EmbeddingProvider,
    store: &dyn VectorBackend,
    chunks: &[Chunk],
) -> Result<IndexReport, PipelineError> {
    let mut per_source: Vec<SourceCount> = Vec::new();

    for (offset, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(PipelineError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let mut rows = Vec::with_capacity(batch.len());
        for (position, (chunk, vector)) in batch.iter().zip(vectors).enumerate() {
            let chunk_index = offset * EMBED_BATCH_SIZE + position;
            let stored = StoredChunk::from_chunk(chunk, Uuid::new_v4().to_string(), chunk_index);
            match per_source
                .iter_mut()
                .find(|count| count.source_file == stored.source_file)
            {
                Some(count) => count.chunks += 1,
                None => per_source.push(SourceCount {
                    source_file: stored.source_file.clone(),
                    chunks: 1,
                }),
            }
            rows.push((stored, vector));
        }
        store.upsert_chunks(rows).await?;
    }

    let report = IndexReport {
        embedder: provider.id().to_string(),
        total_chunks: chunks.len(),
        per_source,
    };
    info!(
        embedder = %report.embedder,
        chunks = report.total_chunks,
        sources = report.per_source.len(),
        "indexed chunks"
    );
    Ok(report)
}
