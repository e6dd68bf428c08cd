//! Embedding providers: the seam between the pipeline and whatever model
//! turns text into vectors.
//!
//! The pipeline only ever talks to [`EmbeddingProvider`]. Implementations
//! cover deterministic mock vectors (tests, offline runs), any
//! OpenAI-compatible HTTP endpoint, rig-core embedding models, and a
//! caching wrapper that spares repeated calls for identical text.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rig::embeddings::embedding::EmbeddingModel;
use serde::Deserialize;
use tracing::debug;

use crate::types::PipelineError;

/// Maps text to fixed-length vectors.
///
/// Failures are [`PipelineError::Embedding`] and propagate unrecovered;
/// the pipeline defines no retry policy.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier used in logs and reports.
    fn id(&self) -> &str;

    /// Embeds a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embeds a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::Embedding("provider returned no embedding".to_string()))
    }
}

/// Deterministic hash-derived vectors for tests and offline runs.
///
/// Identical text always maps to the identical vector; distinct texts map
/// to distinct vectors with overwhelming probability. Not semantically
/// meaningful — retrieval over mock vectors is only exact-duplicate
/// matching.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 8 }
    }

    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vec(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..self.dimensions)
            .map(|i| {
                let bits = seed.rotate_left((i * 8) as u32) ^ ((i as u64) << 24);
                (bits as f32) / u32::MAX as f32
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|text| self.hash_to_vec(text)).collect())
    }
}

/// Adapter exposing any rig-core [`EmbeddingModel`] as an
/// [`EmbeddingProvider`].
pub struct RigEmbeddingProvider<M> {
    model: M,
    id: String,
}

impl<M> RigEmbeddingProvider<M>
where
    M: EmbeddingModel,
{
    pub fn new(model: M, id: impl Into<String>) -> Self {
        Self {
            model,
            id: id.into(),
        }
    }
}

#[async_trait]
impl<M> EmbeddingProvider for RigEmbeddingProvider<M>
where
    M: EmbeddingModel + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let embeddings = self
            .model
            .embed_texts(texts.iter().cloned())
            .await
            .map_err(|err| PipelineError::Embedding(err.to_string()))?;
        Ok(embeddings
            .into_iter()
            .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }
}

/// OpenAI-compatible `/embeddings` endpoint client.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn id(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: EmbeddingResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.data.len() != texts.len() {
            return Err(PipelineError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut vectors: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        for datum in response.data {
            if datum.index >= vectors.len() {
                return Err(PipelineError::Embedding(format!(
                    "embedding index {} out of range",
                    datum.index
                )));
            }
            vectors[datum.index] = datum.embedding;
        }
        Ok(vectors)
    }
}

/// Cache hit/miss counters for a [`CachedEmbeddingProvider`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// In-memory caching wrapper around another provider.
///
/// Overlapping chunks re-embed identical carry-over text; the cache turns
/// those repeats into lookups.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<HashMap<String, Vec<f32>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut missing: Vec<(usize, String)> = Vec::new();

        {
            let cache = self.cache.lock();
            for (index, text) in texts.iter().enumerate() {
                if let Some(vector) = cache.get(text) {
                    vectors[index] = Some(vector.clone());
                } else {
                    missing.push((index, text.clone()));
                }
            }
        }
        self.hits
            .fetch_add(texts.len() - missing.len(), Ordering::Relaxed);
        self.misses.fetch_add(missing.len(), Ordering::Relaxed);

        if !missing.is_empty() {
            let inputs: Vec<String> = missing.iter().map(|(_, text)| text.clone()).collect();
            let fresh = self.inner.embed_batch(&inputs).await?;
            if fresh.len() != inputs.len() {
                return Err(PipelineError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    fresh.len()
                )));
            }
            let mut cache = self.cache.lock();
            for ((index, text), vector) in missing.into_iter().zip(fresh) {
                cache.insert(text, vector.clone());
                vectors[index] = Some(vector);
            }
            debug!(cached = cache.len(), "embedding cache updated");
        }

        Ok(vectors.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig::embeddings::embedding::{Embedding, EmbeddingError};

    #[derive(Clone)]
    struct LengthEmbeddingModel;

    impl EmbeddingModel for LengthEmbeddingModel {
        const MAX_DOCUMENTS: usize = 16;

        type Client = ();

        fn make(_client: &Self::Client, _model: impl Into<String>, _dims: Option<usize>) -> Self {
            LengthEmbeddingModel
        }

        fn ndims(&self) -> usize {
            2
        }

        fn embed_texts(
            &self,
            texts: impl IntoIterator<Item = String> + Send,
        ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send
        {
            let docs: Vec<String> = texts.into_iter().collect();
            async move {
                Ok(docs
                    .into_iter()
                    .map(|document| Embedding {
                        vec: vec![document.len() as f64, 1.0],
                        document,
                    })
                    .collect())
            }
        }
    }

    #[tokio::test]
    async fn rig_adapter_preserves_order_and_narrows_to_f32() {
        let provider = RigEmbeddingProvider::new(LengthEmbeddingModel, "length-model");
        assert_eq!(provider.id(), "length-model");

        let vectors = provider
            .embed_batch(&["ab".to_string(), "abcd".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![2.0, 1.0], vec![4.0, 1.0]]);
    }

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2], "identical text, identical embedding");
        assert_ne!(first[0], first[1], "distinct text, distinct embedding");
    }

    #[tokio::test]
    async fn embed_one_matches_batch() {
        let provider = MockEmbeddingProvider::new();
        let single = provider.embed_one("sample text").await.unwrap();
        let batch = provider
            .embed_batch(&["sample text".to_string()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
    }

    #[tokio::test]
    async fn cache_counts_hits_and_misses() {
        let inner: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new());
        let cached = CachedEmbeddingProvider::new(inner);

        let inputs = vec!["alpha".to_string(), "beta".to_string()];
        cached.embed_batch(&inputs).await.unwrap();
        assert_eq!(cached.stats(), CacheStats { hits: 0, misses: 2 });

        cached.embed_batch(&inputs).await.unwrap();
        assert_eq!(cached.stats(), CacheStats { hits: 2, misses: 2 });

        let mixed = vec!["alpha".to_string(), "gamma".to_string()];
        let vectors = cached.embed_batch(&mixed).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(cached.stats(), CacheStats { hits: 3, misses: 3 });
    }

    #[tokio::test]
    async fn http_provider_round_trips_openai_shape() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({
                    "data": [
                        { "index": 1, "embedding": [0.5, 0.6] },
                        { "index": 0, "embedding": [0.1, 0.2] }
                    ],
                    "model": "test-embedder"
                }));
            })
            .await;

        let provider =
            HttpEmbeddingProvider::new(server.base_url(), "test-embedder", None);
        let vectors = provider
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        // Out-of-order response data is reassembled by index.
        assert_eq!(vectors[0], vec![0.1, 0.2]);
        assert_eq!(vectors[1], vec![0.5, 0.6]);
    }

    #[tokio::test]
    async fn http_provider_surfaces_count_mismatch() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({
                    "data": [{ "index": 0, "embedding": [0.1] }]
                }));
            })
            .await;

        let provider = HttpEmbeddingProvider::new(server.base_url(), "test-embedder", None);
        let result = provider
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await;
        assert!(matches!(result, Err(PipelineError::Embedding(_))));
    }
}
