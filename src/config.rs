//! Environment-driven configuration for the pipeline binary.
//!
//! Every knob has a default so a fresh checkout runs offline (mock
//! embeddings, no generation endpoint); real deployments point the
//! endpoint variables at their services via the environment or a `.env`
//! file.

use std::path::PathBuf;
use std::sync::Arc;

use crate::chunking::ChunkerConfig;
use crate::embeddings::{
    CachedEmbeddingProvider, EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider,
};
use crate::generation::{CompletionProvider, OpenAiCompatProvider};
use crate::types::PipelineError;

/// Resolved configuration for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory of source PDFs.
    pub pdf_dir: PathBuf,
    /// Directory of raw extraction records (`output_*.json`).
    pub raw_dir: PathBuf,
    /// Persisted chunk sequence.
    pub chunks_file: PathBuf,
    /// SQLite vector store.
    pub db_path: PathBuf,
    /// Chunks retrieved per question.
    pub top_k: usize,
    pub chunker: ChunkerConfig,
    /// OpenAI-compatible embeddings endpoint; mock vectors when unset.
    pub embedding_url: Option<String>,
    pub embedding_model: String,
    /// OpenAI-compatible chat-completions endpoint; required for `ask`.
    pub generation_url: Option<String>,
    pub generation_model: String,
    pub api_key: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pdf_dir: PathBuf::from("data/pdfs"),
            raw_dir: PathBuf::from("data/raw_json"),
            chunks_file: PathBuf::from("data/semantic_chunks.json"),
            db_path: PathBuf::from("data/chunks.sqlite"),
            top_k: 4,
            chunker: ChunkerConfig::default(),
            embedding_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
            generation_url: None,
            generation_model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

impl PipelineConfig {
    /// Reads configuration from the environment (and `.env`, if present),
    /// falling back to the defaults above.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            pdf_dir: env_string("DOCSMITH_PDF_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.pdf_dir),
            raw_dir: env_string("DOCSMITH_RAW_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.raw_dir),
            chunks_file: env_string("DOCSMITH_CHUNKS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.chunks_file),
            db_path: env_string("DOCSMITH_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            top_k: env_parse("DOCSMITH_TOP_K").unwrap_or(defaults.top_k),
            chunker: ChunkerConfig {
                min_tokens: env_parse("DOCSMITH_MIN_TOKENS").unwrap_or(defaults.chunker.min_tokens),
                max_tokens: env_parse("DOCSMITH_MAX_TOKENS").unwrap_or(defaults.chunker.max_tokens),
                overlap_ratio: env_parse("DOCSMITH_OVERLAP_RATIO")
                    .unwrap_or(defaults.chunker.overlap_ratio),
            },
            embedding_url: env_string("DOCSMITH_EMBEDDING_URL"),
            embedding_model: env_string("DOCSMITH_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            generation_url: env_string("DOCSMITH_GENERATION_URL"),
            generation_model: env_string("DOCSMITH_GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            api_key: env_string("DOCSMITH_API_KEY"),
        }
    }

    /// Constructs the embedding provider: the configured HTTP endpoint
    /// behind a cache, or deterministic mock vectors when none is set.
    pub fn embedding_provider(&self) -> Arc<dyn EmbeddingProvider> {
        match &self.embedding_url {
            Some(url) => Arc::new(CachedEmbeddingProvider::new(Arc::new(
                HttpEmbeddingProvider::new(url, &self.embedding_model, self.api_key.clone()),
            ))),
            None => {
                tracing::warn!(
                    "no embedding endpoint configured; using deterministic mock vectors"
                );
                Arc::new(MockEmbeddingProvider::new())
            }
        }
    }

    /// Constructs the completion provider. Unlike embeddings there is no
    /// offline fallback worth having, so an unset endpoint is an error.
    pub fn completion_provider(&self) -> Result<Arc<dyn CompletionProvider>, PipelineError> {
        let url = self.generation_url.as_ref().ok_or_else(|| {
            PipelineError::Generation(
                "no generation endpoint configured (set DOCSMITH_GENERATION_URL)".to_string(),
            )
        })?;
        Ok(Arc::new(OpenAiCompatProvider::new(
            url,
            &self.generation_model,
            self.api_key.clone(),
        )))
    }
}
