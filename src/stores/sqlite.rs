//! SQLite vector store backed by the `sqlite-vec` extension.
//!
//! Chunk rows live in a plain `chunks` table; their vectors live in
//! `chunk_embeddings` as JSON-encoded float arrays, which `sqlite-vec`
//! accepts directly in `vec_distance_cosine`. Similarity is reported as
//! `1 - cosine distance`, most similar first.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::{StoredChunk, VectorBackend, decode_pages, encode_pages};
use crate::chunking::ContentType;
use crate::types::PipelineError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    source_file TEXT NOT NULL,
    pages TEXT NOT NULL,
    content TEXT NOT NULL,
    content_type TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_source_file ON chunks(source_file);
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    id TEXT PRIMARY KEY,
    embedding TEXT NOT NULL
);
";

/// SQLite-backed [`VectorBackend`].
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
}

impl SqliteVectorStore {
    /// Opens (or creates) a store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?;
        Self::init(conn).await
    }

    /// Opens an in-memory store, mainly for tests.
    pub async fn open_in_memory() -> Result<Self, PipelineError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, PipelineError> {
        conn.call::<_, _, tokio_rusqlite::rusqlite::Error>(|conn| {
            // Probe the extension before touching the schema; a missing
            // extension should fail loudly here, not at query time.
            let probe = conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0));
            if let Err(err) = probe {
                return Err(err);
            }
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|err| PipelineError::Storage(err.to_string()))?;
        Ok(Self { conn })
    }

    fn register_sqlite_vec() -> Result<(), PipelineError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!("failed to register sqlite-vec extension (code {rc})"))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(PipelineError::Storage)
    }
}

#[async_trait]
impl VectorBackend for SqliteVectorStore {
    async fn upsert_chunks(
        &self,
        chunks: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<(), PipelineError> {
        if chunks.is_empty() {
            return Ok(());
        }

        // Serialize vectors up front so the closure only does SQL work.
        let mut rows = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks {
            let encoded = serde_json::to_string(&embedding)?;
            rows.push((chunk, encoded));
        }

        self.conn
            .call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
                let tx = conn
                    .transaction()?;
                for (chunk, embedding) in &rows {
                    tx.execute(
                        "INSERT OR REPLACE INTO chunks \
                         (id, source_file, pages, content, content_type, token_count, chunk_index) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        (
                            &chunk.id,
                            &chunk.source_file,
                            encode_pages(&chunk.pages),
                            &chunk.content,
                            "text",
                            chunk.token_count as i64,
                            chunk.chunk_index as i64,
                        ),
                    )?;
                    tx.execute(
                        "INSERT OR REPLACE INTO chunk_embeddings (id, embedding) VALUES (?1, ?2)",
                        (&chunk.id, embedding),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(StoredChunk, f32)>, PipelineError> {
        let embedding_json = serde_json::to_string(embedding)?;

        self.conn
            .call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT c.id, c.source_file, c.pages, c.content, c.token_count, \
                         c.chunk_index, \
                         vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                         FROM chunks c \
                         JOIN chunk_embeddings e ON c.id = e.id \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let chunk = StoredChunk {
                            id: row.get(0)?,
                            source_file: row.get(1)?,
                            pages: decode_pages(&row.get::<_, String>(2)?),
                            content: row.get(3)?,
                            content_type: ContentType::Text,
                            token_count: row.get::<_, i64>(4)? as usize,
                            chunk_index: row.get::<_, i64>(5)? as usize,
                        };
                        let distance: f32 = row.get(6)?;
                        Ok((chunk, 1.0 - distance))
                    })?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        self.conn
            .call::<_, _, tokio_rusqlite::rusqlite::Error>(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }

    async fn delete_by_source(&self, source_file: &str) -> Result<usize, PipelineError> {
        let source_file = source_file.to_string();
        self.conn
            .call::<_, _, tokio_rusqlite::rusqlite::Error>(move |conn| {
                conn.execute(
                    "DELETE FROM chunk_embeddings WHERE id IN \
                     (SELECT id FROM chunks WHERE source_file = ?1)",
                    [&source_file],
                )?;
                let deleted = conn
                    .execute("DELETE FROM chunks WHERE source_file = ?1", [&source_file])?;
                Ok(deleted)
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str, source: &str, pages: Vec<u32>, content: &str, index: usize) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            source_file: source.to_string(),
            pages,
            content: content.to_string(),
            content_type: ContentType::Text,
            token_count: content.split_whitespace().count(),
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn upsert_and_query_returns_most_similar_first() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        store
            .upsert_chunks(vec![
                (stored("a", "x.pdf", vec![1], "alpha text", 0), vec![1.0, 0.0, 0.0]),
                (stored("b", "x.pdf", vec![2], "beta text", 1), vec![0.0, 1.0, 0.0]),
                (stored("c", "y.pdf", vec![], "gamma text", 2), vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.query(&[0.0, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "b");
        assert!(results[0].1 > results[1].1, "results ordered by similarity");
        assert!((results[0].1 - 1.0).abs() < 1e-5);
        assert_eq!(results[0].0.pages, vec![2]);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_ids() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        store
            .upsert_chunks(vec![(
                stored("a", "x.pdf", vec![1], "first version", 0),
                vec![1.0, 0.0],
            )])
            .await
            .unwrap();
        store
            .upsert_chunks(vec![(
                stored("a", "x.pdf", vec![1, 2], "second version", 0),
                vec![0.0, 1.0],
            )])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.query(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].0.content, "second version");
        assert_eq!(results[0].0.pages, vec![1, 2]);
    }

    #[tokio::test]
    async fn delete_by_source_removes_only_that_document() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        store
            .upsert_chunks(vec![
                (stored("a", "x.pdf", vec![], "alpha", 0), vec![1.0, 0.0]),
                (stored("b", "x.pdf", vec![], "beta", 1), vec![0.0, 1.0]),
                (stored("c", "y.pdf", vec![], "gamma", 0), vec![0.5, 0.5]),
            ])
            .await
            .unwrap();

        let deleted = store.delete_by_source("x.pdf").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count().await.unwrap(), 1);

        let results = store.query(&[0.5, 0.5], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.source_file, "y.pdf");
    }

    #[tokio::test]
    async fn empty_store_queries_empty() {
        let store = SqliteVectorStore::open_in_memory().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        let results = store.query(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.sqlite");

        {
            let store = SqliteVectorStore::open(&path).await.unwrap();
            store
                .upsert_chunks(vec![(
                    stored("a", "x.pdf", vec![4], "persistent", 0),
                    vec![1.0, 0.0],
                )])
                .await
                .unwrap();
        }

        let store = SqliteVectorStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].0.content, "persistent");
    }
}
