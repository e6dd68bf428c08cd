//! Durable persistence of the chunk sequence between the chunking and
//! embedding stages.

use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::chunking::Chunk;
use crate::types::PipelineError;

/// Writes the full ordered chunk sequence to `path` as a JSON array.
///
/// The payload lands in a sibling temp file first and is renamed over the
/// destination, so readers only ever observe the previous or the complete
/// new file.
pub async fn save_chunks(path: impl AsRef<Path>, chunks: &[Chunk]) -> Result<(), PipelineError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let serialized = serde_json::to_string_pretty(chunks)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serialized).await?;
    fs::rename(&tmp, path).await?;

    info!(chunks = chunks.len(), path = %path.display(), "saved chunks");
    Ok(())
}

/// Reads a chunk sequence previously written by [`save_chunks`].
pub async fn load_chunks(path: impl AsRef<Path>) -> Result<Vec<Chunk>, PipelineError> {
    let data = fs::read_to_string(path.as_ref()).await?;
    Ok(serde_json::from_str(&data)?)
}
