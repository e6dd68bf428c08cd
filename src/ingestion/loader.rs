//! Normalization of per-document extraction records into a flat, ordered
//! sequence of text blocks.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::TextBlock;
use crate::types::PipelineError;

/// One raw item from an extraction record: a paragraph or list entry with
/// an optional page attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub text: String,
    #[serde(default, alias = "page_number")]
    pub page: Option<u32>,
}

/// A per-document extraction record, one per source PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Stem of the source file, when the extractor recorded one.
    #[serde(default)]
    pub source: Option<String>,
    /// Original file name of the source document.
    #[serde(default)]
    pub file: Option<String>,
    /// Ordered extracted items, in reading order.
    #[serde(default)]
    pub content: Vec<RawItem>,
}

/// Derives a source-file identifier from an extraction record's file name,
/// for records that omit an explicit one: `output_<stem>.json` → `<stem>.pdf`.
pub fn fallback_source_file(record_name: &str) -> String {
    let stem = record_name
        .strip_prefix("output_")
        .unwrap_or(record_name)
        .strip_suffix(".json")
        .unwrap_or(record_name);
    format!("{stem}.pdf")
}

/// Turns one extraction record into ordered [`TextBlock`]s.
///
/// Empty and whitespace-only items are dropped silently; they carry no
/// information and would corrupt chunk boundaries with blank lines. Page
/// zero is treated as unattributed. The emitted `source_file` is the
/// record's `file` field, or `fallback` when that is missing or blank, so
/// the chunker never receives an empty source.
pub fn blocks_from_document(document: &RawDocument, fallback: &str) -> Vec<TextBlock> {
    let source_file = document
        .file
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(fallback);

    document
        .content
        .iter()
        .filter_map(|item| {
            let text = item.text.trim();
            if text.is_empty() {
                return None;
            }
            let page = item.page.filter(|page| *page > 0);
            Some(TextBlock::new(text, page, source_file))
        })
        .collect()
}

/// Loads every `output_*.json` extraction record under `dir` into one flat
/// block sequence.
///
/// Records are visited in sorted file-name order so repeated runs see the
/// same block sequence; within a record the extraction order is preserved.
pub async fn load_blocks_from_dir(dir: impl AsRef<Path>) -> Result<Vec<TextBlock>, PipelineError> {
    let dir = dir.as_ref();
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("output_") && name.to_ascii_lowercase().ends_with(".json") {
            names.push(name);
        }
    }
    names.sort();

    let mut blocks = Vec::new();
    for name in &names {
        let path = dir.join(name);
        let data = tokio::fs::read_to_string(&path).await?;
        let document: RawDocument = serde_json::from_str(&data).map_err(|err| {
            PipelineError::InvalidDocument(format!("{}: {err}", path.display()))
        })?;
        let fallback = fallback_source_file(name);
        let document_blocks = blocks_from_document(&document, &fallback);
        debug!(record = %name, blocks = document_blocks.len(), "loaded extraction record");
        blocks.extend(document_blocks);
    }

    info!(records = names.len(), blocks = blocks.len(), "loaded text blocks");
    Ok(blocks)
}
