//! PDF text extraction into raw per-document records.
//!
//! Extraction itself is delegated to `pdf-extract`; this module's job is
//! shaping its output into ordered, page-attributed paragraph items the
//! loader understands.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use super::loader::{RawDocument, RawItem};
use crate::types::PipelineError;

/// Page separator emitted by the extractor.
const PAGE_BREAK: char = '\x0C';

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace run pattern"));

/// Extracts one PDF into a raw document record with page attribution.
pub fn extract_document(path: impl AsRef<Path>) -> Result<RawDocument, PipelineError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|err| {
        PipelineError::InvalidDocument(format!("{}: PDF extraction error: {err}", path.display()))
    })?;

    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let source = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned());

    Ok(document_from_text(source, file, &text))
}

/// Shapes extracted text into a raw document record.
///
/// Pages split on form feeds (the whole text counts as page 1 when none
/// are present), paragraphs split on blank lines, and whitespace runs
/// inside a paragraph collapse to single spaces. Empty pages and
/// paragraphs are skipped.
pub fn document_from_text(
    source: Option<String>,
    file: Option<String>,
    text: &str,
) -> RawDocument {
    let pages: Vec<&str> = if text.contains(PAGE_BREAK) {
        text.split(PAGE_BREAK).collect()
    } else {
        vec![text]
    };

    let mut content = Vec::new();
    for (index, page_text) in pages.iter().enumerate() {
        if page_text.trim().is_empty() {
            continue;
        }
        let page = index as u32 + 1;
        for paragraph in PARAGRAPH_BREAK.split(page_text) {
            let normalized = WHITESPACE_RUN.replace_all(paragraph.trim(), " ");
            if normalized.is_empty() {
                continue;
            }
            content.push(RawItem {
                text: normalized.into_owned(),
                page: Some(page),
            });
        }
    }

    RawDocument {
        source,
        file,
        content,
    }
}

/// Extracts every PDF under `pdf_dir` and writes one `output_<stem>.json`
/// record per input into `out_dir`. Returns the written record paths.
pub async fn extract_dir(
    pdf_dir: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, PipelineError> {
    let pdf_dir = pdf_dir.as_ref();
    let out_dir = out_dir.as_ref();
    tokio::fs::create_dir_all(out_dir).await?;

    let mut pdf_names = Vec::new();
    let mut entries = tokio::fs::read_dir(pdf_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_ascii_lowercase().ends_with(".pdf") {
            pdf_names.push(name);
        }
    }
    pdf_names.sort();

    let mut written = Vec::new();
    for name in pdf_names {
        let pdf_path = pdf_dir.join(&name);
        let document = extract_document(&pdf_path)?;
        let stem = document
            .source
            .clone()
            .unwrap_or_else(|| name.trim_end_matches(".pdf").to_string());
        let out_path = out_dir.join(format!("output_{stem}.json"));
        let serialized = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&out_path, serialized).await?;
        info!(
            pdf = %name,
            items = document.content.len(),
            record = %out_path.display(),
            "extracted document"
        );
        written.push(out_path);
    }

    Ok(written)
}
