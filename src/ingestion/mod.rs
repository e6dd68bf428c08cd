//! Ingestion: PDF extraction, block normalization, and chunk persistence.
//!
//! * [`pdf`] — PDF text extraction into raw per-document records.
//! * [`loader`] — normalization of raw records into ordered [`TextBlock`]s.
//! * [`writer`] — durable persistence of the chunk sequence.
//!
//! [`TextBlock`]: crate::chunking::TextBlock

pub mod loader;
pub mod pdf;
pub mod writer;

pub use loader::{RawDocument, RawItem, blocks_from_document, load_blocks_from_dir};
pub use pdf::{extract_dir, extract_document};
pub use writer::{load_chunks, save_chunks};
