//! The question-answering pipeline: retrieve → draft → cite → finalize.
//!
//! A straight line with no branching, retries, or state beyond the record
//! passed forward. The retrieval and generation collaborators are
//! injected handles constructed by the caller; any external-call failure
//! propagates unrecovered.

pub mod retriever;

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::generation::CompletionProvider;
use crate::types::PipelineError;

pub use retriever::{RetrievedChunk, Retriever};

/// One entry of the numbered citation list appended to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// Marker number used in the prompt and the answer text, 1-based.
    pub marker: usize,
    pub source_file: String,
    pub pages: Vec<u32>,
}

/// A generated answer with its citation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer_text: String,
    pub citations: Vec<Citation>,
}

/// Runs the retrieve → draft → cite → finalize stages.
pub struct AnswerPipeline {
    retriever: Retriever,
    generator: Arc<dyn CompletionProvider>,
}

impl AnswerPipeline {
    pub fn new(retriever: Retriever, generator: Arc<dyn CompletionProvider>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answers `question` from the indexed chunks, returning the drafted
    /// text with an appended "Sources:" list.
    pub async fn answer(&self, question: &str) -> Result<Answer, PipelineError> {
        let docs = self.retriever.retrieve(question).await?;
        debug!(retrieved = docs.len(), "answering question");

        let draft = self
            .generator
            .complete(&build_prompt(question, &docs))
            .await?;
        let citations = cite(&docs);
        Ok(finalize(draft, citations))
    }
}

/// Builds the drafting prompt: every retrieved chunk under a numbered
/// marker, then the question.
fn build_prompt(question: &str, docs: &[RetrievedChunk]) -> String {
    let mut context = String::new();
    for (index, doc) in docs.iter().enumerate() {
        let _ = writeln!(context, "[{}] {}", index + 1, doc.content);
    }

    format!(
        "Use only this context to answer.\n\n\
         Context:\n{context}\n\
         Question:\n{question}\n\n\
         Answer with citations like [1], [2]."
    )
}

/// Maps each retrieved chunk to its numbered citation.
fn cite(docs: &[RetrievedChunk]) -> Vec<Citation> {
    docs.iter()
        .enumerate()
        .map(|(index, doc)| Citation {
            marker: index + 1,
            source_file: doc.source_file.clone(),
            pages: doc.pages.clone(),
        })
        .collect()
}

/// Appends the citation list to the draft.
fn finalize(draft: String, citations: Vec<Citation>) -> Answer {
    let mut answer_text = draft;
    answer_text.push_str("\n\nSources:\n");
    for citation in &citations {
        let _ = write!(answer_text, "[{}] {}", citation.marker, citation.source_file);
        if !citation.pages.is_empty() {
            let pages: Vec<String> = citation.pages.iter().map(u32::to_string).collect();
            let _ = write!(answer_text, " pages {}", pages.join(", "));
        }
        answer_text.push('\n');
    }

    Answer {
        answer_text,
        citations,
    }
}
