//! Command-line interface definitions.
//!
//! Each subcommand maps to one pipeline stage; paths default to the
//! environment-driven [`PipelineConfig`](crate::config::PipelineConfig).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "docsmith",
    version,
    about = "Semantic chunking and cited question answering over PDF document collections"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract PDFs into raw per-document records (`output_<stem>.json`).
    Extract {
        /// Directory of source PDFs.
        #[arg(long)]
        pdf_dir: Option<PathBuf>,
        /// Output directory for extraction records.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Chunk extraction records into overlapping, token-bounded chunks.
    Chunk {
        /// Directory of extraction records.
        #[arg(long)]
        raw_dir: Option<PathBuf>,
        /// Output file for the chunk sequence.
        #[arg(long)]
        out_file: Option<PathBuf>,
    },
    /// Embed chunks and upsert them into the vector store.
    Index {
        /// Chunk sequence to index.
        #[arg(long)]
        chunks_file: Option<PathBuf>,
        /// SQLite vector store path.
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Ask a question against the indexed collection.
    Ask {
        /// The question to answer.
        question: String,
        /// Chunks to retrieve for the answer.
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Serve the query endpoint as an MCP server over stdio.
    Serve,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_parses_question_and_top_k() {
        let cli = Cli::try_parse_from(["docsmith", "ask", "what is a tensor", "--top-k", "6"])
            .unwrap();
        match cli.command {
            Command::Ask { question, top_k } => {
                assert_eq!(question, "what is a tensor");
                assert_eq!(top_k, Some(6));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_takes_no_arguments() {
        let cli = Cli::try_parse_from(["docsmith", "serve"]).unwrap();
        assert!(matches!(cli.command, Command::Serve));
    }
}
