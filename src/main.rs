use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use docsmith::chunking::{SemanticChunker, TokenCounter};
use docsmith::cli::{Cli, Command};
use docsmith::config::PipelineConfig;
use docsmith::indexing::index_chunks;
use docsmith::ingestion::{extract_dir, load_blocks_from_dir, load_chunks, save_chunks};
use docsmith::mcp::{DocsmithServer, start_mcp_server};
use docsmith::pipeline::{AnswerPipeline, Retriever};
use docsmith::stores::SqliteVectorStore;
use docsmith::types::PipelineError;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

// Logs go to stderr: stdout carries command output, and in `serve` mode it
// is the MCP transport.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

async fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = PipelineConfig::from_env();

    match cli.command {
        Command::Extract { pdf_dir, out_dir } => cmd_extract(&config, pdf_dir, out_dir).await,
        Command::Chunk { raw_dir, out_file } => cmd_chunk(&config, raw_dir, out_file).await,
        Command::Index { chunks_file, db } => cmd_index(&config, chunks_file, db).await,
        Command::Ask { question, top_k } => cmd_ask(&config, &question, top_k).await,
        Command::Serve => cmd_serve(&config).await,
    }
}

async fn cmd_extract(
    config: &PipelineConfig,
    pdf_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> Result<(), PipelineError> {
    let pdf_dir = pdf_dir.unwrap_or_else(|| config.pdf_dir.clone());
    let out_dir = out_dir.unwrap_or_else(|| config.raw_dir.clone());

    let written = extract_dir(&pdf_dir, &out_dir).await?;
    println!(
        "extracted {} documents from {} into {}",
        written.len(),
        pdf_dir.display(),
        out_dir.display()
    );
    Ok(())
}

async fn cmd_chunk(
    config: &PipelineConfig,
    raw_dir: Option<PathBuf>,
    out_file: Option<PathBuf>,
) -> Result<(), PipelineError> {
    let raw_dir = raw_dir.unwrap_or_else(|| config.raw_dir.clone());
    let out_file = out_file.unwrap_or_else(|| config.chunks_file.clone());

    let blocks = load_blocks_from_dir(&raw_dir).await?;
    let chunker = SemanticChunker::new(TokenCounter::new()?, config.chunker)?;
    let outcome = chunker.chunk_blocks(&blocks);

    for document in &outcome.documents {
        println!(
            "{}: {} chunks from {} blocks",
            document.source_file, document.chunk_count, document.block_count
        );
    }

    save_chunks(&out_file, &outcome.chunks).await?;
    println!(
        "{} chunks written to {}",
        outcome.chunk_count(),
        out_file.display()
    );
    Ok(())
}

async fn cmd_index(
    config: &PipelineConfig,
    chunks_file: Option<PathBuf>,
    db: Option<PathBuf>,
) -> Result<(), PipelineError> {
    let chunks_file = chunks_file.unwrap_or_else(|| config.chunks_file.clone());
    let db = db.unwrap_or_else(|| config.db_path.clone());

    let chunks = load_chunks(&chunks_file).await?;
    let store = open_store(&db).await?;
    let provider = config.embedding_provider();

    let report = index_chunks(provider.as_ref(), &store, &chunks).await?;
    for source in &report.per_source {
        println!("{}: {} chunks", source.source_file, source.chunks);
    }
    println!(
        "indexed {} chunks into {} (embedder: {})",
        report.total_chunks,
        db.display(),
        report.embedder
    );
    Ok(())
}

async fn cmd_ask(
    config: &PipelineConfig,
    question: &str,
    top_k: Option<usize>,
) -> Result<(), PipelineError> {
    let store = open_store(&config.db_path).await?;
    let retriever = Retriever::new(
        Arc::new(store),
        config.embedding_provider(),
        top_k.unwrap_or(config.top_k),
    );
    let pipeline = AnswerPipeline::new(retriever, config.completion_provider()?);

    let answer = pipeline.answer(question).await?;
    println!("{}", answer.answer_text);
    Ok(())
}

async fn cmd_serve(config: &PipelineConfig) -> Result<(), PipelineError> {
    let store = open_store(&config.db_path).await?;
    let retriever = Retriever::new(Arc::new(store), config.embedding_provider(), config.top_k);

    // `ask` is only offered when a generation endpoint is configured;
    // `search` works either way.
    let pipeline = config
        .completion_provider()
        .ok()
        .map(|generator| Arc::new(AnswerPipeline::new(retriever.clone(), generator)));

    start_mcp_server(DocsmithServer::new(Arc::new(retriever), pipeline)).await
}

async fn open_store(path: &Path) -> Result<SqliteVectorStore, PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    SqliteVectorStore::open(path).await
}
