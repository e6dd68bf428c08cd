//! MCP server exposing the query endpoint over stdio.
//!
//! Tools call the same retriever and answer pipeline as the CLI. Tool
//! results are JSON strings; failures are reported as `{"error": ...}`
//! payloads rather than protocol errors, so callers always get a body to
//! inspect. Logging goes to stderr — stdout is the MCP transport.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use serde::{Deserialize, Serialize};

use crate::pipeline::{AnswerPipeline, Retriever};
use crate::types::PipelineError;

/// Parameters for the `search` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchParams {
    /// Free-text query.
    #[schemars(description = "Free-text query matched against the indexed chunks")]
    pub query: String,
    /// Optional result-count override.
    #[schemars(description = "Maximum chunks to return (default: configured top_k)")]
    pub top_k: Option<usize>,
}

/// Parameters for the `ask` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AskParams {
    /// Natural-language question.
    #[schemars(description = "Natural-language question answered from the indexed chunks")]
    pub question: String,
}

/// The docsmith MCP server.
///
/// Holds the injected retriever and (optionally) the answer pipeline; the
/// `ask` tool reports an error when no generation endpoint was configured.
#[derive(Clone)]
pub struct DocsmithServer {
    retriever: Arc<Retriever>,
    pipeline: Option<Arc<AnswerPipeline>>,
    tool_router: ToolRouter<Self>,
}

impl DocsmithServer {
    pub fn new(retriever: Arc<Retriever>, pipeline: Option<Arc<AnswerPipeline>>) -> Self {
        Self {
            retriever,
            pipeline,
            tool_router: Self::tool_router(),
        }
    }

    fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string(value).unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"))
    }
}

#[tool_router]
impl DocsmithServer {
    #[tool(
        description = "Search the indexed document chunks by similarity. Returns matching chunks with content, source file, pages, and score."
    )]
    async fn search(&self, Parameters(params): Parameters<SearchParams>) -> String {
        let top_k = params.top_k.unwrap_or(self.retriever.top_k());
        match self.retriever.retrieve_top(&params.query, top_k).await {
            Ok(chunks) => Self::to_json(&chunks),
            Err(err) => format!("{{\"error\":\"{err}\"}}"),
        }
    }

    #[tool(
        description = "Answer a question from the indexed documents. Returns the generated answer with a numbered citation list (source file + pages)."
    )]
    async fn ask(&self, Parameters(params): Parameters<AskParams>) -> String {
        let Some(pipeline) = &self.pipeline else {
            return "{\"error\":\"no generation endpoint configured; only 'search' is available\"}"
                .to_string();
        };
        match pipeline.answer(&params.question).await {
            Ok(answer) => Self::to_json(&answer),
            Err(err) => format!("{{\"error\":\"{err}\"}}"),
        }
    }
}

#[tool_handler]
impl ServerHandler for DocsmithServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "docsmith: question answering over an indexed PDF document collection. \
                 Use 'search' to retrieve raw chunks (content + source file + pages) for a \
                 free-text query, and 'ask' for a generated answer with numbered citations. \
                 Both tools require the collection to be extracted, chunked, and indexed \
                 first (docsmith extract / chunk / index)."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serves the MCP endpoint on stdio until the client disconnects.
pub async fn start_mcp_server(server: DocsmithServer) -> Result<(), PipelineError> {
    tracing::info!("starting docsmith MCP server on stdio");

    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|err| PipelineError::Server(err.to_string()))?;

    service
        .waiting()
        .await
        .map_err(|err| PipelineError::Server(err.to_string()))?;

    Ok(())
}
