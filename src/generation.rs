//! Completion providers: the seam between the answer pipeline and the
//! hosted language model that drafts answers.

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::PipelineError;

/// Produces text from a prompt.
///
/// Failures are [`PipelineError::Generation`] and propagate unrecovered to
/// the caller; the pipeline defines no retry policy.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Identifier used in logs and reports.
    fn id(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// OpenAI-compatible `/chat/completions` endpoint client.
///
/// Works against any host speaking the OpenAI wire format (hosted
/// inference gateways, local servers).
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: ChatResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| PipelineError::Generation("response contained no choices".to_string()))
    }
}

/// Canned-reply provider for tests and offline runs.
#[derive(Debug, Clone)]
pub struct MockCompletionProvider {
    reply: String,
}

impl MockCompletionProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, PipelineError> {
        Ok(self.reply.clone())
    }
}
