use crate::errors::ProviderError;
use crate::model::{LlmResponse, PromptMode};
use async_trait::async_trait;

/// Everything a provider may need to answer one rewrite request. Most
/// providers only send `prompt`; replay-style providers key on `original_sql`.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    pub original_sql: String,
    pub schema_hint: String,
    pub mode: PromptMode,
    pub prompt: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &RewriteRequest) -> Result<LlmResponse, ProviderError>;
    fn provider_name(&self) -> &'static str;
    fn model(&self) -> &str;
}

pub(crate) async fn read_error_body(resp: reqwest::Response) -> ProviderError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ProviderError::Status { status, body }
}

pub mod fake;
pub mod gemini;
pub mod ollama;
pub mod openai;
