use crate::errors::{ProviderError, RewriteError};
use crate::model::PromptMode;
use crate::providers::llm::{LlmClient, RewriteRequest};
use crate::retry::RetryPolicy;
use std::sync::Arc;

pub mod extract;
pub mod prompt;

pub use extract::{extract_sql, ExtractSource, Extracted};

/// Candidate SQL produced for one input query.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub sql: String,
    pub source: ExtractSource,
    pub raw: String,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct RewriteInvoker {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl RewriteInvoker {
    pub fn new(client: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn invoke(
        &self,
        original_sql: &str,
        schema_hint: &str,
        mode: PromptMode,
    ) -> Result<Rewrite, RewriteError> {
        let request = RewriteRequest {
            original_sql: original_sql.trim().to_string(),
            schema_hint: schema_hint.to_string(),
            mode,
            prompt: prompt::build_prompt(mode, original_sql, schema_hint),
        };
        tracing::debug!(
            event = "rewrite.prompt",
            provider = self.client.provider_name(),
            mode = %mode,
            prompt = %request.prompt,
        );

        let outcome = self
            .retry
            .run(
                "rewrite",
                |_| self.client.complete(&request),
                ProviderError::is_retryable,
            )
            .await;

        let (resp, attempts) = match outcome {
            Ok(v) => v,
            Err(f) if f.exhausted => {
                return Err(RewriteError::Exhausted {
                    attempts: f.attempts,
                    last: f.error,
                })
            }
            Err(f) => return Err(RewriteError::Rejected(f.error)),
        };

        let extracted = extract_sql(&resp.text);
        tracing::debug!(
            event = "rewrite.extracted",
            source = ?extracted.source,
            attempts,
            raw = %resp.text,
            sql = %extracted.sql,
        );
        if extracted.source == ExtractSource::Raw {
            tracing::warn!(
                event = "rewrite.no_sql_found",
                "engine output has no recognizable SQL; using trimmed text as candidate"
            );
        }

        Ok(Rewrite {
            sql: extracted.sql,
            source: extracted.source,
            raw: resp.text,
            attempts,
        })
    }
}
