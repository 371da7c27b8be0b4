use super::{read_error_body, LlmClient, RewriteRequest};
use crate::errors::ProviderError;
use crate::model::LlmResponse;
use async_trait::async_trait;
use serde_json::json;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub num_ctx: Option<u32>,
    pub client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(
        model: String,
        base_url: Option<String>,
        temperature: Option<f32>,
        num_ctx: Option<u32>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            model,
            base_url: base_url
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature,
            num_ctx,
            client,
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut options = serde_json::Map::new();
        if let Some(t) = self.temperature {
            options.insert("temperature".into(), json!(t));
        }
        if let Some(n) = self.num_ctx {
            options.insert("num_ctx".into(), json!(n));
        }
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": options,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: &RewriteRequest) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&self.request_body(&request.prompt))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(read_error_body(resp).await);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json
            .pointer("/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Malformed("response missing message.content".into()))?
            .to_string();

        Ok(LlmResponse {
            text,
            provider: "ollama".into(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
