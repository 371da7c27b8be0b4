use super::{read_error_body, LlmClient, RewriteRequest};
use crate::errors::ProviderError;
use crate::model::LlmResponse;
use async_trait::async_trait;
use serde_json::json;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Chat-completions client. Works against any OpenAI-compatible endpoint
/// (OpenAI, Mistral, vLLM, ...) by swapping `base_url`.
pub struct OpenAIClient {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub provider: &'static str,
    pub client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature,
            max_tokens,
            provider: "openai",
            client,
        }
    }

    pub fn with_provider_name(mut self, provider: &'static str) -> Self {
        self.provider = provider;
        self
    }

    pub(crate) fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(m) = self.max_tokens {
            body["max_tokens"] = json!(m);
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: &RewriteRequest) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(&request.prompt))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(read_error_body(resp).await);
        }

        let json: serde_json::Value = resp.json().await?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Malformed("response missing choices[0].message.content".into()))?
            .to_string();

        Ok(LlmResponse {
            text,
            provider: self.provider.to_string(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_omits_unset_sampling_options() {
        let c = OpenAIClient::new(
            "gpt-5".into(),
            "k".into(),
            None,
            None,
            None,
            reqwest::Client::new(),
        );
        let body = c.request_body("SELECT 1");
        assert_eq!(body["model"], "gpt-5");
        assert_eq!(body["messages"][0]["content"], "SELECT 1");
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
        assert_eq!(c.base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn test_mistral_flavour() {
        let c = OpenAIClient::new(
            "mistral-small-latest".into(),
            "k".into(),
            Some(format!("{}/", MISTRAL_BASE_URL)),
            Some(0.7),
            Some(1024),
            reqwest::Client::new(),
        )
        .with_provider_name("mistral");
        assert_eq!(c.provider_name(), "mistral");
        assert_eq!(c.base_url, MISTRAL_BASE_URL);
        let body = c.request_body("x");
        assert_eq!(body["max_tokens"], 1024);
    }
}
