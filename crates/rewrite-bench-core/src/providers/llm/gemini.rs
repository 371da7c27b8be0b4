use super::{read_error_body, LlmClient, RewriteRequest};
use crate::errors::ProviderError;
use crate::model::LlmResponse;
use async_trait::async_trait;
use serde_json::json;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub client: reqwest::Client,
}

impl GeminiClient {
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
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature,
            max_tokens,
            client,
        }
    }
}

/// Concatenates the text parts of the first candidate.
fn candidate_text(json: &serde_json::Value) -> Option<String> {
    let parts = json.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &RewriteRequest) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let mut generation = serde_json::Map::new();
        if let Some(t) = self.temperature {
            generation.insert("temperature".into(), json!(t));
        }
        if let Some(m) = self.max_tokens {
            generation.insert("maxOutputTokens".into(), json!(m));
        }
        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": generation,
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(read_error_body(resp).await);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = candidate_text(&json).ok_or_else(|| {
            ProviderError::Malformed("response missing candidates[0].content.parts".into())
        })?;

        Ok(LlmResponse {
            text,
            provider: "gemini".into(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_text_joins_parts() {
        let v = json!({
            "candidates": [{ "content": { "parts": [{ "text": "SELECT " }, { "text": "1" }] } }]
        });
        assert_eq!(candidate_text(&v).as_deref(), Some("SELECT 1"));
        assert_eq!(candidate_text(&json!({ "candidates": [] })), None);
    }
}
