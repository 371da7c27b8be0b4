use crate::config::{ProviderKind, RewriteSettings};
use llm::LlmClient;
use std::sync::Arc;
use std::time::Duration;

pub mod llm;
pub mod replay;

/// Builds the engine client named in the config. API keys are read from the
/// environment at this point, so a missing key fails before any query runs.
pub fn build_client(settings: &RewriteSettings) -> anyhow::Result<Arc<dyn LlmClient>> {
    let http = || {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
    };
    let api_key = || -> anyhow::Result<String> {
        Ok(settings.api_key()?.unwrap_or_default())
    };

    let client: Arc<dyn LlmClient> = match settings.provider {
        ProviderKind::Openai => Arc::new(llm::openai::OpenAIClient::new(
            settings.model.clone(),
            api_key()?,
            settings.base_url.clone(),
            settings.temperature,
            settings.max_tokens,
            http()?,
        )),
        ProviderKind::Mistral => Arc::new(
            llm::openai::OpenAIClient::new(
                settings.model.clone(),
                api_key()?,
                Some(
                    settings
                        .base_url
                        .clone()
                        .unwrap_or_else(|| llm::openai::MISTRAL_BASE_URL.to_string()),
                ),
                settings.temperature,
                settings.max_tokens,
                http()?,
            )
            .with_provider_name("mistral"),
        ),
        ProviderKind::Ollama => Arc::new(llm::ollama::OllamaClient::new(
            settings.model.clone(),
            settings.base_url.clone(),
            settings.temperature,
            settings.num_ctx,
            http()?,
        )),
        ProviderKind::Gemini => Arc::new(llm::gemini::GeminiClient::new(
            settings.model.clone(),
            api_key()?,
            settings.base_url.clone(),
            settings.temperature,
            settings.max_tokens,
            http()?,
        )),
        ProviderKind::Replay => {
            let path = settings
                .replay_file
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("rewrite.replay_file is required for replay"))?;
            Arc::new(replay::ReplayClient::from_path(path, &settings.model)?)
        }
        ProviderKind::Fake => Arc::new(llm::fake::FakeClient::echo()),
    };

    tracing::info!(
        event = "provider.ready",
        provider = client.provider_name(),
        model = client.model(),
    );
    Ok(client)
}
