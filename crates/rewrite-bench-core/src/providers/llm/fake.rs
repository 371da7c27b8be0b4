use super::{LlmClient, RewriteRequest};
use crate::errors::ProviderError;
use crate::model::LlmResponse;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Mode {
    /// Answers in order; once drained, echoes the original SQL.
    Scripted(Mutex<VecDeque<Result<String, ProviderError>>>),
    Echo,
    Failing(ProviderError),
}

/// In-process engine used by tests and dry runs.
pub struct FakeClient {
    mode: Mode,
    prompts: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn scripted(answers: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            mode: Mode::Scripted(Mutex::new(answers.into())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns every query unchanged.
    pub fn echo() -> Self {
        Self {
            mode: Mode::Echo,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            mode: Mode::Failing(err),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, request: &RewriteRequest) -> Result<LlmResponse, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let text = match &self.mode {
            Mode::Echo => request.original_sql.clone(),
            Mode::Failing(e) => return Err(e.clone()),
            Mode::Scripted(q) => match q.lock().unwrap().pop_front() {
                Some(answer) => answer?,
                None => request.original_sql.clone(),
            },
        };

        Ok(LlmResponse {
            text,
            provider: "fake".into(),
            model: "fake-model".into(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}
