use crate::errors::ProviderError;
use crate::model::{single_line, LlmResponse};
use crate::providers::llm::{LlmClient, RewriteRequest};
use async_trait::async_trait;
use sha2::Digest;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// Replays recorded engine answers from a JSONL file.
///
/// Each line is an object with `original_sql` and the recorded answer under
/// `response` (or `text` / `rewritten_sql`). Lookups normalise whitespace, so
/// a corpus reformatted after recording still matches.
#[derive(Clone)]
pub struct ReplayClient {
    answers: Arc<HashMap<String, String>>,
    model: String,
    fingerprint: String,
}

impl ReplayClient {
    pub fn from_path<P: AsRef<Path>>(path: P, model: &str) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            anyhow::anyhow!("failed to open replay file '{}': {}", path.display(), e)
        })?;
        let reader = std::io::BufReader::new(file);

        let mut answers = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let v: serde_json::Value = serde_json::from_str(&line)
                .map_err(|e| anyhow::anyhow!("line {}: parse error: {}", i + 1, e))?;

            let sql = v
                .get("original_sql")
                .and_then(|s| s.as_str())
                .ok_or_else(|| anyhow::anyhow!("line {}: missing original_sql", i + 1))?;
            let response = ["response", "text", "rewritten_sql"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|s| s.as_str()))
                .ok_or_else(|| anyhow::anyhow!("line {}: missing response", i + 1))?;

            let key = single_line(sql);
            if answers.insert(key, response.to_string()).is_some() {
                return Err(anyhow::anyhow!(
                    "line {}: duplicate entry for query '{}'",
                    i + 1,
                    single_line(sql)
                ));
            }
        }

        let fingerprint = fingerprint(&answers);
        tracing::info!(
            event = "replay.loaded",
            file = %path.display(),
            entries = answers.len(),
            fingerprint = %fingerprint,
        );

        Ok(Self {
            answers: Arc::new(answers),
            model: model.to_string(),
            fingerprint,
        })
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Order-independent digest of the loaded entries.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(answers: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = answers.keys().collect();
    keys.sort();
    let mut hasher = sha2::Sha256::new();
    for k in keys {
        hasher.update(k.as_bytes());
        hasher.update([0u8]);
        hasher.update(answers[k].as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[async_trait]
impl LlmClient for ReplayClient {
    async fn complete(&self, request: &RewriteRequest) -> Result<LlmResponse, ProviderError> {
        let key = single_line(&request.original_sql);
        match self.answers.get(&key) {
            Some(text) => Ok(LlmResponse {
                text: text.clone(),
                provider: "replay".into(),
                model: self.model.clone(),
            }),
            None => Err(ProviderError::Other(format!(
                "replay miss: no recorded answer for query '{}'",
                key
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "replay"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
