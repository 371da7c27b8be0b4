use crate::errors::ConfigError;
use crate::model::PromptMode;
use crate::on_error::RewriteFailurePolicy;
use crate::retry::RetryPolicy;
use crate::stats::StatsSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod path_resolver;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_RESULTS: &str = "results/{model}_{mode}.csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Query corpus file, queries separated by blank lines.
    pub corpus: String,
    /// Result sink. May contain `{model}` and `{mode}` placeholders.
    #[serde(default = "default_results")]
    pub results: String,
    #[serde(default)]
    pub schema_hint: Option<String>,
    #[serde(default)]
    pub schema_hint_file: Option<String>,
    pub database: DatabaseSettings,
    pub rewrite: RewriteSettings,
    #[serde(default)]
    pub energy: EnergySettings,
    #[serde(default)]
    pub stats: StatsSettings,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

fn default_results() -> String {
    DEFAULT_RESULTS.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Identity written to the `db` column.
    pub name: String,
    /// Inline connection URL. Prefer `url_env` so credentials stay out of the file.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_url_env")]
    pub url_env: String,
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
    /// Run plan introspection after each execution.
    #[serde(default = "default_true")]
    pub explain: bool,
    #[serde(default = "default_db_retry")]
    pub retry: RetryPolicy,
}

fn default_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_true() -> bool {
    true
}

fn default_db_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay_ms: 1_000,
        backoff: 2.0,
    }
}

impl DatabaseSettings {
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.url.as_ref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.clone());
        }
        std::env::var(&self.url_env).map_err(|_| {
            ConfigError(format!(
                "database URL not set: define database.url or export {}",
                self.url_env
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Openai,
    Mistral,
    Ollama,
    Gemini,
    Replay,
    Fake,
}

impl ProviderKind {
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Openai => Some("OPENAI_API_KEY"),
            ProviderKind::Mistral => Some("MISTRAL_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama | ProviderKind::Replay | ProviderKind::Fake => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteSettings {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub mode: PromptMode,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub num_ctx: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// JSONL file used by the `replay` provider.
    #[serde(default)]
    pub replay_file: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub on_failure: RewriteFailurePolicy,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout_seconds() -> u64 {
    120
}

impl RewriteSettings {
    pub fn api_key(&self) -> Result<Option<String>, ConfigError> {
        let var = match (&self.api_key_env, self.provider.default_api_key_env()) {
            (Some(v), _) => v.clone(),
            (None, Some(v)) => v.to_string(),
            (None, None) => return Ok(None),
        };
        match std::env::var(&var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(ConfigError(format!(
                "API key for provider {:?} not set: export {}",
                self.provider, var
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergySettings {
    pub enabled: bool,
    pub carbon_intensity_g_per_kwh: f64,
    pub powercap_root: String,
}

impl Default for EnergySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            carbon_intensity_g_per_kwh: 475.0,
            powercap_root: "/sys/class/powercap".to_string(),
        }
    }
}

impl EvalConfig {
    /// Results path with `{model}` and `{mode}` filled in. Characters that
    /// are awkward in file names (`/`, `:`) in the model id become `_`.
    pub fn results_path(&self) -> PathBuf {
        let model: String = self
            .rewrite
            .model
            .chars()
            .map(|c| if c == '/' || c == ':' || c.is_whitespace() { '_' } else { c })
            .collect();
        PathBuf::from(
            self.results
                .replace("{model}", &model)
                .replace("{mode}", self.rewrite.mode.as_str()),
        )
    }

    pub fn schema_hint_text(&self) -> Result<String, ConfigError> {
        match (&self.schema_hint, &self.schema_hint_file) {
            (Some(inline), _) => Ok(inline.clone()),
            (None, Some(file)) => std::fs::read_to_string(file)
                .map_err(|e| ConfigError(format!("failed to read schema hint {}: {}", file, e))),
            (None, None) => Ok(String::new()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.corpus.trim().is_empty() {
            return Err(ConfigError("corpus must not be empty".into()));
        }
        if self.results.trim().is_empty() {
            return Err(ConfigError("results must not be empty".into()));
        }
        if self.database.name.trim().is_empty() {
            return Err(ConfigError("database.name must not be empty".into()));
        }
        if self.rewrite.model.trim().is_empty() {
            return Err(ConfigError("rewrite.model must not be empty".into()));
        }
        for (label, retry) in [
            ("rewrite.retry", &self.rewrite.retry),
            ("database.retry", &self.database.retry),
        ] {
            if retry.max_attempts == 0 {
                return Err(ConfigError(format!("{}.max_attempts must be at least 1", label)));
            }
            if !retry.backoff.is_finite() || retry.backoff < 1.0 {
                return Err(ConfigError(format!("{}.backoff must be >= 1.0", label)));
            }
        }
        if self.rewrite.provider == ProviderKind::Replay && self.rewrite.replay_file.is_none() {
            return Err(ConfigError(
                "rewrite.replay_file is required for the replay provider".into(),
            ));
        }
        let intensity = self.energy.carbon_intensity_g_per_kwh;
        if self.energy.enabled && (!intensity.is_finite() || intensity < 0.0) {
            return Err(ConfigError(
                "energy.carbon_intensity_g_per_kwh must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<EvalConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    let mut cfg: EvalConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    // Anchors and extension keys are allowed anywhere.
    let meaningful_unknowns: Vec<_> = ignored_keys
        .iter()
        .filter(|k| {
            let leaf = k.rsplit('.').next().unwrap_or(k);
            !leaf.starts_with('_') && !leaf.starts_with("x-")
        })
        .collect();

    if !meaningful_unknowns.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?} (file: {})",
                meaningful_unknowns,
                path.display()
            )));
        }
        tracing::warn!(
            event = "config.unknown_fields",
            fields = ?meaningful_unknowns,
            file = %path.display(),
            "ignoring unknown config fields"
        );
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    cfg.validate()?;
    normalize_paths(&mut cfg, path);
    Ok(cfg)
}

fn normalize_paths(cfg: &mut EvalConfig, config_path: &Path) {
    let r = path_resolver::PathResolver::new(config_path);
    r.resolve_str(&mut cfg.corpus);
    r.resolve_str(&mut cfg.results);
    r.resolve_opt_str(&mut cfg.schema_hint_file);
    r.resolve_opt_str(&mut cfg.rewrite.replay_file);
}

pub const SAMPLE_CONFIG: &str = r#"version: 1
corpus: queries.sql
results: results/{model}_{mode}.csv
schema_hint: |
  customer(c_custkey, c_name, c_nationkey)
  orders(o_orderkey, o_custkey, o_totalprice, o_orderdate)

database:
  name: tpch
  url_env: DATABASE_URL
  statement_timeout_ms: 60000
  explain: true

rewrite:
  provider: openai
  model: gpt-4o-mini
  mode: zero-shot
  temperature: 0.7
  on_failure: skip
  retry:
    max_attempts: 5
    delay_ms: 5000

energy:
  enabled: false
  carbon_intensity_g_per_kwh: 475

stats:
  outliers: fixed_threshold
  ceilings:
    speedup: 3.0
    buffers_ratio: 10.0
"#;

pub const SAMPLE_CORPUS: &str = r#"-- One query per block; blocks are separated by blank lines.
-- Blocks starting with a comment are skipped.

SELECT c_name, count(*) AS orders
FROM customer JOIN orders ON o_custkey = c_custkey
GROUP BY c_name
ORDER BY orders DESC, c_name
LIMIT 10;

SELECT o_orderkey, o_totalprice
FROM orders
WHERE o_custkey IN (SELECT c_custkey FROM customer WHERE c_nationkey = 7)
ORDER BY o_orderkey;
"#;


