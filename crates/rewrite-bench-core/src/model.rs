use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One result row, columns in select-list order.
pub type Row = Vec<serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    Plain,
    #[default]
    ZeroShot,
    FewShot,
    ChainOfThought,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Plain => "plain",
            PromptMode::ZeroShot => "zero-shot",
            PromptMode::FewShot => "few-shot",
            PromptMode::ChainOfThought => "chain-of-thought",
        }
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "plain" => Ok(PromptMode::Plain),
            "zero-shot" => Ok(PromptMode::ZeroShot),
            "few-shot" => Ok(PromptMode::FewShot),
            "chain-of-thought" | "cot" => Ok(PromptMode::ChainOfThought),
            other => Err(format!(
                "unknown prompt mode '{}' (expected plain|zero-shot|few-shot|chain-of-thought)",
                other
            )),
        }
    }
}

/// Values reported by plan introspection. Every field is optional because
/// the planner output may omit any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStats {
    pub planning_ms: Option<f64>,
    pub execution_ms: Option<f64>,
    pub shared_hit_blocks: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
}

/// Outcome of evaluating one query, original vs rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub run_id: String,
    pub db: String,
    pub llm: String,
    pub prompt_mode: String,
    pub query_id: u32,

    pub original_ms: Option<f64>,
    pub execution_ms_original: Option<f64>,
    pub planning_ms_original: Option<f64>,
    pub buffers_plan_original: Option<i64>,

    pub rewritten_ms: Option<f64>,
    pub execution_ms_rewritten: Option<f64>,
    pub planning_ms_rewritten: Option<f64>,
    pub buffers_plan_rewritten: Option<i64>,

    pub emissions_original: Option<f64>,
    pub emissions_rewritten: Option<f64>,

    pub speedup: Option<f64>,
    pub buffers_ratio: Option<f64>,
    pub energy_ratio: Option<f64>,
    pub energy_saving_pct: Option<f64>,

    pub same_rowcount: bool,
    pub same_signature: bool,

    pub original_sql: String,
    pub rewritten_sql: String,
}

/// A persisted record as read back for aggregation. Legacy sinks may lack
/// columns or hold unparsable values, so everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub run_id: Option<String>,
    pub query_id: Option<u32>,
    pub same_rowcount: Option<bool>,
    pub same_signature: Option<bool>,
    pub speedup: Option<f64>,
    pub buffers_ratio: Option<f64>,
    pub energy_ratio: Option<f64>,
}

impl From<&EvaluationRecord> for StoredRecord {
    fn from(r: &EvaluationRecord) -> Self {
        Self {
            run_id: Some(r.run_id.clone()),
            query_id: Some(r.query_id),
            same_rowcount: Some(r.same_rowcount),
            same_signature: Some(r.same_signature),
            speedup: r.speedup,
            buffers_ratio: r.buffers_ratio,
            energy_ratio: r.energy_ratio,
        }
    }
}

/// Collapses all whitespace runs (including newlines) into single spaces.
pub fn single_line(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
