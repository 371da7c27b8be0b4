use crate::errors::DbError;
use crate::model::{PlanStats, Row};
use async_trait::async_trait;

pub mod fake;
pub mod postgres;

/// The two capabilities the evaluator needs from a database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Identity written to the `db` column.
    fn name(&self) -> &str;

    /// Runs `sql` and returns every row in the order the server produced them.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DbError>;

    /// Runs `EXPLAIN ANALYZE` for `sql`. Implementations must not leave side
    /// effects of the analysed statement behind.
    async fn explain_analyze(&self, sql: &str) -> Result<PlanStats, DbError>;
}

/// Reads the figures of interest from `EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON)`
/// output: a one-element array whose object holds `Plan`, `Planning Time`
/// and `Execution Time`. Missing figures stay `None`; a document without a
/// root `Plan` is malformed.
pub fn parse_explain_json(doc: &serde_json::Value) -> Result<PlanStats, DbError> {
    let top = match doc {
        serde_json::Value::Array(items) => items.first(),
        serde_json::Value::Object(_) => Some(doc),
        _ => None,
    }
    .ok_or_else(|| DbError::MalformedPlan("expected a JSON array with one plan".into()))?;

    let plan = top
        .get("Plan")
        .filter(|p| p.is_object())
        .ok_or_else(|| DbError::MalformedPlan("missing root Plan".into()))?;

    Ok(PlanStats {
        planning_ms: top.get("Planning Time").and_then(|v| v.as_f64()),
        execution_ms: top.get("Execution Time").and_then(|v| v.as_f64()),
        shared_hit_blocks: plan.get("Shared Hit Blocks").and_then(|v| v.as_i64()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_plan() {
        let doc = json!([{
            "Plan": { "Node Type": "Seq Scan", "Shared Hit Blocks": 42, "Plans": [] },
            "Planning Time": 0.123,
            "Triggers": [],
            "Execution Time": 4.5
        }]);
        let stats = parse_explain_json(&doc).unwrap();
        assert_eq!(stats.planning_ms, Some(0.123));
        assert_eq!(stats.execution_ms, Some(4.5));
        assert_eq!(stats.shared_hit_blocks, Some(42));
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let doc = json!([{ "Plan": { "Node Type": "Result" } }]);
        let stats = parse_explain_json(&doc).unwrap();
        assert_eq!(stats, PlanStats::default());
    }

    #[test]
    fn test_malformed_documents() {
        for doc in [json!([]), json!("text"), json!([{ "Planning Time": 1.0 }])] {
            assert!(matches!(
                parse_explain_json(&doc),
                Err(DbError::MalformedPlan(_))
            ));
        }
    }
}
