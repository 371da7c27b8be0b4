// on_error.rs - what the evaluator does when a query cannot be rewritten.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Policy applied once the rewrite retry budget is exhausted (or the engine
/// rejects the request outright).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteFailurePolicy {
    /// No record for the query; the run moves on.
    #[default]
    Skip,

    /// Write a record with an empty rewritten query. The rewritten side is
    /// never executed, so its latency and plan fields stay absent.
    RecordEmpty,

    /// Stop the run. Records appended so far stay in the sink.
    Abort,
}

impl RewriteFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteFailurePolicy::Skip => "skip",
            RewriteFailurePolicy::RecordEmpty => "record_empty",
            RewriteFailurePolicy::Abort => "abort",
        }
    }
}

impl FromStr for RewriteFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "skip" => Ok(RewriteFailurePolicy::Skip),
            "record_empty" => Ok(RewriteFailurePolicy::RecordEmpty),
            "abort" => Ok(RewriteFailurePolicy::Abort),
            other => Err(format!(
                "unknown rewrite failure policy '{}' (expected skip, record_empty or abort)",
                other
            )),
        }
    }
}

/// Structured event emitted whenever the policy is applied.
pub fn log_rewrite_failure(query_id: u32, policy: RewriteFailurePolicy, error: &str) {
    tracing::warn!(
        event = "rewrite.failed",
        query_id,
        policy = policy.as_str(),
        error = %error,
        "rewrite failed for query {}: {}", query_id, error
    );
}
