use crate::config::EvalConfig;
use crate::db::Database;
use crate::energy::EnergyMeter;
use crate::equivalence;
use crate::errors::{ConfigError, DbError, RewriteError};
use crate::metrics;
use crate::model::{single_line, EvaluationRecord, PlanStats, PromptMode, Row};
use crate::on_error::{log_rewrite_failure, RewriteFailurePolicy};
use crate::retry::RetryPolicy;
use crate::rewrite::RewriteInvoker;
use crate::storage::RecordSink;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Per-run knobs, resolved once from the config.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub run_id: String,
    pub prompt_mode: PromptMode,
    pub schema_hint: String,
    pub explain: bool,
    pub on_failure: RewriteFailurePolicy,
    pub db_retry: RetryPolicy,
}

impl RunSettings {
    pub fn from_config(cfg: &EvalConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            run_id: new_run_id(),
            prompt_mode: cfg.rewrite.mode,
            schema_hint: cfg.schema_hint_text()?,
            explain: cfg.database.explain,
            on_failure: cfg.rewrite.on_failure,
            db_retry: cfg.database.retry.clone(),
        })
    }
}

/// UTC timestamp with millisecond precision, e.g. `20261018T101500123Z`.
pub fn new_run_id() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Rewriting,
    ExecutingOriginal,
    ExecutingRewritten,
    Introspecting,
    Comparing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Original,
    Rewritten,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Original => "original",
            Side::Rewritten => "rewritten",
        }
    }

    fn execution_phase(&self) -> Phase {
        match self {
            Side::Original => Phase::ExecutingOriginal,
            Side::Rewritten => Phase::ExecutingRewritten,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub side: Option<Side>,
    pub error: String,
}

/// What one side (original or rewritten) produced.
#[derive(Debug, Clone, Default)]
pub struct SideOutcome {
    pub rows: Vec<Row>,
    pub latency_ms: Option<f64>,
    pub plan: PlanStats,
    pub emissions: Option<f64>,
}

#[derive(Debug)]
pub enum QueryOutcome {
    Recorded(Box<EvaluationRecord>),
    Skipped,
    Aborted(RewriteError),
}

#[derive(Debug)]
pub struct QueryReport {
    pub query_id: u32,
    pub outcome: QueryOutcome,
    pub failures: Vec<PhaseFailure>,
    pub rewrite_attempts: u32,
}

impl QueryReport {
    pub fn record(&self) -> Option<&EvaluationRecord> {
        match &self.outcome {
            QueryOutcome::Recorded(r) => Some(r),
            _ => None,
        }
    }

    fn failed_in(&self, phase: Phase) -> bool {
        self.failures.iter().any(|f| f.phase == phase)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub sink: String,
    pub queries: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub aborted: bool,
    pub rewrite_failures: usize,
    pub execution_failures: usize,
    pub introspection_failures: usize,
    pub same_rowcount: usize,
    pub same_signature: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &QueryReport) {
        self.queries += 1;
        match &report.outcome {
            QueryOutcome::Recorded(r) => {
                self.recorded += 1;
                self.same_rowcount += r.same_rowcount as usize;
                self.same_signature += r.same_signature as usize;
            }
            QueryOutcome::Skipped => self.skipped += 1,
            QueryOutcome::Aborted(_) => self.aborted = true,
        }
        self.rewrite_failures += report.failed_in(Phase::Rewriting) as usize;
        self.execution_failures += report
            .failures
            .iter()
            .filter(|f| matches!(f.phase, Phase::ExecutingOriginal | Phase::ExecutingRewritten))
            .count();
        self.introspection_failures += report
            .failures
            .iter()
            .filter(|f| f.phase == Phase::Introspecting)
            .count();
    }
}

/// Returned when the `abort` policy stops a run. Records appended before
/// the failing query stay in the sink.
#[derive(Debug, thiserror::Error)]
#[error("run aborted at query {query_id}: {source}")]
pub struct RunAborted {
    pub query_id: u32,
    #[source]
    pub source: RewriteError,
    pub summary: RunSummary,
}

pub struct Evaluator {
    db: Arc<dyn Database>,
    invoker: RewriteInvoker,
    energy: Option<Arc<dyn EnergyMeter>>,
    settings: RunSettings,
    progress: bool,
}

impl Evaluator {
    pub fn new(db: Arc<dyn Database>, invoker: RewriteInvoker, settings: RunSettings) -> Self {
        Self {
            db,
            invoker,
            energy: None,
            settings,
            progress: false,
        }
    }

    /// Print one console line per query while running.
    pub fn with_progress(mut self, on: bool) -> Self {
        self.progress = on;
        self
    }

    pub fn with_energy(mut self, meter: Arc<dyn EnergyMeter>) -> Self {
        self.energy = Some(meter);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Evaluates every query in order, appending each record before the next
    /// query starts. `query_id` is the 1-based corpus position, so queries
    /// skipped by the failure policy leave gaps.
    pub async fn run_corpus(
        &self,
        queries: &[String],
        sink: &mut dyn RecordSink,
    ) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary {
            run_id: self.settings.run_id.clone(),
            sink: sink.location().display().to_string(),
            ..RunSummary::default()
        };
        tracing::info!(
            event = "run.start",
            run_id = %self.settings.run_id,
            db = self.db.name(),
            provider = self.invoker.provider_name(),
            model = self.invoker.model(),
            mode = %self.settings.prompt_mode,
            queries = queries.len(),
        );

        for (idx, sql) in queries.iter().enumerate() {
            let query_id = (idx + 1) as u32;
            let report = self.evaluate(query_id, sql).await;
            summary.absorb(&report);
            if self.progress {
                crate::report::print_query(&report);
            }

            match report.outcome {
                QueryOutcome::Recorded(record) => {
                    sink.append(&record)?;
                    tracing::info!(
                        event = "query.recorded",
                        query_id,
                        speedup = ?record.speedup,
                        same_rowcount = record.same_rowcount,
                        same_signature = record.same_signature,
                        failures = report.failures.len(),
                    );
                }
                QueryOutcome::Skipped => {
                    tracing::info!(event = "query.skipped", query_id);
                }
                QueryOutcome::Aborted(source) => {
                    tracing::error!(event = "run.aborted", query_id, error = %source);
                    return Err(RunAborted {
                        query_id,
                        source,
                        summary,
                    }
                    .into());
                }
            }
        }

        tracing::info!(
            event = "run.finished",
            run_id = %summary.run_id,
            recorded = summary.recorded,
            skipped = summary.skipped,
        );
        Ok(summary)
    }

    /// Drives one query through
    /// rewriting, both executions, introspection and comparison.
    /// Only a rewrite failure can prevent a record, and only under the
    /// `skip` or `abort` policy.
    pub async fn evaluate(&self, query_id: u32, original_sql: &str) -> QueryReport {
        let mut failures = Vec::new();

        tracing::debug!(event = "query.phase", query_id, phase = ?Phase::Rewriting);
        let (rewritten_sql, rewrite_attempts) = match self
            .invoker
            .invoke(original_sql, &self.settings.schema_hint, self.settings.prompt_mode)
            .await
        {
            Ok(rw) => (Some(rw.sql), rw.attempts),
            Err(e) => {
                let policy = self.settings.on_failure;
                log_rewrite_failure(query_id, policy, &e.to_string());
                let attempts = match &e {
                    RewriteError::Exhausted { attempts, .. } => *attempts,
                    RewriteError::Rejected(_) => 1,
                };
                failures.push(PhaseFailure {
                    phase: Phase::Rewriting,
                    side: None,
                    error: e.to_string(),
                });
                match policy {
                    RewriteFailurePolicy::Skip => {
                        return QueryReport {
                            query_id,
                            outcome: QueryOutcome::Skipped,
                            failures,
                            rewrite_attempts: attempts,
                        }
                    }
                    RewriteFailurePolicy::Abort => {
                        return QueryReport {
                            query_id,
                            outcome: QueryOutcome::Aborted(e),
                            failures,
                            rewrite_attempts: attempts,
                        }
                    }
                    RewriteFailurePolicy::RecordEmpty => (None, attempts),
                }
            }
        };

        let original = self
            .run_side(query_id, Side::Original, original_sql, &mut failures)
            .await;
        let rewritten = match &rewritten_sql {
            Some(sql) => {
                self.run_side(query_id, Side::Rewritten, sql, &mut failures)
                    .await
            }
            None => SideOutcome::default(),
        };

        tracing::debug!(event = "query.phase", query_id, phase = ?Phase::Comparing);
        // No rewrite means nothing to compare, even when the original returned no rows.
        let eq = if rewritten_sql.is_some() {
            equivalence::equivalent(&original.rows, &rewritten.rows)
        } else {
            equivalence::Equivalence::default()
        };

        let record = EvaluationRecord {
            run_id: self.settings.run_id.clone(),
            db: self.db.name().to_string(),
            llm: self.invoker.model().to_string(),
            prompt_mode: self.settings.prompt_mode.to_string(),
            query_id,
            original_ms: original.latency_ms,
            execution_ms_original: original.plan.execution_ms,
            planning_ms_original: original.plan.planning_ms,
            buffers_plan_original: original.plan.shared_hit_blocks,
            rewritten_ms: rewritten.latency_ms,
            execution_ms_rewritten: rewritten.plan.execution_ms,
            planning_ms_rewritten: rewritten.plan.planning_ms,
            buffers_plan_rewritten: rewritten.plan.shared_hit_blocks,
            emissions_original: original.emissions,
            emissions_rewritten: rewritten.emissions,
            speedup: metrics::speedup(original.latency_ms, rewritten.latency_ms),
            buffers_ratio: metrics::buffers_ratio(
                original.plan.shared_hit_blocks,
                rewritten.plan.shared_hit_blocks,
            ),
            energy_ratio: metrics::energy_ratio(original.emissions, rewritten.emissions),
            energy_saving_pct: metrics::energy_saving_pct(
                original.emissions,
                rewritten.emissions,
            ),
            same_rowcount: eq.same_rowcount,
            same_signature: eq.same_signature,
            original_sql: single_line(original_sql),
            rewritten_sql: rewritten_sql.as_deref().map(single_line).unwrap_or_default(),
        };

        tracing::debug!(event = "query.phase", query_id, phase = ?Phase::Done);
        QueryReport {
            query_id,
            outcome: QueryOutcome::Recorded(Box::new(record)),
            failures,
            rewrite_attempts,
        }
    }

    async fn run_side(
        &self,
        query_id: u32,
        side: Side,
        sql: &str,
        failures: &mut Vec<PhaseFailure>,
    ) -> SideOutcome {
        let phase = side.execution_phase();
        tracing::debug!(event = "query.phase", query_id, phase = ?phase);

        let label = format!("execute.{}", side.as_str());
        let executed = self
            .settings
            .db_retry
            .run(&label, |_| self.timed_execute(sql), DbError::is_transient)
            .await;

        let (rows, latency_ms, emissions) = match executed {
            Ok((v, _)) => v,
            Err(f) => {
                tracing::warn!(
                    event = "query.execution_failed",
                    query_id,
                    side = side.as_str(),
                    attempts = f.attempts,
                    error = %f.error,
                );
                failures.push(PhaseFailure {
                    phase,
                    side: Some(side),
                    error: f.error.to_string(),
                });
                return SideOutcome::default();
            }
        };

        let mut plan = PlanStats::default();
        if self.settings.explain {
            tracing::debug!(event = "query.phase", query_id, phase = ?Phase::Introspecting);
            let label = format!("explain.{}", side.as_str());
            match self
                .settings
                .db_retry
                .run(&label, |_| self.db.explain_analyze(sql), DbError::is_transient)
                .await
            {
                Ok((p, _)) => plan = p,
                Err(f) => {
                    tracing::warn!(
                        event = "query.introspection_failed",
                        query_id,
                        side = side.as_str(),
                        error = %f.error,
                    );
                    failures.push(PhaseFailure {
                        phase: Phase::Introspecting,
                        side: Some(side),
                        error: f.error.to_string(),
                    });
                }
            }
        }

        SideOutcome {
            rows,
            latency_ms: Some(latency_ms),
            plan,
            emissions,
        }
    }

    /// One execution attempt, timed and (optionally) energy-metered on its own.
    async fn timed_execute(&self, sql: &str) -> Result<(Vec<Row>, f64, Option<f64>), DbError> {
        let session = match &self.energy {
            Some(meter) => match meter.start() {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!(event = "energy.start_failed", error = %e);
                    None
                }
            },
            None => None,
        };

        let started = Instant::now();
        let result = self.db.execute(sql).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let emissions = session.and_then(|s| match s.stop() {
            Ok(kg) => Some(kg),
            Err(e) => {
                tracing::warn!(event = "energy.stop_failed", error = %e);
                None
            }
        });

        Ok((result?, elapsed_ms, emissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fake::FakeDatabase;
    use crate::errors::ProviderError;
    use crate::providers::llm::fake::FakeClient;
    use serde_json::json;

    fn settings(on_failure: RewriteFailurePolicy) -> RunSettings {
        RunSettings {
            run_id: "test-run".into(),
            prompt_mode: PromptMode::ZeroShot,
            schema_hint: String::new(),
            explain: true,
            on_failure,
            db_retry: RetryPolicy {
                max_attempts: 3,
                delay_ms: 0,
                backoff: 1.0,
            },
        }
    }

    fn invoker(client: FakeClient) -> RewriteInvoker {
        RewriteInvoker::new(Arc::new(client), RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn test_introspection_failure_keeps_latency() {
        let db = FakeDatabase::new("db")
            .with_rows("SELECT 1", vec![vec![json!(1)]])
            .with_plan_error("SELECT 1", DbError::MalformedPlan("no Plan".into()));
        let ev = Evaluator::new(
            Arc::new(db),
            invoker(FakeClient::echo()),
            settings(RewriteFailurePolicy::Skip),
        );

        let report = ev.evaluate(1, "SELECT 1").await;
        let rec = report.record().unwrap();
        assert!(rec.original_ms.is_some());
        assert!(rec.planning_ms_original.is_none());
        assert!(rec.same_rowcount && rec.same_signature);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.phase == Phase::Introspecting));
    }

    #[tokio::test]
    async fn test_transient_db_failure_is_retried() {
        let db = Arc::new(
            FakeDatabase::new("db")
                .with_rows("SELECT 1", vec![vec![json!(1)]])
                .with_transient_failures("SELECT 1", 2),
        );
        let ev = Evaluator::new(
            db.clone(),
            invoker(FakeClient::echo()),
            settings(RewriteFailurePolicy::Skip),
        );
        let report = ev.evaluate(1, "SELECT 1").await;
        assert!(report.failures.is_empty());
        assert!(report.record().unwrap().original_ms.is_some());
    }

    #[tokio::test]
    async fn test_record_empty_marks_rewritten_not_executed() {
        let db = Arc::new(FakeDatabase::new("db").with_rows("SELECT 1", vec![vec![json!(1)]]));
        let ev = Evaluator::new(
            db.clone(),
            invoker(FakeClient::failing(ProviderError::Status {
                status: 401,
                body: "bad key".into(),
            })),
            settings(RewriteFailurePolicy::RecordEmpty),
        );

        let report = ev.evaluate(3, "SELECT 1").await;
        let rec = report.record().unwrap();
        assert_eq!(rec.query_id, 3);
        assert_eq!(rec.rewritten_sql, "");
        assert!(rec.rewritten_ms.is_none());
        assert!(rec.speedup.is_none());
        assert!(!rec.same_rowcount);
        assert_eq!(db.executed(), vec!["SELECT 1".to_string()]);
        assert_eq!(report.failures[0].phase, Phase::Rewriting);
    }

    #[tokio::test]
    async fn test_record_empty_with_empty_original_is_not_equivalent() {
        let db = FakeDatabase::new("db").with_rows("SELECT * FROM t WHERE false", vec![]);
        let ev = Evaluator::new(
            Arc::new(db),
            invoker(FakeClient::failing(ProviderError::Status {
                status: 401,
                body: "bad key".into(),
            })),
            settings(RewriteFailurePolicy::RecordEmpty),
        );

        let report = ev.evaluate(1, "SELECT * FROM t WHERE false").await;
        let rec = report.record().unwrap();
        assert_eq!(rec.rewritten_sql, "");
        assert!(rec.original_ms.is_some());
        assert!(!rec.same_rowcount);
        assert!(!rec.same_signature);
    }

    #[tokio::test]
    async fn test_failed_rewritten_side_compares_as_empty() {
        let db = FakeDatabase::new("db")
            .with_rows("SELECT 1 WHERE false", vec![])
            .with_error("SELECT 2", DbError::Execution("boom".into()));
        let ev = Evaluator::new(
            Arc::new(db),
            invoker(FakeClient::scripted(vec![Ok("SELECT 2".into())])),
            settings(RewriteFailurePolicy::Skip),
        );

        let report = ev.evaluate(1, "SELECT 1 WHERE false").await;
        let rec = report.record().unwrap();
        assert!(rec.rewritten_ms.is_none());
        assert!(rec.same_rowcount);
        assert_eq!(report.failures[0].phase, Phase::ExecutingRewritten);
    }

    #[test]
    fn test_run_id_shape() {
        let id = new_run_id();
        assert!(id.ends_with('Z'));
        assert_eq!(id.len(), "20261018T101500123Z".len());
    }
}
